//! 部署配置模型

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 默认的本地部署目录（相对于工作目录）
pub const DEFAULT_DEPLOY_DIR: &str = "deployment/file";

/// 临时部署根目录名称
pub const DEPLOY_TMP_ROOT_NAME: &str = "grid.uri.deployment.tmp";

/// `file://` 协议默认扫描间隔（毫秒）
pub const DEFAULT_DISK_SCAN_FREQUENCY_MS: u64 = 5_000;

/// `ftp://` 协议默认扫描间隔（毫秒）
pub const DEFAULT_FTP_SCAN_FREQUENCY_MS: u64 = 300_000;

/// `http://` 和 `https://` 协议默认扫描间隔（毫秒）
pub const DEFAULT_HTTP_SCAN_FREQUENCY_MS: u64 = 300_000;

/// 查找等待部署就绪时的默认复查间隔（毫秒）
pub const DEFAULT_READINESS_CHECK_INTERVAL_MS: u64 = 5_000;

/// URI 部署配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeploymentConfig {
    /// 需要扫描的部署源 URI 列表
    pub uri_list: Vec<String>,
    /// 是否在部署前校验内容摘要，摘要相同的单元只部署一次
    pub check_md5: bool,
    /// 临时目录基础路径，为空时使用系统临时目录
    pub temporary_directory_path: Option<PathBuf>,
    /// 是否对 URI 路径中的特殊字符进行编码
    pub encode_uri: bool,
    /// 查找等待就绪时的复查间隔（毫秒）
    pub readiness_check_interval_ms: u64,
    /// 日志配置
    pub logging: LoggingConfig,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            uri_list: Vec::new(),
            check_md5: false,
            temporary_directory_path: None,
            encode_uri: true,
            readiness_check_interval_ms: DEFAULT_READINESS_CHECK_INTERVAL_MS,
            logging: LoggingConfig::default(),
        }
    }
}

impl DeploymentConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加部署源 URI
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri_list.push(uri.into());
        self
    }

    /// 设置是否启用摘要去重
    pub fn with_check_md5(mut self, check_md5: bool) -> Self {
        self.check_md5 = check_md5;
        self
    }

    /// 设置临时目录基础路径
    pub fn with_temporary_directory_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.temporary_directory_path = Some(path.into());
        self
    }

    /// 设置是否编码 URI
    pub fn with_encode_uri(mut self, encode_uri: bool) -> Self {
        self.encode_uri = encode_uri;
        self
    }

    /// 设置就绪复查间隔
    pub fn with_readiness_check_interval(mut self, interval: Duration) -> Self {
        self.readiness_check_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// 就绪复查间隔
    pub fn readiness_check_interval(&self) -> Duration {
        Duration::from_millis(self.readiness_check_interval_ms)
    }
}

/// 按协议获取默认扫描间隔
pub fn default_scan_frequency(protocol: &str) -> Option<Duration> {
    let millis = match protocol {
        "file" => DEFAULT_DISK_SCAN_FREQUENCY_MS,
        "http" | "https" => DEFAULT_HTTP_SCAN_FREQUENCY_MS,
        "ftp" => DEFAULT_FTP_SCAN_FREQUENCY_MS,
        _ => return None,
    };
    Some(Duration::from_millis(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = DeploymentConfig::default();
        assert!(config.uri_list.is_empty());
        assert!(!config.check_md5);
        assert!(config.encode_uri);
        assert_eq!(config.readiness_check_interval(), Duration::from_secs(5));
    }

    #[test]
    fn deserialize_partial_toml_keeps_defaults() {
        let config: DeploymentConfig = toml::from_str(
            r#"
            uri_list = ["file:///var/grid/deploy", "http://repo.example.com/tasks"]
            check_md5 = true
            "#,
        )
        .unwrap();

        assert_eq!(config.uri_list.len(), 2);
        assert!(config.check_md5);
        assert!(config.encode_uri);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn scan_frequency_per_protocol() {
        assert_eq!(default_scan_frequency("file"), Some(Duration::from_millis(5_000)));
        assert_eq!(default_scan_frequency("https"), Some(Duration::from_millis(300_000)));
        assert_eq!(default_scan_frequency("ftp"), Some(Duration::from_millis(300_000)));
        assert_eq!(default_scan_frequency("gopher"), None);
    }
}
