//! 部署源扫描器抽象接口
//!
//! 每个部署源对应一个扫描器，在独立线程上按固定间隔轮询。

use deployment_common::{DeploymentResult, SourceUri};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// 部署包扩展名
pub const ARTIFACT_EXTENSION: &str = ".gar";

/// 扫描事件监听器
pub trait ScannerListener: Send + Sync {
    /// 发现新的或已修改的部署包（已暂存到本地）
    ///
    /// `source_uri` 标识部署包在部署源中的位置，`timestamp_ms` 为最后修改时间。
    fn on_new_or_updated(&self, artifact: &Path, source_uri: &str, timestamp_ms: i64);

    /// 之前报告过的部署包已从部署源中消失
    fn on_deleted(&self, source_uris: &[String]);

    /// 首次完整扫描结束，每个扫描器只触发一次
    fn on_first_scan_finished(&self);
}

/// 扫描器 trait
pub trait Scanner: Send {
    /// 扫描器名称
    fn name(&self) -> &str;

    /// 启动扫描线程
    fn start(&mut self) -> DeploymentResult<()>;

    /// 通知扫描线程停止，不等待
    fn cancel(&self);

    /// 等待扫描线程退出
    fn join(&mut self);
}

/// 扫描器工厂 trait
pub trait ScannerFactory: Send + Sync {
    /// 支持的协议，例如 `file`、`http`
    fn protocols(&self) -> &[&str];

    /// 为一个部署源创建扫描器
    fn create(&self, context: ScannerContext) -> DeploymentResult<Box<dyn Scanner>>;
}

/// 部署包文件名过滤器
#[derive(Debug, Clone, Default)]
pub struct ArtifactFilter;

impl ArtifactFilter {
    /// 创建过滤器
    pub fn new() -> Self {
        Self
    }

    /// 是否为部署包（扩展名不区分大小写）
    pub fn accept(&self, file_name: &str) -> bool {
        file_name.to_lowercase().ends_with(ARTIFACT_EXTENSION)
    }
}

/// 创建扫描器所需的上下文
#[derive(Clone)]
pub struct ScannerContext {
    /// 部署源
    pub source: SourceUri,
    /// 临时部署目录
    pub staging_dir: PathBuf,
    /// 扫描间隔
    pub frequency: Duration,
    /// 部署包过滤器
    pub filter: ArtifactFilter,
    /// 扫描事件监听器
    pub listener: Arc<dyn ScannerListener>,
}

impl fmt::Debug for ScannerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScannerContext")
            .field("source", &self.source.redacted())
            .field("staging_dir", &self.staging_dir)
            .field("frequency", &self.frequency)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_gar_case_insensitively() {
        let filter = ArtifactFilter::new();
        assert!(filter.accept("tasks.gar"));
        assert!(filter.accept("TASKS.GAR"));
        assert!(!filter.accept("tasks.jar"));
        assert!(!filter.accept("gar"));
    }
}
