//! 配置加载器实现

use deployment_common::{ConfigError, ConfigResult, DeploymentConfig};
use std::path::PathBuf;
use tracing::{debug, error, info};

/// 默认环境变量前缀
pub const DEFAULT_ENV_PREFIX: &str = "GRID_DEPLOY";

/// 默认环境变量层级分隔符
pub const DEFAULT_ENV_SEPARATOR: &str = "__";

/// 配置文件来源
#[derive(Debug, Clone)]
struct FileSource {
    path: PathBuf,
    required: bool,
}

/// 部署配置加载器
///
/// 按添加顺序叠加配置文件，最后叠加环境变量。
/// 例如 `GRID_DEPLOY__CHECK_MD5=true`、`GRID_DEPLOY__LOGGING__LEVEL=debug`，
/// `GRID_DEPLOY__URI_LIST` 按逗号拆分为列表。
#[derive(Debug, Clone)]
pub struct DeploymentConfigLoader {
    files: Vec<FileSource>,
    env_prefix: String,
    env_separator: String,
}

impl DeploymentConfigLoader {
    /// 创建新的配置加载器
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            env_separator: DEFAULT_ENV_SEPARATOR.to_string(),
        }
    }

    /// 添加必需的配置文件，格式由扩展名决定
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(FileSource {
            path: path.into(),
            required: true,
        });
        self
    }

    /// 添加可选的配置文件，不存在时忽略
    pub fn with_optional_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(FileSource {
            path: path.into(),
            required: false,
        });
        self
    }

    /// 设置环境变量前缀
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// 加载配置
    pub fn load(&self) -> ConfigResult<DeploymentConfig> {
        debug!("加载部署配置: files={}, env_prefix={}", self.files.len(), self.env_prefix);

        let mut builder = config::Config::builder();

        for file in &self.files {
            builder = builder.add_source(config::File::from(file.path.clone()).required(file.required));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator(&self.env_separator)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("uri_list"),
        );

        let settings = builder.build().map_err(|e| {
            error!("配置构建失败: {}", e);
            ConfigError::ParseError {
                source: Box::new(e),
            }
        })?;

        let config: DeploymentConfig = settings.try_deserialize().map_err(|e| {
            error!("配置绑定失败: {}", e);
            ConfigError::ParseError {
                source: Box::new(e),
            }
        })?;

        info!(
            "部署配置加载完成: uri数量={}, check_md5={}, encode_uri={}",
            config.uri_list.len(),
            config.check_md5,
            config.encode_uri
        );
        Ok(config)
    }
}

impl Default for DeploymentConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
