//! URI 部署 SPI 构建器

use crate::spi::UriDeploymentSpi;
use deploy_abstractions::{DeploymentListener, ScannerFactory, UnitProcessor};
use deployment_common::{init_logging, ConfigError, DeploymentConfig, DeploymentResult};
use deployment_config::{validate_config, DeploymentConfigLoader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 配置来源
enum ConfigSource {
    Value(DeploymentConfig),
    Loader(DeploymentConfigLoader),
}

/// URI 部署 SPI 构建器
///
/// 使用建造者模式组装配置、扫描器工厂、部署包处理器和监听器。
pub struct UriDeploymentSpiBuilder {
    config: ConfigSource,
    factories: Vec<Arc<dyn ScannerFactory>>,
    processor: Option<Arc<dyn UnitProcessor>>,
    listener: Option<Arc<dyn DeploymentListener>>,
    work_dir: Option<PathBuf>,
    /// 是否启用日志初始化
    logging_enabled: bool,
}

impl UriDeploymentSpiBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: ConfigSource::Value(DeploymentConfig::default()),
            factories: Vec::new(),
            processor: None,
            listener: None,
            work_dir: None,
            logging_enabled: false, // 默认不初始化日志
        }
    }

    /// 使用给定配置
    pub fn config(mut self, config: DeploymentConfig) -> Self {
        self.config = ConfigSource::Value(config);
        self
    }

    /// 构建时通过加载器读取配置
    pub fn config_loader(mut self, loader: DeploymentConfigLoader) -> Self {
        self.config = ConfigSource::Loader(loader);
        self
    }

    /// 添加扫描器工厂，按添加顺序匹配协议
    pub fn scanner_factory(mut self, factory: Arc<dyn ScannerFactory>) -> Self {
        debug!("添加扫描器工厂: {:?}", factory.protocols());
        self.factories.push(factory);
        self
    }

    /// 设置部署包处理器
    pub fn unit_processor(mut self, processor: Arc<dyn UnitProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    /// 设置部署监听器
    pub fn listener(mut self, listener: Arc<dyn DeploymentListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// 设置工作目录，默认部署源位于其下的 `deployment/file`
    pub fn work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    /// 构建时按配置初始化日志
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    /// 构建 SPI，不启动扫描器
    pub fn build(self) -> DeploymentResult<UriDeploymentSpi> {
        let config = match self.config {
            ConfigSource::Value(config) => config,
            ConfigSource::Loader(loader) => loader.load()?,
        };

        if self.logging_enabled {
            if let Err(e) = init_logging(&config.logging) {
                warn!("日志初始化跳过: {}", e);
            }
        }

        validate_config(&config)?;

        let processor = self.processor.ok_or_else(|| ConfigError::ValidationFailed {
            errors: vec!["未设置部署包处理器".to_string()],
        })?;

        let work_dir = match self.work_dir {
            Some(dir) => dir,
            None => std::env::current_dir().map_err(ConfigError::from)?,
        };

        info!(
            "构建部署 SPI: uri数量={}, 扫描器工厂数量={}, check_md5={}",
            config.uri_list.len(),
            self.factories.len(),
            config.check_md5
        );

        Ok(UriDeploymentSpi::new(
            config,
            work_dir,
            self.factories,
            processor,
            self.listener,
        ))
    }
}

impl Default for UriDeploymentSpiBuilder {
    fn default() -> Self {
        Self::new()
    }
}
