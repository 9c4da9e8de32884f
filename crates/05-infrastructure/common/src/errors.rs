//! 错误类型定义

use thiserror::Error;

/// 配置错误类型
///
/// 启动阶段的致命错误：URI 格式错误、临时目录不可用、配置文件无法解析等。
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("URI 解析失败: {uri}, 原因: {message}")]
    InvalidUri { uri: String, message: String },

    #[error("URI 缺少协议部分: {uri}")]
    MissingScheme { uri: String },

    #[error("临时部署目录不可用: {path}, 原因: {message}")]
    StagingDirectory { path: String, message: String },

    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {source}")]
    ParseError {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("配置验证失败: {errors:?}")]
    ValidationFailed { errors: Vec<String> },

    #[error("日志初始化失败: {message}")]
    LoggingInit { message: String },
}

/// 部署错误类型
#[derive(Error, Debug)]
pub enum DeploymentError {
    #[error("配置错误: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("不支持的协议: {protocol}")]
    UnsupportedProtocol { protocol: String },

    #[error("任务名称冲突: {task_name}, 已存在: {existing}, 请求注册: {requested}")]
    NamingConflict {
        task_name: String,
        existing: String,
        requested: String,
    },

    #[error("部署单元处理失败: {uri}, 原因: {message}")]
    Processing { uri: String, message: String },

    #[error("扫描器启动失败: {uri}, 原因: {message}")]
    ScannerStart { uri: String, message: String },

    #[error("部署 SPI 已经启动")]
    AlreadyStarted,
}

impl DeploymentError {
    /// 创建名称冲突错误
    pub fn naming_conflict(
        task_name: impl Into<String>,
        existing: impl Into<String>,
        requested: impl Into<String>,
    ) -> Self {
        Self::NamingConflict {
            task_name: task_name.into(),
            existing: existing.into(),
            requested: requested.into(),
        }
    }

    /// 创建部署单元处理错误
    pub fn processing(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Processing {
            uri: uri.into(),
            message: message.into(),
        }
    }

    /// 是否为名称冲突
    pub fn is_naming_conflict(&self) -> bool {
        matches!(self, Self::NamingConflict { .. })
    }
}

/// 资源查找错误类型
///
/// "未找到" 与 "等待被放弃" 是两种不同的结果，调用方不应混淆。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("资源未找到: {name}")]
    NotFound { name: String },

    #[error("等待部署源首次扫描完成时被取消: {name}")]
    Cancelled { name: String },
}

impl LookupError {
    /// 是否为取消
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type DeploymentResult<T> = Result<T, DeploymentError>;
pub type LookupResult<T> = Result<T, LookupError>;
