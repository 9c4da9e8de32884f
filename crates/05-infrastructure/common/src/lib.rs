//! # Deployment Common
//!
//! 这个 crate 提供了 Lorn Grid 部署子系统的公共类型和工具。
//!
//! ## 核心内容
//!
//! - [`DeploymentError`] / [`ConfigError`] / [`LookupError`] - 错误分类
//! - [`DeploymentConfig`] - 部署配置模型
//! - [`SourceUri`] - 部署源 URI（协议、扫描频率、密码脱敏）
//! - [`init_logging`] - 日志初始化
//!
//! ## 设计原则
//!
//! - 错误类型携带结构化字段，便于日志和调用方区分处理
//! - 所有写入日志的 URI 均经过密码脱敏

pub mod configuration;
pub mod errors;
pub mod logging;
pub mod uri;

pub use configuration::*;
pub use errors::*;
pub use logging::*;
pub use uri::*;
