//! # Deployment Configuration
//!
//! URI 部署的配置加载与启动准备。
//!
//! ## 主要组件
//!
//! - [`DeploymentConfigLoader`] - 从配置文件和环境变量加载 [`DeploymentConfig`]
//! - [`validate_config`] - 启动前的配置校验
//! - [`resolve_sources`] - 解析部署源列表，未配置时使用默认本地目录
//! - [`prepare_staging_dir`] - 创建节点专属的临时部署目录
//!
//! [`DeploymentConfig`]: deployment_common::DeploymentConfig

pub mod loader;
pub mod sources;
pub mod staging;
pub mod validation;

pub use loader::*;
pub use sources::*;
pub use staging::*;
pub use validation::*;
