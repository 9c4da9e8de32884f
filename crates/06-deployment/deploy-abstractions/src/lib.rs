//! # Deployment Abstractions
//!
//! URI 部署的协作者抽象层，定义部署核心与外部实现之间的边界。
//!
//! ## 核心接口
//!
//! - [`ExecutionUnit`] - 执行单元（隔离的加载上下文）
//! - [`Scanner`] / [`ScannerFactory`] - 按协议扫描部署源
//! - [`ScannerListener`] - 扫描事件回调
//! - [`UnitProcessor`] - 将暂存的部署包加载为执行单元
//! - [`DeploymentListener`] - 执行单元释放通知

pub mod listener;
pub mod processor;
pub mod resource;
pub mod scanner;
pub mod unit;

pub use listener::*;
pub use processor::*;
pub use resource::*;
pub use scanner::*;
pub use unit::*;
