//! # URI 部署具体实现
//!
//! 发现配置的部署源中发布的任务包，加载为执行单元，并提供按名称查找的注册表。
//!
//! ## 主要组件
//!
//! - [`UriDeploymentSpi`] - 部署 SPI，管理扫描器生命周期
//! - [`UriDeploymentSpiBuilder`] - SPI 构建器
//! - [`DeploymentCore`] - 描述符存储、注册表和就绪门的唯一持有者
//! - [`ResourceRegistry`] - 名称解析与冲突处理
//! - [`ReadinessGate`] - 等待全部部署源完成首次扫描
//!
//! ## 并发模型
//!
//! 每个部署源一个扫描线程；部署核心不运行自己的线程，只响应扫描回调和外部调用。
//! 描述符的所有变更在同一把锁内完成，执行单元释放和监听器通知在锁外进行。

pub mod builder;
pub mod deployment;
pub mod descriptor;
pub mod readiness;
pub mod registry;
pub mod spi;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use builder::UriDeploymentSpiBuilder;
pub use deployment::DeploymentCore;
pub use descriptor::{compare_recency, DescriptorKind, DescriptorSummary, UnitDescriptor};
pub use readiness::ReadinessGate;
pub use registry::{Admission, NewNames, ResourceRegistry};
pub use spi::UriDeploymentSpi;
pub use store::DescriptorStore;
