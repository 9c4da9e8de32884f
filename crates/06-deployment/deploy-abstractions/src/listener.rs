//! 部署监听器

use crate::unit::UnitRef;

/// 部署监听器 trait
///
/// 回调总是在部署核心释放内部锁之后触发，实现方可以安全地回调部署 SPI。
pub trait DeploymentListener: Send + Sync {
    /// 执行单元被移除或替换后调用，每个单元最多一次
    fn on_unit_released(&self, unit: &UnitRef);
}
