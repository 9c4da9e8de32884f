//! 资源模型

use crate::unit::UnitRef;
use std::fmt;

/// 资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// 可执行任务，只有任务可以声明任务名称
    Task,
    /// 普通资源
    Plain,
}

/// 执行单元中的一个资源
///
/// `identity` 是资源的全限定名，在同一执行单元内唯一。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceHandle {
    identity: String,
    kind: ResourceKind,
    task_name: Option<String>,
}

impl ResourceHandle {
    /// 创建任务资源，可选声明任务名称
    pub fn task(identity: impl Into<String>, task_name: Option<&str>) -> Self {
        Self {
            identity: identity.into(),
            kind: ResourceKind::Task,
            task_name: task_name.map(str::to_string),
        }
    }

    /// 创建普通资源
    pub fn plain(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            kind: ResourceKind::Plain,
            task_name: None,
        }
    }

    /// 全限定名
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// 资源类型
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// 是否为任务
    pub fn is_task(&self) -> bool {
        self.kind == ResourceKind::Task
    }

    /// 声明的任务名称，普通资源始终为 `None`
    pub fn alias(&self) -> Option<&str> {
        match self.kind {
            ResourceKind::Task => self.task_name.as_deref(),
            ResourceKind::Plain => None,
        }
    }

    /// 对外发布的名称：任务名称优先，否则为全限定名
    pub fn public_name(&self) -> &str {
        self.alias().unwrap_or(&self.identity)
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.alias() {
            Some(alias) => write!(f, "{} ({})", alias, self.identity),
            None => f.write_str(&self.identity),
        }
    }
}

/// 资源查找结果
#[derive(Clone)]
pub struct DeploymentResource {
    name: String,
    resource: ResourceHandle,
    unit: UnitRef,
}

impl DeploymentResource {
    /// 创建查找结果
    pub fn new(name: impl Into<String>, resource: ResourceHandle, unit: UnitRef) -> Self {
        Self {
            name: name.into(),
            resource,
            unit,
        }
    }

    /// 资源名称（按全限定名访问时也会换算为任务名称）
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 资源
    pub fn resource(&self) -> &ResourceHandle {
        &self.resource
    }

    /// 所属执行单元
    pub fn unit(&self) -> &UnitRef {
        &self.unit
    }
}

impl fmt::Debug for DeploymentResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentResource")
            .field("name", &self.name)
            .field("resource", &self.resource)
            .field("unit", &self.unit.id())
            .finish()
    }
}
