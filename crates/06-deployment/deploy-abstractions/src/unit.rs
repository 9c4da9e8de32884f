//! 执行单元抽象
//!
//! 执行单元是一个隔离的加载上下文，具体的加载机制（动态库、解释器模块、
//! 子进程沙箱等）由实现方决定，部署核心只通过本接口访问。

use crate::resource::ResourceHandle;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 执行单元标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(Uuid);

impl UnitId {
    /// 生成新的随机标识
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// 底层 UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UnitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 执行单元 trait
pub trait ExecutionUnit: Send + Sync + fmt::Debug {
    /// 单元标识
    fn id(&self) -> UnitId;

    /// 仅在本单元内按全限定名解析资源
    fn resolve(&self, identity: &str) -> Option<ResourceHandle>;

    /// 探测本单元能否加载指定资源
    fn probe(&self, identity: &str) -> bool {
        self.resolve(identity).is_some()
    }

    /// 释放单元持有的资源（例如暂存文件）
    fn release(&self) {}
}

/// 执行单元的共享引用
pub type UnitRef = Arc<dyn ExecutionUnit>;

/// 基于固定资源集合的内存执行单元
#[derive(Debug)]
pub struct StaticExecutionUnit {
    id: UnitId,
    resources: HashMap<String, ResourceHandle>,
    released: AtomicBool,
}

impl StaticExecutionUnit {
    /// 创建执行单元
    pub fn new(resources: impl IntoIterator<Item = ResourceHandle>) -> Self {
        Self {
            id: UnitId::new(),
            resources: resources
                .into_iter()
                .map(|r| (r.identity().to_string(), r))
                .collect(),
            released: AtomicBool::new(false),
        }
    }

    /// 创建执行单元并包装为共享引用
    pub fn shared(resources: impl IntoIterator<Item = ResourceHandle>) -> Arc<Self> {
        Arc::new(Self::new(resources))
    }

    /// 是否已被释放
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// 资源数量
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}

impl ExecutionUnit for StaticExecutionUnit {
    fn id(&self) -> UnitId {
        self.id
    }

    fn resolve(&self, identity: &str) -> Option<ResourceHandle> {
        self.resources.get(identity).cloned()
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            debug!("执行单元已释放: {}", self.id);
        }
    }
}
