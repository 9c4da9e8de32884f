//! 部署单元描述符存储
//!
//! 描述符按时间戳降序排列，时间戳相同时后插入的在前。该顺序即查找优先级。
//! 存储本身不加锁，由 [`DeploymentCore`](crate::DeploymentCore) 在唯一的互斥锁内访问。

use crate::descriptor::{compare_recency, UnitDescriptor};
use deploy_abstractions::{UnitId, UnitRef};
use std::cmp::Ordering;

/// 描述符存储
#[derive(Debug, Default)]
pub struct DescriptorStore {
    descriptors: Vec<UnitDescriptor>,
}

impl DescriptorStore {
    /// 创建空存储
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// 按优先级顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &UnitDescriptor> {
        self.descriptors.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut UnitDescriptor> {
        self.descriptors.iter_mut()
    }

    /// 插入到第一个时间戳不大于它的描述符之前，返回插入位置
    pub fn insert_ordered(&mut self, descriptor: UnitDescriptor) -> usize {
        let index = self
            .descriptors
            .iter()
            .position(|d| compare_recency(&descriptor, d) != Ordering::Greater)
            .unwrap_or(self.descriptors.len());

        self.descriptors.insert(index, descriptor);
        index
    }

    /// 持有指定执行单元的描述符位置
    pub fn position_of_unit(&self, unit_id: UnitId) -> Option<usize> {
        self.descriptors.iter().position(|d| d.owns(unit_id))
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut UnitDescriptor> {
        self.descriptors.get_mut(index)
    }

    /// 是否存在指定内容摘要的描述符
    pub fn contains_hash(&self, hash: &str) -> bool {
        self.descriptors
            .iter()
            .any(|d| d.content_hash() == Some(hash))
    }

    /// 移除所有满足条件的描述符，保持其余描述符的顺序
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<UnitDescriptor>
    where
        F: FnMut(&UnitDescriptor) -> bool,
    {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.descriptors)
            .into_iter()
            .partition(|d| predicate(d));

        self.descriptors = kept;
        removed
    }

    /// 取出全部描述符，存储变为空
    pub fn take_all(&mut self) -> Vec<UnitDescriptor> {
        std::mem::take(&mut self.descriptors)
    }

    /// 用已排好序的描述符整体替换存储内容
    pub fn replace_all(&mut self, descriptors: Vec<UnitDescriptor>) {
        debug_assert!(is_recency_ordered(&descriptors));
        self.descriptors = descriptors;
    }

    /// 当前全部执行单元
    pub fn snapshot_units(&self) -> Vec<UnitRef> {
        self.descriptors.iter().map(|d| d.unit().clone()).collect()
    }

    /// 顺序是否满足时间戳降序
    pub fn is_ordered(&self) -> bool {
        is_recency_ordered(&self.descriptors)
    }
}

fn is_recency_ordered(descriptors: &[UnitDescriptor]) -> bool {
    descriptors
        .windows(2)
        .all(|pair| pair[0].timestamp() >= pair[1].timestamp())
}
