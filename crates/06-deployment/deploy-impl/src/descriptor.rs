//! 部署单元描述符

use deploy_abstractions::{ResourceHandle, UnitId, UnitRef};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// 描述符来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorKind {
    /// 扫描部署源得到，部署包被删除或被替换时移除
    SourceDerived,
    /// 运行时直接注册，重新扫描不会移除
    Programmatic,
}

/// 部署单元描述符
///
/// 独占一个执行单元，并记录该单元对外发布的任务名称和资源。
pub struct UnitDescriptor {
    kind: DescriptorKind,
    source_uri: Option<String>,
    staged_path: Option<PathBuf>,
    timestamp: i64,
    content_hash: Option<String>,
    unit: UnitRef,
    /// 任务名称 -> 资源
    resources_by_alias: HashMap<String, ResourceHandle>,
    /// 全限定名 -> 资源
    raw_resources: BTreeMap<String, ResourceHandle>,
}

impl UnitDescriptor {
    /// 创建扫描得到的描述符
    pub fn source_derived(
        source_uri: impl Into<String>,
        staged_path: impl Into<PathBuf>,
        timestamp: i64,
        unit: UnitRef,
        content_hash: Option<String>,
    ) -> Self {
        Self {
            kind: DescriptorKind::SourceDerived,
            source_uri: Some(source_uri.into()),
            staged_path: Some(staged_path.into()),
            timestamp,
            content_hash,
            unit,
            resources_by_alias: HashMap::new(),
            raw_resources: BTreeMap::new(),
        }
    }

    /// 创建直接注册的描述符
    pub fn programmatic(timestamp: i64, unit: UnitRef) -> Self {
        Self {
            kind: DescriptorKind::Programmatic,
            source_uri: None,
            staged_path: None,
            timestamp,
            content_hash: None,
            unit,
            resources_by_alias: HashMap::new(),
            raw_resources: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> DescriptorKind {
        self.kind
    }

    pub fn is_source_derived(&self) -> bool {
        self.kind == DescriptorKind::SourceDerived
    }

    pub fn source_uri(&self) -> Option<&str> {
        self.source_uri.as_deref()
    }

    pub fn staged_path(&self) -> Option<&Path> {
        self.staged_path.as_deref()
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }

    pub fn unit(&self) -> &UnitRef {
        &self.unit
    }

    pub fn unit_id(&self) -> UnitId {
        self.unit.id()
    }

    /// 是否持有指定执行单元
    pub fn owns(&self, unit_id: UnitId) -> bool {
        self.unit.id() == unit_id
    }

    /// 记录资源；声明了任务名称的任务同时按名称登记
    pub fn add_resource(&mut self, resource: ResourceHandle) {
        if let Some(alias) = resource.alias() {
            self.resources_by_alias
                .insert(alias.to_string(), resource.clone());
        }
        self.raw_resources
            .insert(resource.identity().to_string(), resource);
    }

    /// 按任务名称查找
    pub fn resource_by_alias(&self, alias: &str) -> Option<&ResourceHandle> {
        self.resources_by_alias.get(alias)
    }

    /// 是否已记录指定全限定名的资源
    pub fn has_raw_resource(&self, identity: &str) -> bool {
        self.raw_resources.contains_key(identity)
    }

    /// 按任务名称或全限定名查找已记录的资源
    ///
    /// 返回资源及其任务名称（如果有）。
    pub fn find_resource(&self, name: &str) -> Option<(&ResourceHandle, Option<&str>)> {
        if let Some((alias, resource)) = self.resources_by_alias.get_key_value(name) {
            return Some((resource, Some(alias.as_str())));
        }

        self.raw_resources
            .get(name)
            .map(|resource| (resource, resource.alias()))
    }

    /// 对外发布的任务名称
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.resources_by_alias.keys().map(String::as_str)
    }

    /// 已记录的全部资源
    pub fn raw_resources(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.raw_resources.values()
    }

    /// 生成摘要
    pub fn summary(&self) -> DescriptorSummary {
        let mut aliases: Vec<String> = self.aliases().map(str::to_string).collect();
        aliases.sort();

        DescriptorSummary {
            unit_id: self.unit_id(),
            kind: self.kind,
            source_uri: self.source_uri.clone(),
            timestamp: self.timestamp,
            aliases,
            resources: self.raw_resources.keys().cloned().collect(),
        }
    }
}

impl fmt::Debug for UnitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitDescriptor")
            .field("kind", &self.kind)
            .field("source_uri", &self.source_uri)
            .field("staged_path", &self.staged_path)
            .field("timestamp", &self.timestamp)
            .field("content_hash", &self.content_hash)
            .field("unit", &self.unit.id())
            .field("aliases", &self.resources_by_alias.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// 按时间戳降序比较，时间戳越大越靠前
pub fn compare_recency(a: &UnitDescriptor, b: &UnitDescriptor) -> Ordering {
    b.timestamp.cmp(&a.timestamp)
}

/// 描述符摘要，不持有执行单元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSummary {
    pub unit_id: UnitId,
    pub kind: DescriptorKind,
    pub source_uri: Option<String>,
    pub timestamp: i64,
    /// 任务名称（已排序）
    pub aliases: Vec<String>,
    /// 资源全限定名（已排序）
    pub resources: Vec<String>,
}
