//! 资源注册表
//!
//! 在描述符存储之上实现名称解析和冲突处理：
//! 同一任务名称在任意时刻最多属于一个描述符，冲突时时间戳较新的一方胜出，
//! 失败方整体移除。

use crate::descriptor::{DescriptorSummary, UnitDescriptor};
use crate::store::DescriptorStore;
use deploy_abstractions::{DeploymentResource, ResourceHandle, UnitId, UnitRef};
use deployment_common::{redact, DeploymentError, DeploymentResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, error, info, warn};

/// 新引入的名称：名称 -> 资源全限定名
///
/// 声明了任务名称的资源会产生两条记录（任务名称和全限定名各一条）。
pub type NewNames = BTreeMap<String, String>;

/// 扫描得到的候选描述符的处理结果
#[derive(Debug, Default)]
pub struct Admission {
    /// 被移除的描述符，需要释放并通知监听器
    pub evicted: Vec<UnitDescriptor>,
    /// 被丢弃的候选描述符，需要释放但不通知监听器
    pub rejected: Option<UnitDescriptor>,
    /// 执行单元已由其他描述符持有，候选描述符被忽略，单元不得释放
    pub ignored: Option<UnitDescriptor>,
}

impl Admission {
    /// 候选描述符是否已加入存储
    pub fn is_admitted(&self) -> bool {
        self.rejected.is_none() && self.ignored.is_none()
    }
}

/// 资源注册表
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    store: DescriptorStore,
}

impl ResourceRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 底层存储
    pub fn store(&self) -> &DescriptorStore {
        &self.store
    }

    /// 向描述符添加资源，返回对该描述符而言新引入的名称
    ///
    /// 同一批资源声明了相同任务名称但全限定名不同，或者任务名称在该描述符中
    /// 已经绑定到其他资源时，返回 [`DeploymentError::NamingConflict`]，描述符保持不变。
    pub fn add_resources(
        desc: &mut UnitDescriptor,
        resources: &[ResourceHandle],
    ) -> DeploymentResult<NewNames> {
        let mut batch: HashMap<&str, &ResourceHandle> = HashMap::with_capacity(resources.len());

        for resource in resources {
            let Some(alias) = resource.alias() else {
                continue;
            };

            if let Some(previous) = batch.get(alias) {
                if previous.identity() != resource.identity() {
                    return Err(DeploymentError::naming_conflict(
                        alias,
                        previous.identity(),
                        resource.identity(),
                    ));
                }
            }
            batch.insert(alias, resource);
        }

        for (alias, resource) in &batch {
            if let Some(existing) = desc.resource_by_alias(alias) {
                if existing.identity() != resource.identity() {
                    return Err(DeploymentError::naming_conflict(
                        *alias,
                        existing.identity(),
                        resource.identity(),
                    ));
                }
            }
        }

        let mut new_names = NewNames::new();
        for resource in resources {
            let identity = resource.identity();
            match resource.alias() {
                Some(alias) => {
                    if desc.resource_by_alias(alias).is_none() {
                        new_names.insert(alias.to_string(), identity.to_string());
                        new_names.insert(identity.to_string(), identity.to_string());
                    }
                }
                None => {
                    if !desc.has_raw_resource(identity) {
                        new_names.insert(identity.to_string(), identity.to_string());
                    }
                }
            }
            desc.add_resource(resource.clone());
        }

        Ok(new_names)
    }

    /// 移除除 `exclude` 以外、发布或能够加载指定名称的描述符
    ///
    /// 描述符已发布其中任一名称，或者能直接加载其中任一全限定名时整体移除。
    pub fn remove_resources_elsewhere(
        &mut self,
        exclude: Option<UnitId>,
        names: &NewNames,
    ) -> Vec<UnitDescriptor> {
        self.store.remove_where(|desc| {
            if exclude.is_some_and(|id| desc.owns(id)) {
                return false;
            }

            if names.keys().any(|name| desc.find_resource(name).is_some()) {
                return true;
            }

            // 任务名称与全限定名成对出现，只需对全限定名探测
            names
                .iter()
                .any(|(name, identity)| name == identity && desc.unit().probe(identity))
        })
    }

    /// 判断两个描述符是否冲突
    ///
    /// `probing` 的执行单元用于探测 `existing` 的普通资源能否被加载。
    pub fn collides(probing: &UnitDescriptor, existing: &UnitDescriptor) -> bool {
        for alias in existing.aliases() {
            if probing.resource_by_alias(alias).is_some() {
                warn!(
                    "不同部署包中存在相同的任务名称，执行单元将被移除: task_name={}, 单元1={}, 单元2={}",
                    alias,
                    probing.unit_id(),
                    existing.unit_id()
                );
                return true;
            }
        }

        for resource in existing.raw_resources() {
            if !resource.is_task() && probing.unit().probe(resource.identity()) {
                warn!(
                    "不同部署包中存在相同的资源，执行单元将被移除: resource={}, 单元1={}, 单元2={}",
                    resource.identity(),
                    probing.unit_id(),
                    existing.unit_id()
                );
                return true;
            }
        }

        false
    }

    /// 直接注册资源
    ///
    /// 查找或创建该执行单元的直接注册描述符；有新名称时移除其他发布这些名称的描述符。
    /// 返回 (是否引入了新名称, 被移除的描述符)。
    pub fn register_direct(
        &mut self,
        unit: &UnitRef,
        resource: &ResourceHandle,
        timestamp: i64,
    ) -> DeploymentResult<(bool, Vec<UnitDescriptor>)> {
        let resources = std::slice::from_ref(resource);

        let new_names = match self
            .store
            .position_of_unit(unit.id())
            .and_then(|index| self.store.get_mut(index))
        {
            Some(desc) => Self::add_resources(desc, resources)?,
            None => {
                let mut desc = UnitDescriptor::programmatic(timestamp, unit.clone());
                let new_names = Self::add_resources(&mut desc, resources)?;
                self.store.insert_ordered(desc);
                new_names
            }
        };

        if new_names.is_empty() {
            debug!("资源已注册，无需变更: {}", resource);
            return Ok((false, Vec::new()));
        }

        let evicted = self.remove_resources_elsewhere(Some(unit.id()), &new_names);
        debug!(
            "资源注册完成: {}, 单元={}, 移除单元数={}",
            resource,
            unit.id(),
            evicted.len()
        );
        Ok((true, evicted))
    }

    /// 注销名称，移除任何发布或能加载该名称的描述符
    pub fn unregister_direct(&mut self, name: &str) -> Vec<UnitDescriptor> {
        let mut names = NewNames::new();
        names.insert(name.to_string(), name.to_string());

        self.remove_resources_elsewhere(None, &names)
    }

    /// 按名称查找资源，最新的描述符优先
    ///
    /// 名称是某个描述符的任务名称时，先换算为全限定名再解析。执行单元能加载
    /// 但未登记的普通资源会被登记到该描述符并返回；任务必须事先声明，不走此路径。
    pub fn lookup(&mut self, name: &str) -> Option<DeploymentResource> {
        for desc in self.store.iter_mut() {
            let identity = desc
                .resource_by_alias(name)
                .map_or_else(|| name.to_string(), |r| r.identity().to_string());

            let Some(resolved) = desc.unit().resolve(&identity) else {
                continue;
            };

            if let Some((_, alias)) = desc.find_resource(name) {
                let public_name = alias.unwrap_or(name).to_string();
                return Some(DeploymentResource::new(public_name, resolved, desc.unit().clone()));
            }

            if !resolved.is_task() {
                debug!("登记未声明的普通资源: {}, 单元={}", resolved, desc.unit_id());
                desc.add_resource(resolved.clone());
                return Some(DeploymentResource::new(name, resolved, desc.unit().clone()));
            }
        }

        None
    }

    /// 接收扫描得到的候选描述符
    ///
    /// 候选描述符的资源必须已经通过 [`Self::add_resources`] 登记。
    /// 来自同一部署源位置但部署包不同的描述符总是被替换；其余情况按时间戳决定冲突胜负。
    pub fn admit_source_unit(&mut self, candidate: UnitDescriptor, check_md5: bool) -> Admission {
        if self.store.position_of_unit(candidate.unit_id()).is_some() {
            error!(
                "执行单元已部署，忽略重复的扫描结果: 单元={}, uri={}",
                candidate.unit_id(),
                redact(candidate.source_uri().unwrap_or_default())
            );
            return Admission {
                ignored: Some(candidate),
                ..Admission::default()
            };
        }

        if check_md5 {
            if let Some(hash) = candidate.content_hash() {
                if self.store.contains_hash(hash) {
                    info!(
                        "内容摘要相同，跳过新的部署单元: uri={}, file={}",
                        redact(candidate.source_uri().unwrap_or_default()),
                        candidate
                            .staged_path()
                            .map_or_else(|| "N/A".to_string(), |p| p.display().to_string())
                    );
                    return Admission {
                        rejected: Some(candidate),
                        ..Admission::default()
                    };
                }
            }
        }

        let existing = self.store.take_all();
        let mut kept: Vec<UnitDescriptor> = Vec::with_capacity(existing.len() + 1);
        let mut evicted = Vec::new();
        // 候选描述符在 kept 中的插入位置
        let mut insert_at: Option<usize> = None;
        let mut remaining = existing.into_iter();

        while let Some(desc) = remaining.next() {
            if desc.is_source_derived()
                && desc.source_uri() == candidate.source_uri()
                && desc.staged_path() != candidate.staged_path()
            {
                debug!(
                    "同一位置的部署包已更新，移除旧单元: uri={}, 单元={}",
                    redact(desc.source_uri().unwrap_or_default()),
                    desc.unit_id()
                );
                evicted.push(desc);
                continue;
            }

            if insert_at.is_some() {
                if Self::collides(&candidate, &desc) {
                    evicted.push(desc);
                } else {
                    kept.push(desc);
                }
            } else if candidate.timestamp() >= desc.timestamp() {
                insert_at = Some(kept.len());
                if Self::collides(&desc, &candidate) {
                    evicted.push(desc);
                } else {
                    kept.push(desc);
                }
            } else if Self::collides(&candidate, &desc) {
                // 更新的单元已发布冲突名称，丢弃候选描述符
                kept.push(desc);
                kept.extend(remaining);
                self.store.replace_all(kept);
                return Admission {
                    evicted,
                    rejected: Some(candidate),
                    ignored: None,
                };
            } else {
                kept.push(desc);
            }
        }

        debug!(
            "执行单元已(重新)注册: 单元={}, tstamp={}, uri={}, file={}",
            candidate.unit_id(),
            candidate.timestamp(),
            redact(candidate.source_uri().unwrap_or_default()),
            candidate
                .staged_path()
                .map_or_else(|| "N/A".to_string(), |p| p.display().to_string())
        );

        let index = insert_at.unwrap_or(kept.len());
        kept.insert(index, candidate);
        self.store.replace_all(kept);

        Admission {
            evicted,
            rejected: None,
            ignored: None,
        }
    }

    /// 移除来自指定部署源位置的扫描描述符
    pub fn remove_by_uris(&mut self, uris: &HashSet<String>) -> Vec<UnitDescriptor> {
        self.store.remove_where(|desc| {
            desc.is_source_derived() && desc.source_uri().is_some_and(|uri| uris.contains(uri))
        })
    }

    /// 取出全部描述符
    pub fn drain(&mut self) -> Vec<UnitDescriptor> {
        self.store.take_all()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// 全部描述符摘要，按优先级顺序
    pub fn summaries(&self) -> Vec<DescriptorSummary> {
        self.store.iter().map(UnitDescriptor::summary).collect()
    }
}
