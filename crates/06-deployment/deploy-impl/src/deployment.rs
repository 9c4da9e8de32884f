//! 部署核心
//!
//! 持有注册表、就绪门和监听器。所有描述符变更都在同一把互斥锁内完成，
//! 执行单元释放和监听器通知在释放锁之后进行。

use crate::descriptor::{DescriptorSummary, UnitDescriptor};
use crate::readiness::ReadinessGate;
use crate::registry::ResourceRegistry;
use chrono::Utc;
use deploy_abstractions::{DeploymentListener, DeploymentResource, ResourceHandle, UnitRef};
use deployment_common::{redact, DeploymentResult, LookupError, LookupResult};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 当前时间（毫秒）
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 部署核心
pub struct DeploymentCore {
    registry: Mutex<ResourceRegistry>,
    gate: ReadinessGate,
    listener: RwLock<Option<Arc<dyn DeploymentListener>>>,
    check_md5: bool,
}

impl DeploymentCore {
    /// 创建部署核心
    pub fn new(check_md5: bool, readiness_check_interval: Duration) -> Self {
        Self {
            registry: Mutex::new(ResourceRegistry::new()),
            gate: ReadinessGate::new(readiness_check_interval),
            listener: RwLock::new(None),
            check_md5,
        }
    }

    /// 设置部署监听器
    pub fn set_listener(&self, listener: Option<Arc<dyn DeploymentListener>>) {
        *self.listener.write() = listener;
    }

    pub fn is_check_md5(&self) -> bool {
        self.check_md5
    }

    /// 就绪门
    pub fn readiness(&self) -> &ReadinessGate {
        &self.gate
    }

    /// 发现新的或已更新的部署包
    ///
    /// 时间戳不会晚于当前时间。部署包内部任务名称冲突时整个部署包被丢弃。
    pub fn on_unit_discovered(
        &self,
        source_uri: &str,
        staged_path: PathBuf,
        timestamp: i64,
        unit: UnitRef,
        task_types: &[ResourceHandle],
        content_hash: Option<String>,
    ) {
        let timestamp = timestamp.min(now_millis());

        let admission = {
            let mut registry = self.registry.lock();

            // 单元仍由现有描述符使用，不能释放
            if registry.store().position_of_unit(unit.id()).is_some() {
                error!(
                    "执行单元已部署，忽略扫描结果: uri={}, 单元={}",
                    redact(source_uri),
                    unit.id()
                );
                return;
            }

            let mut candidate = UnitDescriptor::source_derived(
                source_uri,
                staged_path,
                timestamp,
                unit.clone(),
                content_hash,
            );

            if let Err(e) = ResourceRegistry::add_resources(&mut candidate, task_types) {
                warn!("部署包注册失败，已丢弃: uri={}, 错误: {}", redact(source_uri), e);
                drop(registry);
                unit.release();
                return;
            }

            registry.admit_source_unit(candidate, self.check_md5)
        };

        if let Some(rejected) = admission.rejected {
            debug!("候选执行单元未部署: {}", rejected.unit_id());
            rejected.unit().release();
        }
        self.release_all(admission.evicted);
    }

    /// 部署包已从部署源中删除
    pub fn on_units_removed(&self, source_uris: &[String]) {
        if source_uris.is_empty() {
            return;
        }

        let uris: HashSet<String> = source_uris.iter().cloned().collect();
        let removed = self.registry.lock().remove_by_uris(&uris);

        if !removed.is_empty() {
            info!("已移除被删除的部署单元: {}", removed.len());
        }
        self.release_all(removed);
    }

    /// 一个部署源完成首次扫描
    pub fn on_first_scan_finished(&self) {
        self.gate.complete_one();
    }

    /// 查找资源，全部部署源完成首次扫描之前阻塞
    pub fn find_resource(&self, name: &str) -> LookupResult<DeploymentResource> {
        self.find_resource_cancellable(name, None)
    }

    /// 可取消的资源查找
    pub fn find_resource_cancellable(
        &self,
        name: &str,
        cancel: Option<&CancellationToken>,
    ) -> LookupResult<DeploymentResource> {
        if !self.gate.wait(cancel) {
            warn!("等待部署源首次扫描完成时被取消: {}", name);
            return Err(LookupError::Cancelled {
                name: name.to_string(),
            });
        }

        self.registry
            .lock()
            .lookup(name)
            .ok_or_else(|| LookupError::NotFound {
                name: name.to_string(),
            })
    }

    /// 直接注册资源，返回是否引入了新名称
    pub fn register(&self, unit: &UnitRef, resource: &ResourceHandle) -> DeploymentResult<bool> {
        let (is_new, evicted) = self
            .registry
            .lock()
            .register_direct(unit, resource, now_millis())?;

        self.release_all(evicted);
        Ok(is_new)
    }

    /// 注销名称，返回是否有执行单元被移除
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.registry.lock().unregister_direct(name);
        let any = !removed.is_empty();

        self.release_all(removed);
        any
    }

    /// 移除全部描述符并释放执行单元
    pub fn drain(&self) {
        let units = {
            let mut registry = self.registry.lock();
            let units = registry.store().snapshot_units();
            registry.drain();
            units
        };

        if !units.is_empty() {
            info!("释放全部执行单元: {}", units.len());
        }
        self.release_units(units);
    }

    /// 当前部署的全部执行单元，按查找优先级排序
    pub fn deployed_units(&self) -> Vec<UnitRef> {
        self.registry.lock().store().snapshot_units()
    }

    /// 当前部署的执行单元数量
    pub fn deployed_unit_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// 描述符摘要，按查找优先级排序
    pub fn descriptors(&self) -> Vec<DescriptorSummary> {
        self.registry.lock().summaries()
    }

    /// 释放执行单元并通知监听器，调用时不得持有注册表锁
    fn release_all(&self, descriptors: Vec<UnitDescriptor>) {
        self.release_units(descriptors.iter().map(|d| d.unit().clone()).collect());
    }

    fn release_units(&self, units: Vec<UnitRef>) {
        if units.is_empty() {
            return;
        }

        let listener = self.listener.read().clone();
        for unit in &units {
            debug!("释放执行单元: {}", unit.id());
            unit.release();

            if let Some(listener) = &listener {
                listener.on_unit_released(unit);
            }
        }
    }
}

impl fmt::Debug for DeploymentCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeploymentCore")
            .field("deployed_units", &self.deployed_unit_count())
            .field("readiness", &self.gate.progress())
            .field("check_md5", &self.check_md5)
            .field("has_listener", &self.listener.read().is_some())
            .finish()
    }
}
