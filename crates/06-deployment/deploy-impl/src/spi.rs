//! URI 部署 SPI
//!
//! 为每个部署源启动一个扫描器，将扫描事件交给 [`DeploymentCore`]，
//! 并对外提供查找、注册和注销操作。

use crate::deployment::DeploymentCore;
use crate::descriptor::DescriptorSummary;
use deploy_abstractions::{
    ArtifactFilter, DeploymentListener, DeploymentResource, ResourceHandle, Scanner,
    ScannerContext, ScannerFactory, ScannerListener, UnitProcessor, UnitRef,
};
use deployment_common::{
    redact, DeploymentConfig, DeploymentError, DeploymentResult, LookupError, LookupResult,
    SourceUri, DEFAULT_DISK_SCAN_FREQUENCY_MS,
};
use deployment_config::{prepare_staging_dir, remove_staging_dir, resolve_sources};
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// 运行期状态
#[derive(Default)]
struct SpiState {
    started: bool,
    sources: Vec<SourceUri>,
    scanners: Vec<Box<dyn Scanner>>,
    staging_dir: Option<PathBuf>,
}

/// URI 部署 SPI
pub struct UriDeploymentSpi {
    config: DeploymentConfig,
    node_id: Uuid,
    work_dir: PathBuf,
    core: Arc<DeploymentCore>,
    factories: Vec<Arc<dyn ScannerFactory>>,
    processor: Arc<dyn UnitProcessor>,
    state: Mutex<SpiState>,
}

impl UriDeploymentSpi {
    pub(crate) fn new(
        config: DeploymentConfig,
        work_dir: PathBuf,
        factories: Vec<Arc<dyn ScannerFactory>>,
        processor: Arc<dyn UnitProcessor>,
        listener: Option<Arc<dyn DeploymentListener>>,
    ) -> Self {
        let core = Arc::new(DeploymentCore::new(
            config.check_md5,
            config.readiness_check_interval(),
        ));
        core.set_listener(listener);

        Self {
            config,
            node_id: Uuid::new_v4(),
            work_dir,
            core,
            factories,
            processor,
            state: Mutex::new(SpiState::default()),
        }
    }

    /// 启动：解析部署源、准备临时目录、为每个部署源启动扫描器
    ///
    /// 任一步骤失败时已启动的扫描器会被停止，SPI 保持未启动状态。
    pub fn start(&self) -> DeploymentResult<()> {
        let mut state = self.state.lock();
        if state.started {
            return Err(DeploymentError::AlreadyStarted);
        }

        let sources = resolve_sources(&self.config, &self.work_dir)?;
        let staging_dir =
            prepare_staging_dir(self.config.temporary_directory_path.as_deref(), &self.node_id)?;

        self.core.readiness().arm(sources.len());

        let mut scanners: Vec<Box<dyn Scanner>> = Vec::with_capacity(sources.len());
        for source in &sources {
            match self.start_scanner(source, &staging_dir) {
                Ok(scanner) => scanners.push(scanner),
                Err(e) => {
                    error!("部署 SPI 启动失败: {}", e);
                    self.shutdown(&mut scanners, &staging_dir);
                    return Err(e);
                }
            }
        }

        debug!("部署 SPI 配置: tmp_dir={}", staging_dir.display());
        debug!(
            "部署 SPI 配置: uri_list={:?}",
            sources.iter().map(SourceUri::redacted).collect::<Vec<_>>()
        );
        debug!("部署 SPI 配置: encode_uri={}", self.config.encode_uri);
        info!(
            "部署 SPI 已启动: node_id={}, 部署源数量={}",
            self.node_id,
            sources.len()
        );

        state.started = true;
        state.sources = sources;
        state.scanners = scanners;
        state.staging_dir = Some(staging_dir);
        Ok(())
    }

    fn start_scanner(&self, source: &SourceUri, staging_dir: &Path) -> DeploymentResult<Box<dyn Scanner>> {
        let protocol = source.scheme();
        let factory = self
            .factories
            .iter()
            .find(|f| f.protocols().iter().any(|p| p.eq_ignore_ascii_case(protocol)))
            .ok_or_else(|| DeploymentError::UnsupportedProtocol {
                protocol: protocol.to_string(),
            })?;

        let frequency = source
            .effective_frequency()
            .unwrap_or(Duration::from_millis(DEFAULT_DISK_SCAN_FREQUENCY_MS));

        let listener = Arc::new(SourceScanListener {
            source: source.redacted(),
            core: Arc::clone(&self.core),
            processor: Arc::clone(&self.processor),
            staging_dir: staging_dir.to_path_buf(),
            first_scan_reported: AtomicBool::new(false),
        });

        let mut scanner = factory.create(ScannerContext {
            source: source.clone(),
            staging_dir: staging_dir.to_path_buf(),
            frequency,
            filter: ArtifactFilter::new(),
            listener,
        })?;
        scanner.start()?;

        info!(
            "扫描器已启动: {}, uri={}, 间隔={}ms",
            scanner.name(),
            source,
            frequency.as_millis()
        );
        Ok(scanner)
    }

    /// 停止：取消并等待全部扫描器，释放全部执行单元，删除临时目录
    ///
    /// 未启动时调用无副作用。
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if !state.started {
            return;
        }

        let staging_dir = state.staging_dir.take().unwrap_or_default();
        let mut scanners = std::mem::take(&mut state.scanners);
        self.shutdown(&mut scanners, &staging_dir);

        state.sources.clear();
        state.started = false;
        info!("部署 SPI 已停止: node_id={}", self.node_id);
    }

    fn shutdown(&self, scanners: &mut Vec<Box<dyn Scanner>>, staging_dir: &Path) {
        for scanner in scanners.iter() {
            scanner.cancel();
        }
        for scanner in scanners.iter_mut() {
            scanner.join();
            debug!("扫描器已停止: {}", scanner.name());
        }
        scanners.clear();

        self.core.drain();

        if !staging_dir.as_os_str().is_empty() {
            remove_staging_dir(staging_dir);
        }
        self.core.readiness().close();
    }

    /// 查找资源，全部部署源完成首次扫描之前阻塞
    pub fn find_resource(&self, name: &str) -> LookupResult<DeploymentResource> {
        self.core.find_resource(name)
    }

    /// 可取消的资源查找，取消在下一次复查时生效
    pub fn find_resource_cancellable(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> LookupResult<DeploymentResource> {
        self.core.find_resource_cancellable(name, Some(cancel))
    }

    /// 异步资源查找，丢弃返回的 future 会取消等待
    pub async fn find_resource_async(&self, name: &str) -> LookupResult<DeploymentResource> {
        let token = CancellationToken::new();
        let mut guard = WaitGuard {
            token: token.clone(),
            core: Arc::clone(&self.core),
            armed: true,
        };

        let core = Arc::clone(&self.core);
        let owned_name = name.to_string();
        let result = tokio::task::spawn_blocking(move || {
            core.find_resource_cancellable(&owned_name, Some(&token))
        })
        .await;
        guard.armed = false;

        result.unwrap_or_else(|e| {
            error!("资源查找任务异常结束: {}, 错误: {}", name, e);
            Err(LookupError::Cancelled {
                name: name.to_string(),
            })
        })
    }

    /// 直接注册资源，返回是否引入了新名称
    pub fn register(&self, unit: &UnitRef, resource: &ResourceHandle) -> DeploymentResult<bool> {
        self.core.register(unit, resource)
    }

    /// 注销名称，返回是否有执行单元被移除
    pub fn unregister(&self, name: &str) -> bool {
        self.core.unregister(name)
    }

    /// 设置部署监听器
    pub fn set_listener(&self, listener: Option<Arc<dyn DeploymentListener>>) {
        self.core.set_listener(listener);
    }

    /// 配置的部署源 URI 列表
    pub fn uri_list(&self) -> &[String] {
        &self.config.uri_list
    }

    pub fn is_check_md5(&self) -> bool {
        self.core.is_check_md5()
    }

    /// 临时目录基础路径，未配置时为系统临时目录
    pub fn temporary_directory_path(&self) -> PathBuf {
        self.config
            .temporary_directory_path
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// 本节点的临时部署目录，仅在运行期间存在
    pub fn staging_dir(&self) -> Option<PathBuf> {
        self.state.lock().staging_dir.clone()
    }

    /// 运行期间实际使用的部署源
    pub fn active_sources(&self) -> Vec<SourceUri> {
        self.state.lock().sources.clone()
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().started
    }

    pub fn node_id(&self) -> Uuid {
        self.node_id
    }

    pub fn deployed_unit_count(&self) -> usize {
        self.core.deployed_unit_count()
    }

    /// 当前部署的全部执行单元
    pub fn deployed_units(&self) -> Vec<UnitRef> {
        self.core.deployed_units()
    }

    /// 描述符摘要，按查找优先级排序
    pub fn descriptors(&self) -> Vec<DescriptorSummary> {
        self.core.descriptors()
    }

    /// 部署核心
    pub fn core(&self) -> &Arc<DeploymentCore> {
        &self.core
    }
}

impl Drop for UriDeploymentSpi {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for UriDeploymentSpi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UriDeploymentSpi")
            .field("node_id", &self.node_id)
            .field(
                "uri_list",
                &self.config.uri_list.iter().map(|u| redact(u)).collect::<Vec<_>>(),
            )
            .field("check_md5", &self.config.check_md5)
            .field("encode_uri", &self.config.encode_uri)
            .field("factories", &self.factories.len())
            .field("core", &self.core)
            .finish()
    }
}

/// 异步查找被丢弃时取消等待
struct WaitGuard {
    token: CancellationToken,
    core: Arc<DeploymentCore>,
    armed: bool,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if self.armed {
            self.token.cancel();
            self.core.readiness().interrupt();
        }
    }
}

/// 单个部署源的扫描事件处理
struct SourceScanListener {
    /// 脱敏后的部署源，用于日志
    source: String,
    core: Arc<DeploymentCore>,
    processor: Arc<dyn UnitProcessor>,
    staging_dir: PathBuf,
    first_scan_reported: AtomicBool,
}

impl ScannerListener for SourceScanListener {
    fn on_new_or_updated(&self, artifact: &Path, source_uri: &str, timestamp_ms: i64) {
        info!(
            "发现新的或更新的部署包: uri={}, file={}, tstamp={}",
            redact(source_uri),
            artifact.display(),
            timestamp_ms
        );

        match self.processor.process(artifact, source_uri, &self.staging_dir) {
            Ok(processed) => self.core.on_unit_discovered(
                source_uri,
                processed.staged_path,
                timestamp_ms,
                processed.unit,
                &processed.task_types,
                processed.content_hash,
            ),
            Err(e) => error!("部署包处理失败: {}, 错误: {}", artifact.display(), e),
        }
    }

    fn on_deleted(&self, source_uris: &[String]) {
        info!(
            "发现已删除的部署包: {:?}",
            source_uris.iter().map(|u| redact(u)).collect::<Vec<_>>()
        );
        self.core.on_units_removed(source_uris);
    }

    fn on_first_scan_finished(&self) {
        if self.first_scan_reported.swap(true, Ordering::SeqCst) {
            warn!("扫描器重复报告首次扫描完成: {}", self.source);
            return;
        }
        debug!("部署源首次扫描完成: {}", self.source);
        self.core.on_first_scan_finished();
    }
}
