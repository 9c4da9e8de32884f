//! 测试替身
//!
//! 手动驱动的扫描器、记录通知的监听器和基于内存执行单元的处理器。

use deploy_abstractions::{
    DeploymentListener, ExecutionUnit, ProcessedUnit, ResourceHandle, Scanner, ScannerContext,
    ScannerFactory, ScannerListener, StaticExecutionUnit, UnitId, UnitProcessor, UnitRef,
};
use deployment_common::{DeploymentError, DeploymentResult, SourceUri};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// 记录执行单元释放通知的监听器
#[derive(Debug, Default)]
pub struct RecordingListener {
    released: Mutex<Vec<UnitId>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 按通知顺序返回被释放的单元
    pub fn released(&self) -> Vec<UnitId> {
        self.released.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.released.lock().len()
    }

    pub fn was_released(&self, id: UnitId) -> bool {
        self.released.lock().contains(&id)
    }
}

impl DeploymentListener for RecordingListener {
    fn on_unit_released(&self, unit: &UnitRef) {
        self.released.lock().push(unit.id());
    }
}

/// 预先登记的部署包内容
#[derive(Debug, Clone)]
struct StubArtifact {
    resources: Vec<ResourceHandle>,
    tasks: Vec<ResourceHandle>,
    content_hash: Option<String>,
}

/// 按部署包文件名生成内存执行单元的处理器
///
/// 每次处理都会创建新的执行单元，与真实的加载行为一致。
#[derive(Debug, Default)]
pub struct StubProcessor {
    artifacts: Mutex<HashMap<String, StubArtifact>>,
    created: Mutex<Vec<(String, Arc<StaticExecutionUnit>)>>,
}

impl StubProcessor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 登记部署包：任务同时作为单元资源
    pub fn add_artifact(&self, file_name: &str, tasks: Vec<ResourceHandle>, content_hash: Option<&str>) {
        self.add_artifact_with_resources(file_name, tasks.clone(), tasks, content_hash);
    }

    /// 登记部署包，单元资源和声明的任务分别指定
    pub fn add_artifact_with_resources(
        &self,
        file_name: &str,
        resources: Vec<ResourceHandle>,
        tasks: Vec<ResourceHandle>,
        content_hash: Option<&str>,
    ) {
        self.artifacts.lock().insert(
            file_name.to_string(),
            StubArtifact {
                resources,
                tasks,
                content_hash: content_hash.map(str::to_string),
            },
        );
    }

    /// 已创建的全部执行单元，按创建顺序
    pub fn created_units(&self) -> Vec<Arc<StaticExecutionUnit>> {
        self.created.lock().iter().map(|(_, unit)| unit.clone()).collect()
    }

    /// 最近一次为指定部署包创建的执行单元
    pub fn last_unit_for(&self, file_name: &str) -> Option<Arc<StaticExecutionUnit>> {
        self.created
            .lock()
            .iter()
            .rev()
            .find(|(name, _)| name == file_name)
            .map(|(_, unit)| unit.clone())
    }
}

impl UnitProcessor for StubProcessor {
    fn process(&self, artifact: &Path, source_uri: &str, staging_dir: &Path) -> DeploymentResult<ProcessedUnit> {
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let stub = self
            .artifacts
            .lock()
            .get(&file_name)
            .cloned()
            .ok_or_else(|| DeploymentError::processing(source_uri, format!("未知的部署包: {file_name}")))?;

        let unit = StaticExecutionUnit::shared(stub.resources);
        self.created.lock().push((file_name.clone(), unit.clone()));

        Ok(ProcessedUnit {
            staged_path: staging_dir.join(format!("{}-{}", unit.id(), file_name)),
            unit,
            task_types: stub.tasks,
            content_hash: stub.content_hash,
        })
    }
}

/// 手动扫描器的控制句柄
#[derive(Clone)]
pub struct ScannerHandle {
    source: SourceUri,
    frequency: Duration,
    listener: Arc<dyn ScannerListener>,
    started: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
    joined: Arc<AtomicBool>,
}

impl ScannerHandle {
    pub fn source(&self) -> &SourceUri {
        &self.source
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    /// 报告新的或已更新的部署包
    pub fn publish(&self, file_name: &str, timestamp_ms: i64) {
        let source_uri = self.artifact_uri(file_name);
        self.listener
            .on_new_or_updated(Path::new(file_name), &source_uri, timestamp_ms);
    }

    /// 报告部署包已删除
    pub fn delete(&self, file_names: &[&str]) {
        let uris: Vec<String> = file_names.iter().map(|f| self.artifact_uri(f)).collect();
        self.listener.on_deleted(&uris);
    }

    /// 报告首次扫描完成
    pub fn finish_first_scan(&self) {
        self.listener.on_first_scan_finished();
    }

    /// 部署包在部署源中的位置
    pub fn artifact_uri(&self, file_name: &str) -> String {
        format!("{}/{}", self.source.as_str().trim_end_matches('/'), file_name)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }
}

/// 由测试手动驱动的扫描器
struct ManualScanner {
    name: String,
    handle: ScannerHandle,
    fail_start: bool,
}

impl Scanner for ManualScanner {
    fn name(&self) -> &str {
        &self.name
    }

    fn start(&mut self) -> DeploymentResult<()> {
        if self.fail_start {
            return Err(DeploymentError::ScannerStart {
                uri: self.handle.source.redacted(),
                message: "模拟启动失败".to_string(),
            });
        }
        self.handle.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn cancel(&self) {
        self.handle.cancelled.store(true, Ordering::SeqCst);
    }

    fn join(&mut self) {
        self.handle.joined.store(true, Ordering::SeqCst);
    }
}

/// 创建手动扫描器的工厂
pub struct ManualScannerFactory {
    protocols: Vec<&'static str>,
    handles: Mutex<Vec<ScannerHandle>>,
    created: AtomicUsize,
    fail_start_for: Option<String>,
}

impl ManualScannerFactory {
    /// 支持 `file`、`http`、`https`、`ftp`
    pub fn new() -> Arc<Self> {
        Arc::new(Self::with_protocols(vec!["file", "http", "https", "ftp"]))
    }

    pub fn with_protocols(protocols: Vec<&'static str>) -> Self {
        Self {
            protocols,
            handles: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            fail_start_for: None,
        }
    }

    /// URI 包含指定文本的扫描器启动失败
    pub fn failing_on(uri_fragment: &str) -> Arc<Self> {
        let mut factory = Self::with_protocols(vec!["file", "http", "https", "ftp"]);
        factory.fail_start_for = Some(uri_fragment.to_string());
        Arc::new(factory)
    }

    /// 已创建的扫描器句柄，按创建顺序
    pub fn handles(&self) -> Vec<ScannerHandle> {
        self.handles.lock().clone()
    }

    pub fn handle(&self, index: usize) -> Option<ScannerHandle> {
        self.handles.lock().get(index).cloned()
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ScannerFactory for ManualScannerFactory {
    fn protocols(&self) -> &[&str] {
        &self.protocols
    }

    fn create(&self, context: ScannerContext) -> DeploymentResult<Box<dyn Scanner>> {
        let index = self.created.fetch_add(1, Ordering::SeqCst);
        let fail_start = self
            .fail_start_for
            .as_deref()
            .is_some_and(|fragment| context.source.as_str().contains(fragment));

        let handle = ScannerHandle {
            source: context.source,
            frequency: context.frequency,
            listener: context.listener,
            started: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
            joined: Arc::new(AtomicBool::new(false)),
        };
        self.handles.lock().push(handle.clone());

        Ok(Box::new(ManualScanner {
            name: format!("manual-scanner-{index}"),
            handle,
            fail_start,
        }))
    }
}
