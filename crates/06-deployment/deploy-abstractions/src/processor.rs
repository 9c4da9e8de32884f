//! 部署包处理器抽象接口

use crate::resource::ResourceHandle;
use crate::unit::UnitRef;
use deployment_common::DeploymentResult;
use std::fmt;
use std::path::{Path, PathBuf};

/// 部署包处理结果
#[derive(Clone)]
pub struct ProcessedUnit {
    /// 暂存后的部署包路径
    pub staged_path: PathBuf,
    /// 加载得到的执行单元
    pub unit: UnitRef,
    /// 部署包中发现的任务
    pub task_types: Vec<ResourceHandle>,
    /// 内容摘要
    pub content_hash: Option<String>,
}

impl fmt::Debug for ProcessedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessedUnit")
            .field("staged_path", &self.staged_path)
            .field("unit", &self.unit.id())
            .field("task_types", &self.task_types)
            .field("content_hash", &self.content_hash)
            .finish()
    }
}

/// 部署包处理器 trait
///
/// 负责解包、校验和加载。失败时返回 [`DeploymentError::Processing`]，
/// 部署核心只记录日志并跳过该部署包。
///
/// [`DeploymentError::Processing`]: deployment_common::DeploymentError::Processing
pub trait UnitProcessor: Send + Sync {
    /// 处理一个已暂存的部署包
    fn process(&self, artifact: &Path, source_uri: &str, staging_dir: &Path) -> DeploymentResult<ProcessedUnit>;
}
