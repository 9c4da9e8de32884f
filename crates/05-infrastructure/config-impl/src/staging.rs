//! 临时部署目录
//!
//! 目录结构为 `<基础路径>/grid.uri.deployment.tmp/<节点ID>`，
//! 基础路径未配置时使用系统临时目录。

use deployment_common::{ConfigError, ConfigResult, DEPLOY_TMP_ROOT_NAME};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 创建节点专属的临时部署目录
///
/// 目录必须可读写，否则返回 [`ConfigError::StagingDirectory`]。
pub fn prepare_staging_dir(base: Option<&Path>, node_id: &Uuid) -> ConfigResult<PathBuf> {
    let base = base.map_or_else(std::env::temp_dir, Path::to_path_buf);
    let dir = base.join(DEPLOY_TMP_ROOT_NAME).join(node_id.to_string());

    fs::create_dir_all(&dir).map_err(|e| staging_error(&dir, e.to_string()))?;

    let metadata = fs::metadata(&dir).map_err(|e| staging_error(&dir, e.to_string()))?;
    if !metadata.is_dir() {
        return Err(staging_error(&dir, "路径不是目录"));
    }
    if metadata.permissions().readonly() {
        return Err(staging_error(&dir, "目录不可写"));
    }
    fs::read_dir(&dir).map_err(|e| staging_error(&dir, format!("目录不可读: {e}")))?;

    info!("临时部署目录已就绪: {}", dir.display());
    Ok(dir)
}

/// 删除临时部署目录，失败时只记录警告
pub fn remove_staging_dir(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Ok(()) => debug!("临时部署目录已删除: {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("临时部署目录删除失败: {}, 错误: {}", dir.display(), e),
    }
}

fn staging_error(dir: &Path, message: impl Into<String>) -> ConfigError {
    ConfigError::StagingDirectory {
        path: dir.display().to_string(),
        message: message.into(),
    }
}
