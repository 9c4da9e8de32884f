//! 部署源解析

use deployment_common::{
    ConfigError, ConfigResult, DeploymentConfig, SourceUri, DEFAULT_DEPLOY_DIR,
};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

/// 解析配置中的部署源列表
///
/// 列表为空时使用工作目录下的 `deployment/file` 作为唯一的本地部署源，
/// 目录不存在时自动创建。任意一个 URI 格式错误都会导致失败。
pub fn resolve_sources(config: &DeploymentConfig, work_dir: &Path) -> ConfigResult<Vec<SourceUri>> {
    if config.uri_list.is_empty() {
        let source = default_source(work_dir)?;
        info!("未配置部署源，使用默认目录: {}", source);
        return Ok(vec![source]);
    }

    config
        .uri_list
        .iter()
        .map(|raw| {
            let source = SourceUri::parse(raw, config.encode_uri)?;
            debug!("部署源: {}", source);
            Ok(source)
        })
        .collect()
}

/// 工作目录下的默认本地部署源
pub fn default_source(work_dir: &Path) -> ConfigResult<SourceUri> {
    let dir = work_dir.join(DEFAULT_DEPLOY_DIR);
    fs::create_dir_all(&dir)?;

    let absolute = dir.canonicalize()?;
    let url = Url::from_directory_path(&absolute).map_err(|()| ConfigError::InvalidUri {
        uri: absolute.display().to_string(),
        message: "无法转换为 file URI".to_string(),
    })?;

    Ok(SourceUri::from_url(url))
}
