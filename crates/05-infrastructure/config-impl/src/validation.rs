//! 部署配置验证

use deployment_common::{ConfigError, ConfigResult, DeploymentConfig, SourceUri};
use tracing::{debug, warn};

/// 验证部署配置
///
/// 收集全部问题后统一返回 [`ConfigError::ValidationFailed`]，
/// 而不是在第一个错误处中止。
pub fn validate_config(config: &DeploymentConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    for (index, uri) in config.uri_list.iter().enumerate() {
        if uri.trim().is_empty() {
            errors.push(format!("uri_list[{index}] 不能为空"));
            continue;
        }
        if let Err(e) = SourceUri::parse(uri, config.encode_uri) {
            errors.push(format!("uri_list[{index}]: {e}"));
        }
    }

    if config.readiness_check_interval_ms == 0 {
        errors.push("readiness_check_interval_ms 必须大于 0".to_string());
    }

    if config.logging.level.trim().is_empty() {
        errors.push("logging.level 不能为空".to_string());
    }

    if let Some(path) = &config.temporary_directory_path {
        if path.as_os_str().is_empty() {
            errors.push("temporary_directory_path 不能为空字符串".to_string());
        }
    }

    if errors.is_empty() {
        debug!("部署配置验证通过");
        Ok(())
    } else {
        warn!("部署配置验证失败: {:?}", errors);
        Err(ConfigError::ValidationFailed { errors })
    }
}
