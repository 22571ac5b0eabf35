//! Layered configuration loader

use crate::error::{ConfigError, ConfigResult};
use crate::settings::PortalConfig;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Load configuration from an optional YAML file plus the process environment
pub fn load_config(path: Option<&Path>) -> ConfigResult<PortalConfig> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
///
/// Separate from [`load_config`] so tests can supply variables without
/// touching the process environment.
pub fn load_config_with_env<F>(path: Option<&Path>, env: F) -> ConfigResult<PortalConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            debug!("Loading config file: {:?}", path);
            let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
                path: path.to_path_buf(),
                source: e,
            })?;
            load_yaml_str(&content, path)?
        }
        None => PortalConfig::default(),
    };

    apply_env_overrides(&mut config, env)?;
    validate(&config)?;

    info!(
        broker = %config.mqtt.host,
        lighting = config.lighting.is_configured(),
        "Configuration loaded"
    );
    Ok(config)
}

/// Parse YAML content; an empty document yields the defaults
pub fn load_yaml_str(content: &str, source_path: &Path) -> ConfigResult<PortalConfig> {
    if content.trim().is_empty() {
        return Ok(PortalConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
        path: source_path.to_path_buf(),
        source: e,
    })
}

/// Apply environment overrides on top of file values
pub fn apply_env_overrides<F>(config: &mut PortalConfig, env: F) -> ConfigResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| env(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("BROKER_HOSTNAME") {
        config.mqtt.host = v;
    }
    if let Some(v) = get("BROKER_PORT") {
        config.mqtt.port = parse_env("BROKER_PORT", &v)?;
    }
    if let Some(v) = get("PERSON_TOPIC") {
        config.mqtt.person_topic = v;
    }
    if let Some(v) = get("PORTAL_STATE_TOPIC") {
        config.mqtt.portal_state_topic = v;
    }
    if let Some(v) = get("COOLDOWN_SECONDS") {
        config.scenario.cooldown_secs = parse_env("COOLDOWN_SECONDS", &v)?;
    }
    if let Some(v) = get("WEB_PORT") {
        config.web.port = parse_env("WEB_PORT", &v)?;
    }
    if let Some(v) = get("VISITORS_FILE") {
        config.storage.visitors_file = v;
    }
    if let Some(v) = get("PORTAL_IP") {
        config.portal.address = v;
    }
    if let Some(v) = get("HA_SERVER") {
        config.lighting.server = Some(v);
    }
    if let Some(v) = get("HA_TOKEN") {
        config.lighting.token = Some(v);
    }
    Ok(())
}

fn parse_env<T>(key: &str, value: &str) -> ConfigResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("{:?}: {}", value, e),
        })
}

fn validate(config: &PortalConfig) -> ConfigResult<()> {
    if config.mqtt.host.trim().is_empty() {
        return Err(ConfigError::MissingValue {
            key: "mqtt.host",
            env: "BROKER_HOSTNAME",
        });
    }
    if config.scenario.flicker_rounds == 0 {
        return Err(ConfigError::InvalidValue {
            key: "scenario.flicker_rounds".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    if config.health.interval_secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: "health.interval_secs".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(())
}
