//! Configuration loading for the portal controller
//!
//! Settings come from three layers, later layers winning:
//!
//! - built-in defaults
//! - an optional YAML file
//! - environment variables (`BROKER_HOSTNAME`, `COOLDOWN_SECONDS`, ...)
//!
//! # Example
//!
//! ```ignore
//! use portal_config::load_config;
//!
//! let config = load_config(Some("portal.yaml".as_ref()))?;
//! println!("broker at {}:{}", config.mqtt.host, config.mqtt.port);
//! ```

mod error;
mod loader;
mod settings;

pub use error::{ConfigError, ConfigResult};
pub use loader::{apply_env_overrides, load_config, load_config_with_env, load_yaml_str};
pub use settings::{
    HealthConfig, LightingConfig, MqttConfig, PortalConfig, PortalDeviceConfig, ScenarioConfig,
    StorageConfig, WebConfig,
};
