//! TOML-only configuration, validated once at startup.
//!
//! Grounded on `forwarder/src/config.rs`'s `Raw*` / validated-struct split:
//! every field is optional in the raw TOML deserialization target and
//! defaulted-or-rejected in a single validation pass. No environment
//! variable overrides other than `LOG_LEVEL` (read directly by `main.rs`).

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sickradar-server/config.toml";

#[derive(Debug, Clone)]
pub struct Config {
    pub name: String,
    pub listen_addr: String,
    pub radar: RadarConfig,
    pub sample_period: Duration,
    pub max_consecutive_errors: u32,
    pub reconnect_delay: Duration,
    pub store: store_client::StoreConfig,
    pub min_velocity_change: f64,
    pub subscriber_queue_capacity: usize,
    pub industrial_controller: Option<IndustrialControllerConfig>,
}

#[derive(Debug, Clone)]
pub struct RadarConfig {
    pub host: String,
    pub port: u16,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct IndustrialControllerConfig {
    pub address: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    name: Option<String>,
    listen_addr: Option<String>,
    radar: Option<RawRadarConfig>,
    sample_rate_ms: Option<u64>,
    max_consecutive_errors: Option<u32>,
    reconnect_delay_ms: Option<u64>,
    store: Option<RawStoreConfig>,
    min_velocity_change: Option<f64>,
    subscriber_queue_capacity: Option<usize>,
    industrial_controller: Option<RawIndustrialControllerConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRadarConfig {
    host: Option<String>,
    port: Option<u16>,
    connect_timeout_ms: Option<u64>,
    read_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawStoreConfig {
    enabled: Option<bool>,
    host: Option<String>,
    port: Option<u16>,
    password: Option<String>,
    namespace: Option<String>,
    position_history_size: Option<usize>,
    max_velocity_history_size: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct RawIndustrialControllerConfig {
    enabled: Option<bool>,
    address: Option<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(s) => write!(f, "IO error: {s}"),
            ConfigError::Parse(s) => write!(f, "parse error: {s}"),
            ConfigError::InvalidValue(s) => write!(f, "invalid config value: {s}"),
        }
    }
}

impl std::error::Error for ConfigError {}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let toml_str = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("reading config file '{}': {e}", path.display())))?;
    load_config_from_str(&toml_str)
}

/// Parses and validates configuration from a TOML string. Kept separate
/// from `load_config` as a test seam.
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;

    let sample_rate_ms = raw.sample_rate_ms.unwrap_or(100);
    if sample_rate_ms > 100 {
        return Err(ConfigError::InvalidValue(
            "sample_rate_ms must be <= 100 per the acquisition tick cap".to_owned(),
        ));
    }

    let raw_radar = raw.radar.unwrap_or_default();
    let radar = RadarConfig {
        host: raw_radar.host.unwrap_or_else(|| "127.0.0.1".to_owned()),
        port: raw_radar.port.unwrap_or(2111),
        connect_timeout: Duration::from_millis(raw_radar.connect_timeout_ms.unwrap_or(5_000)),
        read_timeout: Duration::from_millis(raw_radar.read_timeout_ms.unwrap_or(5_000)),
    };

    let raw_store = raw.store.unwrap_or_default();
    let store = store_client::StoreConfig {
        enabled: raw_store.enabled.unwrap_or(true),
        host: raw_store.host.unwrap_or_else(|| "127.0.0.1".to_owned()),
        port: raw_store.port.unwrap_or(6379),
        password: raw_store.password,
        namespace: raw_store.namespace.unwrap_or_else(|| "radar_sick".to_owned()),
        history_cap: raw_store.position_history_size.unwrap_or(1000),
        change_log_cap: raw_store.max_velocity_history_size.unwrap_or(100),
    };

    let industrial_controller = match raw.industrial_controller {
        Some(raw_ic) if raw_ic.enabled.unwrap_or(false) => {
            let address = raw_ic
                .address
                .ok_or_else(|| ConfigError::InvalidValue("industrial_controller.address is required when enabled".to_owned()))?;
            Some(IndustrialControllerConfig { address })
        }
        _ => None,
    };

    Ok(Config {
        name: raw.name.unwrap_or_else(|| "sickradar-server".to_owned()),
        listen_addr: raw.listen_addr.unwrap_or_else(|| "0.0.0.0:8088".to_owned()),
        radar,
        sample_period: Duration::from_millis(sample_rate_ms),
        max_consecutive_errors: raw.max_consecutive_errors.unwrap_or(5),
        reconnect_delay: Duration::from_millis(raw.reconnect_delay_ms.unwrap_or(2_000)),
        store,
        min_velocity_change: raw.min_velocity_change.unwrap_or(0.01),
        subscriber_queue_capacity: raw.subscriber_queue_capacity.unwrap_or(256),
        industrial_controller,
    })
}

impl Default for Config {
    fn default() -> Self {
        load_config_from_str("").expect("empty config must validate against defaults")
    }
}
