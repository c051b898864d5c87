//! Configuration loaders for the fogflow binaries.
//!
//! This module centralizes all runtime configuration values and their
//! defaults, loading from environment variables (with optional `.env` file
//! support provided by the caller). By consolidating configuration logic
//! here, we avoid scattering `env::var` calls throughout the codebase.
//!
//! The cloud service and the fog node are separate processes with separate
//! loaders; unrecoverable configuration errors are reported and abort
//! startup.

use std::env;

use anyhow::{anyhow, Result};

/// Parse an optional integer environment variable with a default value.
macro_rules! parse_env_u32 {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.parse::<u32>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Parse a required string environment variable.
macro_rules! require_env {
    ($var_name:expr) => {
        env::var($var_name)
            .map_err(|_| anyhow!("{} must be set in .env or environment", $var_name))?
    };
}

/// Parse an optional string environment variable with a default value.
macro_rules! env_or {
    ($var_name:expr, $default:expr) => {
        env::var($var_name).unwrap_or_else(|_| $default.to_string())
    };
}

// ---

/// Configuration for the central ingestion service.
///
/// All fields are immutable after loading, ensuring a consistent
/// configuration snapshot for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    // ---
    /// TCP port the HTTP API binds on.
    pub port: u32,

    /// HS256 signing secret for access tokens.
    pub signing_secret: String,

    /// Secret for the `fog_node` identity.
    pub fog_node_secret: String,

    /// Secret for the `admin` identity.
    pub admin_secret: String,

    /// Capacity of the bounded ingestion history ring.
    pub history_capacity: u32,

    /// Capacity of the trend predictor's value window.
    pub trend_window_capacity: u32,

    /// Issued token lifetime in hours.
    pub token_ttl_hours: u32,
}

/// Load the cloud service configuration.
///
/// Required:
/// - `SECRET_KEY` – token signing secret
/// - `FOG_NODE` – secret for the `fog_node` identity
/// - `ADMIN` – secret for the `admin` identity
///
/// Optional:
/// - `CLOUD_PORT` – HTTP port (default: 5000)
/// - `HISTORY_CAPACITY` – ingestion ring size (default: 100)
/// - `TREND_WINDOW_CAPACITY` – predictor window size (default: 20)
/// - `TOKEN_TTL_HOURS` – token lifetime (default: 24)
pub fn load_cloud_from_env() -> Result<CloudConfig> {
    // ---
    let signing_secret = require_env!("SECRET_KEY");
    let fog_node_secret = require_env!("FOG_NODE");
    let admin_secret = require_env!("ADMIN");
    let port = parse_env_u32!("CLOUD_PORT", 5000);
    let history_capacity = parse_env_u32!("HISTORY_CAPACITY", 100);
    let trend_window_capacity = parse_env_u32!("TREND_WINDOW_CAPACITY", 20);
    let token_ttl_hours = parse_env_u32!("TOKEN_TTL_HOURS", 24);

    Ok(CloudConfig {
        port,
        signing_secret,
        fog_node_secret,
        admin_secret,
        history_capacity,
        trend_window_capacity,
        token_ttl_hours,
    })
}

impl CloudConfig {
    /// Log the loaded configuration for debugging purposes, masking secrets.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  CLOUD_PORT            : {}", self.port);
        tracing::info!("  SECRET_KEY            : ****");
        tracing::info!("  HISTORY_CAPACITY      : {}", self.history_capacity);
        tracing::info!("  TREND_WINDOW_CAPACITY : {}", self.trend_window_capacity);
        tracing::info!("  TOKEN_TTL_HOURS       : {}", self.token_ttl_hours);
    }
}

// ---

/// Configuration for the fog aggregation node.
#[derive(Debug, Clone)]
pub struct FogConfig {
    // ---
    /// MQTT broker host.
    pub mqtt_host: String,

    /// MQTT broker port.
    pub mqtt_port: u32,

    /// Topic the node subscribes to for sensor events.
    pub sensors_topic: String,

    /// Topic the node publishes actuator commands on.
    pub actuator_topic: String,

    /// Base URL of the cloud API, e.g. `http://localhost:5000`.
    pub cloud_api_base: String,

    /// Identity used against `POST /api/login`.
    pub username: String,

    /// Secret used against `POST /api/login`.
    pub password: String,

    /// Seconds between aggregation cycles.
    pub aggregation_interval_secs: u32,

    /// Capacity of the bounded reading buffer.
    pub buffer_capacity: u32,

    /// Safety margin before token expiry that triggers re-authentication.
    pub token_refresh_margin_secs: u32,

    /// Timeout for outbound forwards to the cloud.
    pub forward_timeout_secs: u32,

    /// Region tag stamped on every aggregated record.
    pub region: String,
}

/// Load the fog node configuration.
///
/// Required:
/// - `CLOUD_API_BASE` – cloud API base URL
/// - `USER_FOG` – login identity
/// - `PASSWORD_FOG` – login secret
///
/// Optional (defaults in parentheses):
/// - `MQTT_BROKER_HOST` (localhost), `MQTT_BROKER_PORT` (1883)
/// - `SENSORS_TOPIC` (sensors/data), `ACTUATOR_TOPIC` (actuator/control)
/// - `AGGREGATION_INTERVAL_SECS` (30), `BUFFER_CAPACITY` (100)
/// - `TOKEN_REFRESH_MARGIN_SECS` (300), `FORWARD_TIMEOUT_SECS` (10)
/// - `REGION` (south_zone)
pub fn load_fog_from_env() -> Result<FogConfig> {
    // ---
    let cloud_api_base = require_env!("CLOUD_API_BASE");
    let username = require_env!("USER_FOG");
    let password = require_env!("PASSWORD_FOG");

    Ok(FogConfig {
        mqtt_host: env_or!("MQTT_BROKER_HOST", "localhost"),
        mqtt_port: parse_env_u32!("MQTT_BROKER_PORT", 1883),
        sensors_topic: env_or!("SENSORS_TOPIC", "sensors/data"),
        actuator_topic: env_or!("ACTUATOR_TOPIC", "actuator/control"),
        cloud_api_base,
        username,
        password,
        aggregation_interval_secs: parse_env_u32!("AGGREGATION_INTERVAL_SECS", 30),
        buffer_capacity: parse_env_u32!("BUFFER_CAPACITY", 100),
        token_refresh_margin_secs: parse_env_u32!("TOKEN_REFRESH_MARGIN_SECS", 300),
        forward_timeout_secs: parse_env_u32!("FORWARD_TIMEOUT_SECS", 10),
        region: env_or!("REGION", "south_zone"),
    })
}

impl FogConfig {
    /// `POST /api/login` endpoint derived from the base URL.
    pub fn login_url(&self) -> String {
        format!("{}/api/login", self.cloud_api_base.trim_end_matches('/'))
    }

    /// `POST /api/data` endpoint derived from the base URL.
    pub fn data_url(&self) -> String {
        format!("{}/api/data", self.cloud_api_base.trim_end_matches('/'))
    }

    /// Log the loaded configuration for debugging purposes, masking secrets.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  MQTT broker           : {}:{}", self.mqtt_host, self.mqtt_port);
        tracing::info!("  SENSORS_TOPIC         : {}", self.sensors_topic);
        tracing::info!("  ACTUATOR_TOPIC        : {}", self.actuator_topic);
        tracing::info!("  CLOUD_API_BASE        : {}", self.cloud_api_base);
        tracing::info!("  USER_FOG              : {}", self.username);
        tracing::info!("  PASSWORD_FOG          : ****");
        tracing::info!("  Aggregation interval  : {}s", self.aggregation_interval_secs);
        tracing::info!("  BUFFER_CAPACITY       : {}", self.buffer_capacity);
        tracing::info!("  Token refresh margin  : {}s", self.token_refresh_margin_secs);
        tracing::info!("  REGION                : {}", self.region);
    }
}
