//! Server configuration loading from file and environment variables.

use std::net::{IpAddr, Ipv4Addr};

use chrono::Duration;
use kestrel_workers::ProcessingConfig;
use serde::Deserialize;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity of this instance on the network.
    #[serde(default)]
    pub instance: InstanceConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Worker pool sizes.
    #[serde(default)]
    pub workers: WorkersConfig,

    /// Account migration rate limits.
    #[serde(default)]
    pub moves: MovesConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    /// Domain of this instance, used to build and recognize local URIs.
    #[serde(default = "default_instance_host")]
    pub host: String,

    #[serde(default = "default_protocol")]
    pub protocol: String,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "kestrel_workers=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkersConfig {
    /// Workers draining the client message queue.
    #[serde(default = "default_worker_count")]
    pub client: usize,

    /// Workers draining the federation message queue.
    #[serde(default = "default_worker_count")]
    pub federator: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovesConfig {
    #[serde(default = "default_attempt_cooldown_secs")]
    pub attempt_cooldown_secs: i64,

    #[serde(default = "default_success_cooldown_secs")]
    pub success_cooldown_secs: i64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8080
}

fn default_instance_host() -> String {
    "localhost".to_string()
}

fn default_protocol() -> String {
    "https".to_string()
}

fn default_db_path() -> String {
    "kestrel.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_worker_count() -> usize {
    std::thread::available_parallelism().map_or(2, |n| n.get())
}

fn default_attempt_cooldown_secs() -> i64 {
    5 * 60
}

fn default_success_cooldown_secs() -> i64 {
    7 * 24 * 60 * 60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            host: default_instance_host(),
            protocol: default_protocol(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            client: default_worker_count(),
            federator: default_worker_count(),
        }
    }
}

impl Default for MovesConfig {
    fn default() -> Self {
        Self {
            attempt_cooldown_secs: default_attempt_cooldown_secs(),
            success_cooldown_secs: default_success_cooldown_secs(),
        }
    }
}

impl Config {
    /// The settings handed to the processing core.
    pub fn processing(&self) -> ProcessingConfig {
        ProcessingConfig {
            host: self.instance.host.clone(),
            protocol: self.instance.protocol.clone(),
            move_attempt_cooldown: Duration::seconds(self.moves.attempt_cooldown_secs),
            move_success_cooldown: Duration::seconds(self.moves.success_cooldown_secs),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `KESTREL_HOST` overrides `server.host`
/// - `KESTREL_PORT` overrides `server.port`
/// - `KESTREL_DB_PATH` overrides `database.path`
/// - `KESTREL_LOG_LEVEL` overrides `logging.level`
/// - `KESTREL_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `KESTREL_INSTANCE_HOST` overrides `instance.host`
/// - `KESTREL_CLIENT_WORKERS` overrides `workers.client`
/// - `KESTREL_FEDERATOR_WORKERS` overrides `workers.federator`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies `KESTREL_*` overrides read through `var`. Unparseable values
/// are ignored.
pub fn apply_env_overrides(config: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(host) = var("KESTREL_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = var("KESTREL_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = var("KESTREL_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = var("KESTREL_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = var("KESTREL_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(host) = var("KESTREL_INSTANCE_HOST") {
        config.instance.host = host;
    }
    if let Some(count) = var("KESTREL_CLIENT_WORKERS") {
        if let Ok(parsed) = count.parse() {
            config.workers.client = parsed;
        }
    }
    if let Some(count) = var("KESTREL_FEDERATOR_WORKERS") {
        if let Ok(parsed) = count.parse() {
            config.workers.federator = parsed;
        }
    }
}
