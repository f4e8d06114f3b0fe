use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_KEY_PREFIX: &str = "RainBot";
pub const DEFAULT_FORECAST_URL: &str = "https://api.open-meteo.com";
pub const DEFAULT_TICK_MS: u64 = 1_000;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// WMO codes that mean some form of liquid precipitation is expected.
pub const DEFAULT_ALERT_CODES: &[u16] = &[
    51, 53, 55, // drizzle
    56, 57, // freezing drizzle
    61, 63, 65, // rain
    66, 67, // freezing rain
    80, 81, 82, // rain showers
    95, 96, 99, // thunderstorm
];

/// Top-level config (rainbot.toml + RAINBOT_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RainbotConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Append logs to this file instead of stderr.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            file: None,
        }
    }
}

/// Which persistence technology backs locations and triggers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    /// Process-local maps; nothing survives a restart.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Namespace for location keys: `{prefix}:geo:{recipient}`.
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: default_db_path(),
            prefix: default_prefix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertsConfig {
    /// Condition codes that warrant a notification.
    #[serde(default = "default_alert_codes")]
    pub codes: Vec<u16>,
    /// Send the forecast every time, whatever the condition.
    #[serde(default)]
    pub always: bool,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            codes: default_alert_codes(),
            always: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_forecast_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            base_url: default_forecast_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Capacity of the fired-trigger channel between the loop and dispatch.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_log_filter() -> String {
    "rainbot=info".to_string()
}
fn default_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}
fn default_alert_codes() -> Vec<u16> {
    DEFAULT_ALERT_CODES.to_vec()
}
fn default_forecast_url() -> String {
    DEFAULT_FORECAST_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_tick_ms() -> u64 {
    DEFAULT_TICK_MS
}
fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}
fn default_db_path() -> String {
    format!("{}/rainbot.db", data_dir())
}

fn data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.rainbot")
}

impl RainbotConfig {
    /// Load config from a TOML file with RAINBOT_* env var overrides.
    ///
    /// Path resolution: explicit argument, then `~/.rainbot/rainbot.toml`.
    /// Nested keys in env vars are separated by `__`, e.g.
    /// `RAINBOT_TELEGRAM__BOT_TOKEN`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::from_figment(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("RAINBOT_").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        figment
            .extract()
            .map_err(|e| crate::error::RainbotError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    format!("{}/rainbot.toml", data_dir())
}
