use crate::{Error, Result, TradingMode};

/// Process configuration loaded from environment variables at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // Trading
    pub trading_mode: TradingMode,

    // Storage. Without a database URL only the in-memory storages are usable.
    pub database_url: Option<String>,

    // Strategy runs file path
    pub runs_config_path: String,

    // Dashboard
    pub dashboard_token: String,
    pub dashboard_port: u16,
    pub event_channel_capacity: usize,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let trading_mode = match optional_env("TRADING_MODE")
            .unwrap_or_else(|| "live".to_string())
            .to_lowercase()
            .as_str()
        {
            "live" => TradingMode::Live,
            "replay" => TradingMode::Replay,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'live' or 'replay', got: '{other}'"
                )))
            }
        };

        Ok(Config {
            trading_mode,
            database_url: optional_env("DATABASE_URL"),
            runs_config_path: optional_env("RUNS_CONFIG_PATH")
                .unwrap_or_else(|| "config/runs.toml".to_string()),
            dashboard_token: required_env("DASHBOARD_TOKEN")?,
            dashboard_port: parsed_env("DASHBOARD_PORT", 8080)?,
            event_channel_capacity: parsed_env("EVENT_CHANNEL_CAPACITY", 1024)?,
        })
    }
}

fn required_env(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        Error::Config(format!(
            "Required environment variable '{key}' is not set. Check your .env file."
        ))
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match optional_env(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::Config(format!("{key} has an invalid value: '{raw}'"))),
        None => Ok(default),
    }
}
