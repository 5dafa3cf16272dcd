//! Configuration management for the server.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Lowest accepted polling period. Anything faster hammers client instances.
pub const MIN_SYNC_INTERVAL_SECS: u64 = 5;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL; the in-memory tables are used when absent
    pub database_url: Option<String>,
    /// Path of the consolidated store JSON file
    pub storage_path: PathBuf,
    /// Secret bearer token guarding the admin API
    pub auth_secret: Option<String>,
    /// Polling period
    pub sync_interval: Duration,
    /// Liveness cleanup period
    pub cleanup_interval: Duration,
    /// Health probe timeout on registration
    pub register_timeout: Duration,
    /// Health probe timeout during cleanup
    pub health_timeout: Duration,
    /// Capture fetch timeout
    pub fetch_timeout: Duration,
    /// Number of ranking rows rebuilt per cycle
    pub ranking_limit: usize,
    /// Lookback window of the recent-changes cycle
    pub recent_window: Duration,
    /// Send best-effort acknowledgements to clients after a merge
    pub acknowledge_captures: bool,
    /// Start the polling scheduler at boot
    pub scheduler_autostart: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            storage_path: PathBuf::from("data/client_storage.json"),
            auth_secret: None,
            sync_interval: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(3600),
            register_timeout: Duration::from_secs(10),
            health_timeout: Duration::from_secs(5),
            fetch_timeout: Duration::from_secs(15),
            ranking_limit: 100,
            recent_window: Duration::from_secs(15 * 60),
            acknowledge_captures: true,
            scheduler_autostart: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or(defaults.host);

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidPort)?,
            None => defaults.port,
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let storage_path = lookup("STORAGE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_path);

        let auth_secret = lookup("AUTH_SECRET").filter(|s| !s.is_empty());

        let sync_secs = parse_u64(&lookup, "SYNC_INTERVAL_SECS", defaults.sync_interval.as_secs())?;
        if sync_secs < MIN_SYNC_INTERVAL_SECS {
            return Err(ConfigError::SyncIntervalTooShort(sync_secs));
        }

        let cleanup_secs =
            parse_u64(&lookup, "CLEANUP_INTERVAL_SECS", defaults.cleanup_interval.as_secs())?;
        if cleanup_secs == 0 {
            return Err(ConfigError::InvalidNumber {
                key: "CLEANUP_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            host,
            port,
            database_url,
            storage_path,
            auth_secret,
            sync_interval: Duration::from_secs(sync_secs),
            cleanup_interval: Duration::from_secs(cleanup_secs),
            register_timeout: Duration::from_secs(parse_u64(
                &lookup,
                "REGISTER_TIMEOUT_SECS",
                defaults.register_timeout.as_secs(),
            )?),
            health_timeout: Duration::from_secs(parse_u64(
                &lookup,
                "HEALTH_TIMEOUT_SECS",
                defaults.health_timeout.as_secs(),
            )?),
            fetch_timeout: Duration::from_secs(parse_u64(
                &lookup,
                "FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )?),
            ranking_limit: parse_u64(&lookup, "RANKING_LIMIT", defaults.ranking_limit as u64)?
                as usize,
            recent_window: Duration::from_secs(
                parse_u64(
                    &lookup,
                    "RECENT_WINDOW_MINUTES",
                    defaults.recent_window.as_secs() / 60,
                )? * 60,
            ),
            acknowledge_captures: parse_bool(
                &lookup,
                "ACKNOWLEDGE_CAPTURES",
                defaults.acknowledge_captures,
            )?,
            scheduler_autostart: parse_bool(
                &lookup,
                "SCHEDULER_AUTOSTART",
                defaults.scheduler_autostart,
            )?,
        })
    }
}

fn parse_u64<F>(lookup: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool { key, value: raw }),
        },
        None => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid numeric value for {key}: {value}")]
    InvalidNumber { key: &'static str, value: String },

    #[error("Invalid boolean value for {key}: {value}")]
    InvalidBool { key: &'static str, value: String },

    #[error("SYNC_INTERVAL_SECS must be at least {}, got {}", MIN_SYNC_INTERVAL_SECS, .0)]
    SyncIntervalTooShort(u64),
}
