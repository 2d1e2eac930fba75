//! Runtime configuration from environment variables

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Upper bound for `RANKING_WINDOW_DAYS` (ten years)
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Configuration for the ranking service
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Directory holding the `NN_name.sql` schema files
    pub schema_dir: String,

    /// HTTP listen address
    pub bind_addr: SocketAddr,

    /// Periodic refresh interval in seconds (0 disables the scheduler)
    pub refresh_interval_secs: u64,

    /// Delay after each per-idol call to an `api` source, in milliseconds
    pub fetch_delay_ms: u64,

    /// Trend window used by the aggregator, in days
    pub window_days: i64,

    /// Standard deviation of the Gaussian noise added to ranking scores
    pub noise_stddev: f64,

    /// Trend categories ranked in addition to "overall"
    pub ranking_categories: Vec<String>,

    /// Seed the demo catalog on an empty database at startup
    pub seed_catalog: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: "data/idolrank.db".to_string(),
            schema_dir: "sql".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8000)),
            refresh_interval_secs: 0,
            fetch_delay_ms: 100,
            window_days: 30,
            noise_stddev: 5.0,
            ranking_categories: default_categories(),
            seed_catalog: true,
        }
    }
}

fn default_categories() -> Vec<String> {
    vec!["music".to_string(), "social".to_string(), "streaming".to_string()]
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `IDOLRANK_DB_PATH` (default: data/idolrank.db)
    /// - `IDOLRANK_SCHEMA_DIR` (default: sql)
    /// - `IDOLRANK_BIND_ADDR` (default: 0.0.0.0:8000)
    /// - `REFRESH_INTERVAL_SECS` (default: 0, scheduler disabled)
    /// - `FETCH_DELAY_MS` (default: 100)
    /// - `RANKING_WINDOW_DAYS` (default: 30, at most 3650)
    /// - `SCORE_NOISE_STDDEV` (default: 5.0)
    /// - `RANKING_CATEGORIES` (default: music,social,streaming; empty string for none)
    /// - `SEED_CATALOG` (default: true)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind_addr = match env::var("IDOLRANK_BIND_ADDR") {
            Ok(raw) => raw.parse().map_err(|_| {
                ConfigError::InvalidValue(format!("IDOLRANK_BIND_ADDR is not a socket address: {}", raw))
            })?,
            Err(_) => defaults.bind_addr,
        };

        let window_days = parse_var("RANKING_WINDOW_DAYS", defaults.window_days)?;
        if !(1..=MAX_WINDOW_DAYS).contains(&window_days) {
            return Err(ConfigError::InvalidValue(format!(
                "RANKING_WINDOW_DAYS must be between 1 and {}",
                MAX_WINDOW_DAYS
            )));
        }

        let noise_stddev = parse_var("SCORE_NOISE_STDDEV", defaults.noise_stddev)?;
        if !noise_stddev.is_finite() || noise_stddev < 0.0 {
            return Err(ConfigError::InvalidValue(
                "SCORE_NOISE_STDDEV must be a non-negative number".to_string(),
            ));
        }

        let ranking_categories = env::var("RANKING_CATEGORIES")
            .map(|s| {
                s.split(',')
                    .map(|c| c.trim().to_ascii_lowercase())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.ranking_categories);

        Ok(Self {
            db_path: env::var("IDOLRANK_DB_PATH").unwrap_or(defaults.db_path),
            schema_dir: env::var("IDOLRANK_SCHEMA_DIR").unwrap_or(defaults.schema_dir),
            bind_addr,
            refresh_interval_secs: parse_var("REFRESH_INTERVAL_SECS", defaults.refresh_interval_secs)?,
            fetch_delay_ms: parse_var("FETCH_DELAY_MS", defaults.fetch_delay_ms)?,
            window_days,
            noise_stddev,
            ranking_categories,
            seed_catalog: parse_var("SEED_CATALOG", defaults.seed_catalog)?,
        })
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_millis(self.fetch_delay_ms)
    }
}

/// Parse an optional variable, keeping the default when unset
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{} has an invalid value: {}", name, raw))),
        Err(_) => Ok(default),
    }
}
