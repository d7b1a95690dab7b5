//! Engine configuration
//!
//! Knobs come either from the embedding application (`EngineConfig::new`)
//! or from the environment (`EngineConfig::from_env`). Reference values
//! match the collector deployment defaults.

use std::env;

/// Default breadcrumb ring capacity.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 100;
/// Queue length that triggers an immediate flush.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;
/// Additional delivery attempts after the first keepalive failure.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;
/// Fixed inter-attempt delay in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
/// Periodic flush interval in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5000;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Collector endpoint.
    pub report_url: String,
    pub max_breadcrumbs: usize,
    pub max_batch_size: usize,
    pub retry_limit: u32,
    pub retry_delay_ms: u64,
    pub flush_interval_ms: u64,
    /// Whether error records whose identity fields are all empty are still
    /// reported (bypassing dedup). Off by default; a deployment decision.
    pub report_unfingerprinted: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    MissingVariable(String),
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => {
                write!(f, "Missing environment variable: {}", var)
            }
            ConfigError::InvalidValue(msg) => {
                write!(f, "Invalid configuration value: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl EngineConfig {
    /// Programmatic construction with default knobs.
    pub fn new(report_url: impl Into<String>) -> Self {
        Self {
            report_url: report_url.into(),
            max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            report_unfingerprinted: false,
        }
    }

    /// Build from environment variables. `REPORT_URL` is required and must
    /// be an http(s) endpoint; everything else falls back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let report_url = env::var("REPORT_URL")
            .map_err(|_| ConfigError::MissingVariable("REPORT_URL".to_string()))?;

        if !report_url.starts_with("http://") && !report_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "REPORT_URL must start with http:// or https://".to_string(),
            ));
        }

        let mut config = Self::new(report_url);
        config.max_breadcrumbs = parse_env("MAX_BREADCRUMBS", DEFAULT_MAX_BREADCRUMBS)?;
        config.max_batch_size = parse_env("MAX_BATCH_SIZE", DEFAULT_MAX_BATCH_SIZE)?;
        config.retry_limit = parse_env("RETRY_LIMIT", DEFAULT_RETRY_LIMIT)?;
        config.retry_delay_ms = parse_env("RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS)?;
        config.flush_interval_ms =
            parse_env("FLUSH_INTERVAL_MS", DEFAULT_FLUSH_INTERVAL_MS)?;
        config.report_unfingerprinted = env::var("REPORT_UNFINGERPRINTED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if config.max_breadcrumbs == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_BREADCRUMBS must be positive".to_string(),
            ));
        }
        if config.max_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_BATCH_SIZE must be positive".to_string(),
            ));
        }

        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| {
            ConfigError::InvalidValue(format!("{} must be a number, got '{}'", var, raw))
        }),
        Err(_) => Ok(default),
    }
}

/// Initialize env_logger the way the runtime binaries do. Safe to call more
/// than once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .try_init();
}
