//! Configuration Module
//!
//! Handles loading and managing engine configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::cache::Category;

/// Raised when an environment variable is set but cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid value '{value}' for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Engine configuration parameters.
///
/// Read once at startup. All values have defaults; see [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the in-process store can hold
    pub max_entries: usize,
    /// TTL for standard entries (data that may still change)
    pub default_ttl: Duration,
    /// TTL for historical entries (data that cannot change)
    pub historical_ttl: Duration,
    /// Interval between eager expiry sweeps
    pub sweep_interval: Duration,
    /// Whether the background refresh task runs
    pub refresh_enabled: bool,
    /// Interval between background refresh cycles
    pub refresh_interval: Duration,
    /// Entries expiring within this window are refresh candidates
    pub refresh_window: Duration,
    /// Maximum number of due popular entries recomputed per refresh cycle
    pub refresh_batch: usize,
    /// Minimum window hits for a key to count as popular
    pub popularity_threshold: u64,
    /// Length of the popularity window
    pub popularity_window: Duration,
    /// Maximum keys recomputed right after a data-change invalidation
    pub change_refresh_limit: usize,
    /// Whether the warming task runs
    pub warming_enabled: bool,
    /// Interval between warming cycles
    pub warming_interval: Duration,
    /// Delay before the first warming cycle; None waits a full interval
    pub warming_startup_delay: Option<Duration>,
    /// Fixed list of popular dataset keys to keep warm
    pub warm_keys: Vec<String>,
    /// Fraction of each interval applied as random jitter
    pub jitter_ratio: f64,
    /// Timeout for every remote backend call
    pub backend_timeout: Duration,
    /// Base URL of a remote cache node; None uses the in-process store
    pub remote_store_url: Option<String>,
    /// HTTP server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Unset variables fall back to defaults. A variable that is set but
    /// unparseable is a startup error.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` (default: 1000)
    /// - `DEFAULT_TTL`, `HISTORICAL_TTL` in seconds (default: 3600, 604800)
    /// - `SWEEP_INTERVAL` in seconds (default: 60)
    /// - `REFRESH_ENABLED`, `REFRESH_INTERVAL`, `REFRESH_WINDOW` (default: true, 1800, 1800)
    /// - `REFRESH_BATCH`, `POPULARITY_THRESHOLD` (default: 50, 1)
    /// - `POPULARITY_WINDOW` in seconds (default: refresh interval)
    /// - `CHANGE_REFRESH_LIMIT` (default: 5)
    /// - `WARMING_ENABLED`, `WARMING_INTERVAL`, `WARMING_STARTUP_DELAY` (default: true, 3600, 30)
    /// - `WARM_KEYS` comma separated (default: empty)
    /// - `JITTER_RATIO` (default: 0.1)
    /// - `BACKEND_TIMEOUT_MS` (default: 250)
    /// - `REMOTE_STORE_URL` (default: unset)
    /// - `SERVER_PORT` (default: 3000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let refresh_interval = secs("REFRESH_INTERVAL", defaults.refresh_interval)?;

        let warming_startup_delay = match env::var("WARMING_STARTUP_DELAY") {
            Ok(raw) => match raw.trim() {
                "" | "none" => None,
                value => Some(Duration::from_secs(parse_value("WARMING_STARTUP_DELAY", value)?)),
            },
            Err(_) => defaults.warming_startup_delay,
        };

        let jitter_ratio: f64 = var_or("JITTER_RATIO", defaults.jitter_ratio)?;
        if !(0.0..1.0).contains(&jitter_ratio) {
            return Err(ConfigError {
                var: "JITTER_RATIO",
                value: jitter_ratio.to_string(),
                reason: "must be in [0, 1)".to_string(),
            });
        }

        Ok(Self {
            max_entries: var_or("MAX_ENTRIES", defaults.max_entries)?,
            default_ttl: secs("DEFAULT_TTL", defaults.default_ttl)?,
            historical_ttl: secs("HISTORICAL_TTL", defaults.historical_ttl)?,
            sweep_interval: secs("SWEEP_INTERVAL", defaults.sweep_interval)?,
            refresh_enabled: var_or("REFRESH_ENABLED", defaults.refresh_enabled)?,
            refresh_interval,
            refresh_window: secs("REFRESH_WINDOW", refresh_interval)?,
            refresh_batch: var_or("REFRESH_BATCH", defaults.refresh_batch)?,
            popularity_threshold: var_or("POPULARITY_THRESHOLD", defaults.popularity_threshold)?,
            popularity_window: secs("POPULARITY_WINDOW", refresh_interval)?,
            change_refresh_limit: var_or("CHANGE_REFRESH_LIMIT", defaults.change_refresh_limit)?,
            warming_enabled: var_or("WARMING_ENABLED", defaults.warming_enabled)?,
            warming_interval: secs("WARMING_INTERVAL", defaults.warming_interval)?,
            warming_startup_delay,
            warm_keys: env::var("WARM_KEYS")
                .map(|raw| parse_key_list(&raw))
                .unwrap_or_default(),
            jitter_ratio,
            backend_timeout: Duration::from_millis(var_or(
                "BACKEND_TIMEOUT_MS",
                defaults.backend_timeout.as_millis() as u64,
            )?),
            remote_store_url: env::var("REMOTE_STORE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            server_port: var_or("SERVER_PORT", defaults.server_port)?,
        })
    }

    /// TTL applied to an entry of the given category.
    pub fn ttl_for(&self, category: Category) -> Duration {
        match category {
            Category::Standard => self.default_ttl,
            Category::Historical => self.historical_ttl,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            default_ttl: Duration::from_secs(3600),
            historical_ttl: Duration::from_secs(7 * 24 * 3600),
            sweep_interval: Duration::from_secs(60),
            refresh_enabled: true,
            refresh_interval: Duration::from_secs(30 * 60),
            refresh_window: Duration::from_secs(30 * 60),
            refresh_batch: 50,
            popularity_threshold: 1,
            popularity_window: Duration::from_secs(30 * 60),
            change_refresh_limit: 5,
            warming_enabled: true,
            warming_interval: Duration::from_secs(3600),
            warming_startup_delay: Some(Duration::from_secs(30)),
            warm_keys: Vec::new(),
            jitter_ratio: 0.1,
            backend_timeout: Duration::from_millis(250),
            remote_store_url: None,
            server_port: 3000,
        }
    }
}

// == Parsing Helpers ==
fn parse_value<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError {
        var,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

fn var_or<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => parse_value(var, &raw),
        Err(_) => Ok(default),
    }
}

fn secs(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    var_or(var, default.as_secs()).map(Duration::from_secs)
}

fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_entries, 1000);
        assert_eq!(config.default_ttl, Duration::from_secs(3600));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.refresh_interval, Duration::from_secs(1800));
        assert_eq!(config.warming_interval, Duration::from_secs(3600));
        assert_eq!(config.server_port, 3000);
        assert!(config.remote_store_url.is_none());
    }

    #[test]
    fn test_ttl_for_category() {
        let config = Config::default();
        assert_eq!(config.ttl_for(Category::Standard), config.default_ttl);
        assert_eq!(config.ttl_for(Category::Historical), config.historical_ttl);
        assert!(config.ttl_for(Category::Historical) > config.ttl_for(Category::Standard));
    }

    #[test]
    fn test_parse_key_list() {
        assert_eq!(
            parse_key_list(" stats:summary, crimes:2024-01 ,,"),
            vec!["stats:summary".to_string(), "crimes:2024-01".to_string()]
        );
        assert!(parse_key_list("").is_empty());
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        let err = parse_value::<usize>("MAX_ENTRIES", "lots").unwrap_err();
        assert_eq!(err.var, "MAX_ENTRIES");
        assert_eq!(err.value, "lots");
    }

    // Env-var tests mutate process state; keep them in one test.
    #[test]
    fn test_config_from_env() {
        env::set_var("MAX_ENTRIES", "250");
        env::set_var("WARM_KEYS", "a,b");
        env::set_var("WARMING_STARTUP_DELAY", "none");
        let config = Config::from_env().unwrap();
        assert_eq!(config.max_entries, 250);
        assert_eq!(config.warm_keys, vec!["a".to_string(), "b".to_string()]);
        assert!(config.warming_startup_delay.is_none());

        env::set_var("MAX_ENTRIES", "not-a-number");
        assert!(Config::from_env().is_err());

        env::remove_var("MAX_ENTRIES");
        env::remove_var("WARM_KEYS");
        env::remove_var("WARMING_STARTUP_DELAY");
        let config = Config::from_env().unwrap();
        assert_eq!(config.max_entries, 1000);
    }
}
