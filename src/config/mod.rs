//! Configuration management for the hindsight service
//!
//! Configuration comes from a TOML file (every section optional), then
//! environment variables, then command-line flags, each layer overriding
//! the previous one.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::fetcher::{FetchError, QuandlSource};
use crate::limiter::{RateLimitSpec, RateLimiter};
use crate::models::Candidate;
use crate::scheduler::{RefreshSchedule, RefreshTimezone};
use crate::selector::Ranker;
use crate::storage::BackupStore;

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("candidate list is empty")]
    EmptyCandidates,

    #[error("refresh.top_k must be greater than 0")]
    ZeroTopK,

    #[error("limits.poll_interval_ms must be greater than 0")]
    ZeroPollInterval,

    #[error("limits.windows[{0}] has a zero-length window")]
    ZeroWindow(usize),

    #[error("limits.windows[{0}] allows zero calls and would block forever")]
    ZeroCap(usize),

    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),

    #[error("refresh.day_offset_minutes must be under 1440, got {0}")]
    DayOffsetTooLarge(u32),

    #[error("source.api_key is required")]
    MissingApiKey,

    #[error("unknown log format '{0}' (expected text, json or pretty)")]
    InvalidLogFormat(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub source: SourceConfig,
    pub limits: LimitsConfig,
    pub refresh: RefreshConfig,
    pub backup: BackupConfig,
    pub logging: LoggingConfig,

    /// Fixed candidate list, fetched in order every cycle
    pub candidates: Vec<Candidate>,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Data source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub api_key: String,
    pub base_url: String,
    pub request_timeout_secs: u64,

    /// Days between the old observation and the cycle time
    pub lookback_days: u32,

    /// Value column index per source database
    pub columns: HashMap<String, u32>,
}

/// Outbound rate limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// How often a saturated limiter re-checks its windows
    pub poll_interval_ms: u64,

    pub windows: Vec<RateLimitSpec>,
}

/// Refresh timing and selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Minutes after local midnight at which the day's refresh runs
    pub day_offset_minutes: u32,

    /// IANA timezone name, or "local"
    pub timezone: String,

    /// Winner is drawn uniformly from this many top-ranked candidates
    pub top_k: usize,

    /// Recompute the next boundary after every cycle
    pub realign_daily: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub path: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json, pretty)
    pub format: String,

    /// Append logs to this file instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            source: SourceConfig::default(),
            limits: LimitsConfig::default(),
            refresh: RefreshConfig::default(),
            backup: BackupConfig::default(),
            logging: LoggingConfig::default(),
            candidates: default_candidates(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: String::from(crate::fetcher::quandl::DEFAULT_BASE_URL),
            request_timeout_secs: 10,
            lookback_days: 365,
            columns: default_columns(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            windows: vec![
                RateLimitSpec::new(Duration::from_secs(10), 300),
                RateLimitSpec::new(Duration::from_secs(600), 2000),
                RateLimitSpec::per_day(50_000),
            ],
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            day_offset_minutes: crate::scheduler::DEFAULT_DAY_OFFSET_MINUTES,
            timezone: String::from("local"),
            top_k: crate::selector::DEFAULT_TOP_K,
            realign_daily: false,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("cache"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
            file: None,
        }
    }
}

impl Config {
    /// Default configuration with environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise start from defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Apply `HINDSIGHT_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup
    ///
    /// Unparseable numeric values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("HINDSIGHT_API_KEY") {
            self.source.api_key = key;
        }
        if let Some(port) = lookup("HINDSIGHT_PORT").and_then(|v| v.parse::<u16>().ok()) {
            self.server.port = port;
        }
        if let Some(path) = lookup("HINDSIGHT_BACKUP_PATH") {
            self.backup.path = PathBuf::from(path);
        }
        if let Some(level) = lookup("HINDSIGHT_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.candidates.is_empty() {
            return Err(ConfigError::EmptyCandidates);
        }

        if self.refresh.top_k == 0 {
            return Err(ConfigError::ZeroTopK);
        }

        if self.limits.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        for (i, spec) in self.limits.windows.iter().enumerate() {
            if spec.window.is_zero() {
                return Err(ConfigError::ZeroWindow(i));
            }
            if spec.max_calls == 0 {
                return Err(ConfigError::ZeroCap(i));
            }
        }

        self.timezone()?;

        if self.refresh.day_offset_minutes >= 24 * 60 {
            return Err(ConfigError::DayOffsetTooLarge(self.refresh.day_offset_minutes));
        }

        if self.source.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        if !matches!(self.logging.format.as_str(), "text" | "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat(self.logging.format.clone()));
        }

        Ok(())
    }

    /// Parsed refresh timezone
    pub fn timezone(&self) -> std::result::Result<RefreshTimezone, ConfigError> {
        self.refresh
            .timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(self.refresh.timezone.clone()))
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.request_timeout_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.limits.poll_interval_ms)
    }

    /// Socket address string for the HTTP server
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn rate_limiter(&self) -> RateLimiter {
        RateLimiter::new(self.limits.windows.clone()).with_poll_interval(self.poll_interval())
    }

    pub fn ranker(&self) -> Ranker {
        Ranker::new(self.refresh.top_k)
    }

    pub fn backup_store(&self) -> BackupStore {
        BackupStore::new(&self.backup.path)
    }

    /// Refresh calendar from the `refresh` section
    pub fn refresh_schedule(&self) -> std::result::Result<RefreshSchedule, ConfigError> {
        let schedule = RefreshSchedule::new(self.timezone()?, self.refresh.day_offset_minutes)
            .map_err(|_| ConfigError::DayOffsetTooLarge(self.refresh.day_offset_minutes))?;
        Ok(schedule.with_realign_daily(self.refresh.realign_daily))
    }

    /// Quandl client from the `source` section
    pub fn quandl_source(&self) -> std::result::Result<QuandlSource, FetchError> {
        QuandlSource::with_config(
            &self.source.base_url,
            self.source.api_key.clone(),
            self.source.columns.clone(),
            self.request_timeout(),
            self.source.lookback_days,
        )
    }
}

/// Adjusted close for the WIKI end-of-day equities database
fn default_columns() -> HashMap<String, u32> {
    HashMap::from([(String::from("WIKI"), 11)])
}

/// Built-in candidate list of large US equities
pub fn default_candidates() -> Vec<Candidate> {
    [
        ("AAPL", "Apple Inc."),
        ("MSFT", "Microsoft Corporation"),
        ("AMZN", "Amazon.com, Inc."),
        ("GOOGL", "Alphabet Inc."),
        ("FB", "Facebook, Inc."),
        ("NFLX", "Netflix, Inc."),
        ("NVDA", "NVIDIA Corporation"),
        ("AMD", "Advanced Micro Devices, Inc."),
        ("INTC", "Intel Corporation"),
        ("CSCO", "Cisco Systems, Inc."),
        ("ORCL", "Oracle Corporation"),
        ("IBM", "International Business Machines Corporation"),
        ("TSLA", "Tesla, Inc."),
        ("F", "Ford Motor Company"),
        ("GM", "General Motors Company"),
        ("BA", "The Boeing Company"),
        ("CAT", "Caterpillar Inc."),
        ("GE", "General Electric Company"),
        ("JPM", "JPMorgan Chase & Co."),
        ("GS", "The Goldman Sachs Group, Inc."),
        ("WMT", "Walmart Inc."),
        ("KO", "The Coca-Cola Company"),
        ("PEP", "PepsiCo, Inc."),
        ("MCD", "McDonald's Corporation"),
        ("XOM", "Exxon Mobil Corporation"),
    ]
    .into_iter()
    .map(|(ticker, name)| Candidate::new("WIKI", ticker, format!("{name} ({ticker}) Prices")))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            source: SourceConfig {
                api_key: String::from("test-key"),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_default_config_requires_api_key() {
        let config = Config::default();
        assert_eq!(config.validate(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn test_empty_candidates() {
        let mut config = valid_config();
        config.candidates.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyCandidates));
    }

    #[test]
    fn test_zero_top_k() {
        let mut config = valid_config();
        config.refresh.top_k = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroTopK));
    }

    #[test]
    fn test_zero_cap_window() {
        let mut config = valid_config();
        config.limits.windows.push(RateLimitSpec::per_minute(0));
        assert_eq!(config.validate(), Err(ConfigError::ZeroCap(3)));
    }

    #[test]
    fn test_zero_length_window() {
        let mut config = valid_config();
        config.limits.windows = vec![RateLimitSpec::new(Duration::ZERO, 5)];
        assert_eq!(config.validate(), Err(ConfigError::ZeroWindow(0)));
    }

    #[test]
    fn test_zero_poll_interval() {
        let mut config = valid_config();
        config.limits.poll_interval_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroPollInterval));
    }

    #[test]
    fn test_bad_timezone_and_offset() {
        let mut config = valid_config();
        config.refresh.timezone = String::from("Nowhere/Special");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimezone(_))));

        let mut config = valid_config();
        config.refresh.day_offset_minutes = 1440;
        assert_eq!(config.validate(), Err(ConfigError::DayOffsetTooLarge(1440)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("HINDSIGHT_API_KEY", "from-env"),
            ("HINDSIGHT_PORT", "9090"),
            ("HINDSIGHT_BACKUP_PATH", "/var/lib/hindsight/cache"),
            ("HINDSIGHT_LOG_LEVEL", "debug"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.source.api_key, "from-env");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.backup.path, PathBuf::from("/var/lib/hindsight/cache"));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_unparseable_port_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|k| (k == "HINDSIGHT_PORT").then(|| String::from("eighty")));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [source]
            api_key = "abc"

            [refresh]
            timezone = "America/New_York"
            top_k = 5

            [[limits.windows]]
            window_secs = 60
            max_calls = 10

            [[candidates]]
            source = "WIKI"
            key = "AAPL"
            description = "Apple"
            "#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.refresh.top_k, 5);
        assert_eq!(config.limits.windows, vec![RateLimitSpec::per_minute(10)]);
        assert_eq!(config.source.columns.get("WIKI"), Some(&11));
        assert_eq!(config.candidates.len(), 1);
    }

    #[test]
    fn test_derived_components() {
        let config = valid_config();
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.rate_limiter().specs().len(), 3);
        assert_eq!(config.ranker().top_k(), 20);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
        assert!(!config.refresh_schedule().unwrap().realign_daily);
        assert!(config.quandl_source().is_ok());
    }
}
