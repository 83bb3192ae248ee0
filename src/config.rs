//! Monitor settings shared by the TUI and batch mode.

use std::fmt;
use std::time::Duration;

use crate::collector::tables::SOURCE_IDS;
use crate::collector::{DisplayMode, RetryPolicy};

/// Invalid monitor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroInterval,
    ZeroFetchTimeout,
    ZeroMaxFailures,
    UnknownSource(String),
    NoSources,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroInterval => write!(f, "interval must be at least 1 second"),
            ConfigError::ZeroFetchTimeout => write!(f, "fetch timeout must be greater than 0"),
            ConfigError::ZeroMaxFailures => write!(f, "max failures must be at least 1"),
            ConfigError::UnknownSource(id) => write!(
                f,
                "unknown source '{}' (known: {})",
                id,
                SOURCE_IDS.join(", ")
            ),
            ConfigError::NoSources => write!(f, "no sources selected"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Validated monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub retry: RetryPolicy,
    pub initial_mode: DisplayMode,
    /// Source ids to poll, in display order.
    pub sources: Vec<String>,
    /// Whether to enable instruments in `setup_instruments` at startup.
    pub configure_instruments: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            initial_mode: DisplayMode::Relative,
            sources: SOURCE_IDS.iter().map(|s| s.to_string()).collect(),
            configure_instruments: true,
        }
    }
}

impl MonitorConfig {
    /// Checks intervals and thresholds and resolves the source list.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.retry.fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroFetchTimeout);
        }
        if self.retry.max_consecutive_failures == 0 {
            return Err(ConfigError::ZeroMaxFailures);
        }
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        if let Some(unknown) = self
            .sources
            .iter()
            .find(|id| !SOURCE_IDS.contains(&id.as_str()))
        {
            return Err(ConfigError::UnknownSource(unknown.clone()));
        }
        Ok(())
    }
}

/// Parses a comma-separated source list (`"statements, file_io"`).
///
/// Empty items are skipped and duplicates dropped, keeping first-seen order.
pub fn parse_sources(list: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|s| s == item) {
            out.push(item.to_string());
        }
    }
    out
}
