//! Tracing configuration.

use crate::env::{EnvTarget, ProcessEnv};
use std::str::FromStr;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line output.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        })
    }
}

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    log_format: LogFormat,
    log_filter: String,
    include_location: bool,
    include_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "info".to_string(),
            include_location: false,
            include_target: true,
        }
    }
}

impl TracingConfig {
    /// Read configuration from the process environment.
    ///
    /// - `TESTBED_LOG_FORMAT`: "json", "pretty" or "compact"
    /// - `TESTBED_LOG_LEVEL` or `RUST_LOG`: filter directives
    /// - `TESTBED_LOG_LOCATION`: "true" or "1" to include file and line
    pub fn from_env() -> Self {
        Self::from_target(&ProcessEnv)
    }

    /// Read configuration from `env`.
    pub fn from_target(env: &dyn EnvTarget) -> Self {
        let defaults = Self::default();
        let log_format = env
            .get("TESTBED_LOG_FORMAT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.log_format);
        let log_filter = env
            .get("TESTBED_LOG_LEVEL")
            .or_else(|| env.get("RUST_LOG"))
            .unwrap_or(defaults.log_filter);
        let include_location = env
            .get("TESTBED_LOG_LOCATION")
            .is_some_and(|s| s == "true" || s == "1");

        Self {
            log_format,
            log_filter,
            include_location,
            include_target: defaults.include_target,
        }
    }

    /// Set the format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Set the filter directives, e.g. `"info,testbed_core=debug"`.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Include file and line in events.
    pub fn with_location(mut self, include: bool) -> Self {
        self.include_location = include;
        self
    }

    /// Include the event target.
    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// Format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Filter directives.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Whether file and line are included.
    pub fn include_location(&self) -> bool {
        self.include_location
    }

    /// Whether the target is included.
    pub fn include_target(&self) -> bool {
        self.include_target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::IsolatedEnv;

    #[test]
    fn unknown_format_falls_back_to_compact() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("fancy".parse::<LogFormat>().unwrap(), LogFormat::Compact);
    }

    #[test]
    fn reads_from_target() {
        let env = IsolatedEnv::new()
            .with_var("TESTBED_LOG_FORMAT", "pretty")
            .with_var("RUST_LOG", "warn")
            .with_var("TESTBED_LOG_LOCATION", "1");

        let config = TracingConfig::from_target(&env);
        assert_eq!(config.log_format(), LogFormat::Pretty);
        assert_eq!(config.log_filter(), "warn");
        assert!(config.include_location());
    }

    #[test]
    fn level_takes_precedence_over_rust_log() {
        let env = IsolatedEnv::new()
            .with_var("TESTBED_LOG_LEVEL", "debug")
            .with_var("RUST_LOG", "warn");

        assert_eq!(TracingConfig::from_target(&env).log_filter(), "debug");
    }

    #[test]
    fn defaults_without_env() {
        assert_eq!(TracingConfig::from_target(&IsolatedEnv::new()), TracingConfig::default());
    }
}
