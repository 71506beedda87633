//! Logging setup and the error sink.
//!
//! Everything the dispatcher logs goes through `tracing` with a `request_id`
//! field. [`init_logging`] installs a `tracing-subscriber` formatter for hosts
//! that do not bring their own, read from the environment:
//!
//! - `MVC_LOG_LEVEL`: trace/debug/info/warn/error (default `info`)
//! - `MVC_LOG_FORMAT`: json/pretty (default `json`)
//! - `MVC_LOG_DIRECTIVES`: extra comma-separated filter directives, e.g.
//!   `mvc_dispatch::buffer=trace`
//! - `MVC_LOG_INCLUDE_LOCATION`: add file and line to every event
//!
//! `RUST_LOG`, when set, replaces the level.
//!
//! Records the dispatcher must not lose are handed to an [`ErrorSink`].
//! Without a sink, a failure of the error page itself is returned to the host
//! instead of being swallowed.

use std::env;
use std::time::SystemTime;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{error, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::value_as_bool;
use crate::error::ErrorRecord;
use crate::ids::RequestId;

/// Event formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human output.
    Pretty,
}

impl LogFormat {
    /// Unknown names fall back to JSON.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("pretty") {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Filter directives added on top of the level.
    pub directives: Vec<String>,
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            directives: Vec::new(),
            include_location: false,
        }
    }
}

impl LogConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    /// Read `MVC_LOG_*` from an explicit variable list; unparsable values
    /// keep their default.
    #[must_use]
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::default();
        for (name, value) in vars {
            match name.as_str() {
                "MVC_LOG_LEVEL" => {
                    if let Ok(level) = value.trim().parse() {
                        config.level = level;
                    }
                }
                "MVC_LOG_FORMAT" => config.format = LogFormat::parse(&value),
                "MVC_LOG_DIRECTIVES" => {
                    config.directives = value
                        .split(',')
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "MVC_LOG_INCLUDE_LOCATION" => {
                    config.include_location =
                        value_as_bool(&Value::String(value)).unwrap_or(false);
                }
                _ => {}
            }
        }
        config
    }

    /// Debug level, pretty output, source locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            directives: Vec::new(),
            include_location: true,
        }
    }

    /// Filter for this configuration; `RUST_LOG` replaces the level.
    pub fn filter(&self) -> Result<EnvFilter> {
        let mut filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()));
        for directive in &self.directives {
            let parsed = directive
                .parse()
                .with_context(|| format!("invalid log directive '{directive}'"))?;
            filter = filter.add_directive(parsed);
        }
        Ok(filter)
    }
}

/// Install the global subscriber, writing to stderr.
///
/// Fails on an invalid directive or if a global subscriber is already
/// installed.
///
/// ```no_run
/// use mvc_dispatch::logging::{init_logging, LogConfig};
///
/// init_logging(&LogConfig::from_env())?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location);
    let layer = match config.format {
        LogFormat::Json => layer.json().with_current_span(true).boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
    };

    tracing_subscriber::registry()
        .with(config.filter()?)
        .with(layer)
        .try_init()
        .context("a global tracing subscriber is already installed")
}

/// Destination of error records the dispatcher must keep track of.
pub trait ErrorSink: Send + Sync {
    fn log_error(&self, request_id: &RequestId, record: &ErrorRecord);
}

/// Sink writing records to `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn log_error(&self, request_id: &RequestId, record: &ErrorRecord) {
        let elapsed_ms = SystemTime::now()
            .duration_since(request_id.created_at())
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        match record {
            ErrorRecord::Recoverable(e) => error!(
                request_id = %request_id,
                elapsed_ms,
                kind = %e.kind,
                message = %e.message,
                "Request error"
            ),
            ErrorRecord::Fatal(cause) => error!(
                request_id = %request_id,
                elapsed_ms,
                error = %format!("{cause:#}"),
                "Request failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Json);
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = LogConfig::from_vars(Vec::new());
        assert_eq!(config.level, Level::INFO);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.directives.is_empty());
        assert!(!config.include_location);
    }

    #[test]
    fn test_variables_override_defaults() {
        let config = LogConfig::from_vars(vars(&[
            ("MVC_LOG_LEVEL", "debug"),
            ("MVC_LOG_FORMAT", "pretty"),
            ("MVC_LOG_DIRECTIVES", "mvc_dispatch::buffer=trace, ,hyper=warn"),
            ("MVC_LOG_INCLUDE_LOCATION", "yes"),
            ("UNRELATED", "x"),
        ]));
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.directives, vec!["mvc_dispatch::buffer=trace", "hyper=warn"]);
        assert!(config.include_location);
    }

    #[test]
    fn test_unparsable_level_keeps_default() {
        let config = LogConfig::from_vars(vars(&[("MVC_LOG_LEVEL", "chatty")]));
        assert_eq!(config.level, Level::INFO);
    }

    #[test]
    fn test_invalid_directive_is_an_error() {
        let mut config = LogConfig::development();
        config.directives.push("mvc_dispatch=loud".to_string());
        assert!(config.filter().is_err());
    }
}
