//! Tier-1 configuration objects and their loading from disk.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info};

/// Configuration object registered for a request.
///
/// `lookup` returns `None` (or `Some(Value::Null)`) for keys it does not
/// define; the resolver then falls through to the next tier.
pub trait Configuration: Send + Sync {
    fn lookup(&self, key: &str) -> Option<Value>;
}

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io { path: PathBuf, source: std::io::Error },
    /// The file content is not a valid document of its format.
    Parse { path: PathBuf, message: String },
    /// The file extension names no supported format.
    UnsupportedFormat { path: PathBuf },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read configuration '{}': {}", path.display(), source)
            }
            ConfigError::Parse { path, message } => {
                write!(f, "cannot parse configuration '{}': {}", path.display(), message)
            }
            ConfigError::UnsupportedFormat { path } => write!(
                f,
                "unsupported configuration format '{}' (expected .yaml, .yml, .toml or .json)",
                path.display()
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Flat key/value configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapConfiguration {
    values: HashMap<String, Value>,
}

impl MapConfiguration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Load a configuration file; the format follows the extension.
    ///
    /// The document must be a mapping at its top level.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let parse_error = |message: String| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        };

        let values: HashMap<String, Value> = match extension.as_deref() {
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&content).map_err(|e| parse_error(e.to_string()))?
            }
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?
            }
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        info!(
            path = %path.display(),
            keys = values.len(),
            "Configuration loaded"
        );
        Ok(Self { values })
    }
}

impl Configuration for MapConfiguration {
    fn lookup(&self, key: &str) -> Option<Value> {
        let found = self.values.get(key).cloned();
        debug!(key, found = found.is_some(), "Configuration lookup");
        found
    }
}

impl FromIterator<(String, Value)> for MapConfiguration {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
