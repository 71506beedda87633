use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use super::{Configuration, Environment};
use crate::assert::{is_true, AssertionFailure};

/// Three-tier configuration lookup for one request.
#[derive(Clone, Default)]
pub struct ConfigResolver {
    configuration: Option<Arc<dyn Configuration>>,
    environment: Arc<Environment>,
}

impl std::fmt::Debug for ConfigResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigResolver")
            .field("has_configuration", &self.configuration.is_some())
            .field("environment", &self.environment)
            .finish()
    }
}

impl ConfigResolver {
    #[must_use]
    pub fn new(environment: Arc<Environment>) -> Self {
        Self {
            configuration: None,
            environment,
        }
    }

    /// Install the tier-1 object, replacing any previous one.
    pub fn set_configuration(&mut self, configuration: Arc<dyn Configuration>) {
        self.configuration = Some(configuration);
    }

    /// Remove the tier-1 object and return it.
    pub fn clear_configuration(&mut self) -> Option<Arc<dyn Configuration>> {
        self.configuration.take()
    }

    #[must_use]
    pub fn configuration(&self) -> Option<&Arc<dyn Configuration>> {
        self.configuration.as_ref()
    }

    #[must_use]
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    /// Resolve `key` through tiers 1 and 2; `None` when neither has a
    /// non-null value.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<Value> {
        let from_config = self
            .configuration
            .as_ref()
            .and_then(|c| c.lookup(key))
            .filter(|v| !v.is_null());
        let found = from_config.or_else(|| {
            self.environment
                .constant(key)
                .filter(|v| !v.is_null())
                .cloned()
        });
        trace!(key, found = found.is_some(), "Configuration key resolved");
        found
    }

    /// Resolve `key`, falling back to `default`. Never fails.
    #[must_use]
    pub fn get(&self, key: &str, default: Value) -> Value {
        self.lookup(key).unwrap_or(default)
    }

    /// Resolve a boolean; values that cannot be read as booleans count as
    /// absent.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.lookup(key)
            .and_then(|v| value_as_bool(&v))
            .unwrap_or(default)
    }

    /// Resolve a string; numbers and booleans are rendered as text.
    #[must_use]
    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.lookup(key)
            .and_then(|v| value_as_string(&v))
            .unwrap_or_else(|| default.to_string())
    }

    /// Resolve a key that must be configured.
    pub fn required(&self, key: &str) -> Result<Value, AssertionFailure> {
        let value = self.lookup(key);
        is_true(value.is_some(), || missing_key(key))?;
        Ok(value.unwrap_or(Value::Null))
    }

    /// Resolve a key that must be configured with a textual value.
    pub fn required_str(&self, key: &str) -> Result<String, AssertionFailure> {
        let value = self.required(key)?;
        value_as_string(&value).ok_or_else(|| {
            AssertionFailure::new(format!(
                "The required configuration property '{key}' is not a string."
            ))
        })
    }
}

fn missing_key(key: &str) -> String {
    format!("The required configuration property '{key}' is missing or the associated value is null.")
}

/// Read a configuration value as a boolean.
///
/// Accepts JSON booleans, numbers (non-zero is true) and the strings
/// `1/0/true/false/yes/no/on/off` in any case.
#[must_use]
pub fn value_as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
