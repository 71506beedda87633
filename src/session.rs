//! Session storage seen by the dispatcher.
//!
//! Session mechanics (cookies, persistence) belong to the host. The
//! dispatcher only needs to read and write values on behalf of controllers
//! and to destroy the session after a fatal error.

use std::collections::HashMap;

use serde_json::Value;

/// Host-provided session.
pub trait SessionStore: Send {
    fn get(&self, key: &str) -> Option<&Value>;
    fn insert(&mut self, key: String, value: Value);
    fn remove(&mut self, key: &str) -> Option<Value>;
    /// Whether a session is currently open.
    fn is_active(&self) -> bool;
    /// Drop every value and close the session.
    fn destroy(&mut self);
}

/// In-memory session, for tests and single-process hosts.
#[derive(Debug, Clone)]
pub struct MemorySession {
    values: HashMap<String, Value>,
    active: bool,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            active: true,
        }
    }
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    fn insert(&mut self, key: String, value: Value) {
        self.active = true;
        self.values.insert(key, value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn destroy(&mut self) {
        self.values.clear();
        self.active = false;
    }
}
