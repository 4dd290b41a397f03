//! Session-scoped key/value storage supplied by the session provider.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

/// Per-session storage. Implementations use interior mutability so a
/// shared context can record state (e.g. view-throttle timestamps).
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    /// Drop every entry; used when an actor is signed out.
    fn flush(&self);
}

/// In-process session storage.
#[derive(Debug, Default)]
pub struct MemorySession {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for MemorySession {
    fn get(&self, key: &str) -> Option<Value> {
        self.entries().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.entries().insert(key.to_string(), value);
    }

    fn flush(&self) {
        self.entries().clear();
    }
}
