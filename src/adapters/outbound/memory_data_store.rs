//! In-Memory Data Store
//!
//! Implements DataStore using DashMap for lock-free concurrent access.

use crate::domain::errors::EdgeError;
use crate::domain::ports::DataStore;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// DashMap-backed key/value store.
///
/// Nothing survives the process. Useful for tests and for nodes that only
/// serve computed results.
#[derive(Default)]
pub struct InMemoryDataStore {
    entries: DashMap<String, Value>,
    closed: AtomicBool,
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<(), EdgeError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(EdgeError::DataStore("store is closed".to_string()));
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, EdgeError> {
        self.ensure_open()?;
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn put(&self, key: impl Into<String>, value: Value) -> Result<Option<Value>, EdgeError> {
        self.ensure_open()?;
        Ok(self.entries.insert(key.into(), value))
    }

    pub fn remove(&self, key: &str) -> Result<Option<Value>, EdgeError> {
        self.ensure_open()?;
        Ok(self.entries.remove(key).map(|(_, v)| v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DataStore for InMemoryDataStore {
    fn close(&self) -> Result<(), EdgeError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(EdgeError::DataStore("store already closed".to_string()));
        }
        self.entries.clear();
        Ok(())
    }
}
