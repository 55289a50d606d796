// ============================================================================
// MemoryKv - In-Memory Key-Value Storage
// ============================================================================
// Same contract as LocalDb, nothing touches disk. Used by tests and by
// `--ephemeral` sessions.
// ============================================================================

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use super::KvStore;

#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value, e.g. to simulate data left by a previous run
    pub fn with_entry(key: &str, value: impl Into<Vec<u8>>) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(key.to_string(), value.into());
        }
        store
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self
            .entries
            .lock()
            .map_err(|e| anyhow!("Memory store poisoned: {}", e))?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow!("Memory store poisoned: {}", e))?;
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}
