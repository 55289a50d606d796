// ============================================================================
// LocalDb - Embedded Key-Value Storage (redb)
// ============================================================================
// Durable local storage for the cart and any other small client state.
// Default path: ~/.storefront/storefront.redb (StorefrontConfig::db_path overrides)
// ============================================================================

pub mod memory;

pub use memory::MemoryKv;

use anyhow::{anyhow, Result};
use redb::{Database, TableDefinition};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const KV: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// Storage port the stores are constructed with.
/// Implementations must make each `put` atomic: readers see either the old
/// or the new value, never a partial write.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
}

/// File-backed key-value store
pub struct LocalDb {
    db: Database,
    path: PathBuf,
}

impl LocalDb {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses ~/.storefront/storefront.redb
    pub fn open(path: Option<&str>) -> Result<Self> {
        let db_path = if let Some(p) = path {
            PathBuf::from(p)
        } else {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
            let data_dir = home.join(".storefront");
            std::fs::create_dir_all(&data_dir)
                .map_err(|e| anyhow!("Failed to create .storefront directory: {}", e))?;
            data_dir.join("storefront.redb")
        };

        info!("Opening database at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open database: {}", e))?;

        // Make sure the table exists so reads never fail on a fresh file
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let _ = write_txn
                .open_table(KV)
                .map_err(|e| anyhow!("Failed to create kv table: {}", e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        Ok(Self { db, path: db_path })
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvStore for LocalDb {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let table = read_txn.open_table(KV)
            .map_err(|e| anyhow!("Failed to open kv table: {}", e))?;

        let value = table
            .get(key)
            .map_err(|e| anyhow!("Failed to get {}: {}", key, e))?
            .map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut table = write_txn.open_table(KV)
                .map_err(|e| anyhow!("Failed to open kv table: {}", e))?;
            table.insert(key, value)
                .map_err(|e| anyhow!("Failed to insert {}: {}", key, e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;

        debug!("Stored {} ({} bytes)", key, value.len());
        Ok(())
    }
}
