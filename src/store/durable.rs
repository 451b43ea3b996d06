//! ACID-durable key-value store backed by redb.
//!
//! Holds the serialized form of every planning record so an engine can be
//! re-opened on the same data directory and resume mid-simulation. All
//! writes go through transactions; reads use MVCC snapshots. Records are
//! addressed by prefixed binary keys (`obj:`, `log:`, `trait:`, …) so each
//! record family can be scanned independently.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{StoreError, StoreResult};

/// Single table for all planning records (prefixed keys → bincode values).
const PLAN_TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("plan");

/// ACID-durable store using redb.
pub struct DurableStore {
    db: Arc<Database>,
}

impl DurableStore {
    /// Open or create a durable store in the given directory.
    pub fn open(data_dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(data_dir).map_err(|e| StoreError::Io { source: e })?;
        let db_path = data_dir.join("telos.redb");
        let db = Database::create(&db_path).map_err(|e| StoreError::Redb {
            message: format!("failed to open redb at {}: {e}", db_path.display()),
        })?;
        // Make sure the table exists so first reads don't fail.
        let txn = db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        txn.open_table(PLAN_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Store a key-value pair with full ACID guarantees.
    pub fn put(&self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        {
            let mut table = txn.open_table(PLAN_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
            table.insert(key, value).map_err(|e| StoreError::Redb {
                message: format!("insert failed: {e}"),
            })?;
        }
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;
        Ok(())
    }

    /// Read a value by key. Returns `Ok(None)` if the key doesn't exist.
    pub fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(PLAN_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        let result = table.get(key).map_err(|e| StoreError::Redb {
            message: format!("get failed: {e}"),
        })?;
        Ok(result.map(|guard| guard.value().to_vec()))
    }

    /// Delete a key. Returns whether the key existed.
    pub fn remove(&self, key: &[u8]) -> StoreResult<bool> {
        let txn = self.db.begin_write().map_err(|e| StoreError::Redb {
            message: format!("begin_write failed: {e}"),
        })?;
        let existed = {
            let mut table = txn.open_table(PLAN_TABLE).map_err(|e| StoreError::Redb {
                message: format!("open_table failed: {e}"),
            })?;
            let result = table.remove(key).map_err(|e| StoreError::Redb {
                message: format!("remove failed: {e}"),
            })?;
            result.is_some()
        };
        txn.commit().map_err(|e| StoreError::Redb {
            message: format!("commit failed: {e}"),
        })?;
        Ok(existed)
    }

    /// Scan all `(key, value)` pairs whose key starts with `prefix`.
    pub fn scan_prefix(&self, prefix: &[u8]) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let txn = self.db.begin_read().map_err(|e| StoreError::Redb {
            message: format!("begin_read failed: {e}"),
        })?;
        let table = txn.open_table(PLAN_TABLE).map_err(|e| StoreError::Redb {
            message: format!("open_table failed: {e}"),
        })?;
        let mut out = Vec::new();
        let iter = table.range(prefix..).map_err(|e| StoreError::Redb {
            message: format!("range failed: {e}"),
        })?;
        for entry in iter {
            let (key, value) = entry.map_err(|e| StoreError::Redb {
                message: format!("range iteration failed: {e}"),
            })?;
            if !key.value().starts_with(prefix) {
                break;
            }
            out.push((key.value().to_vec(), value.value().to_vec()));
        }
        Ok(out)
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn put_get_remove() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        store.put(b"obj:1", b"hello").unwrap();
        assert_eq!(store.get(b"obj:1").unwrap(), Some(b"hello".to_vec()));

        assert!(store.remove(b"obj:1").unwrap());
        assert_eq!(store.get(b"obj:1").unwrap(), None);
        assert!(!store.remove(b"obj:1").unwrap());
    }

    #[test]
    fn scan_prefix_stops_at_family_boundary() {
        let dir = TempDir::new().unwrap();
        let store = DurableStore::open(dir.path()).unwrap();

        store.put(b"obj:1", b"a").unwrap();
        store.put(b"obj:2", b"b").unwrap();
        store.put(b"trait:1", b"c").unwrap();

        let objs = store.scan_prefix(b"obj:").unwrap();
        assert_eq!(objs.len(), 2);
        let traits = store.scan_prefix(b"trait:").unwrap();
        assert_eq!(traits.len(), 1);
    }

    #[test]
    fn reopen_sees_previous_writes() {
        let dir = TempDir::new().unwrap();
        {
            let store = DurableStore::open(dir.path()).unwrap();
            store.put(b"obj:9", b"persisted").unwrap();
        }
        let store = DurableStore::open(dir.path()).unwrap();
        assert_eq!(store.get(b"obj:9").unwrap(), Some(b"persisted".to_vec()));
    }
}
