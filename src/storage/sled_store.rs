//! Sled-based storage backend
//! Persistent key-value storage with crash safety

use super::{Storage, StorageError};
use async_trait::async_trait;
use sled::Db;
use std::path::PathBuf;
use std::sync::Arc;

const ITEMS_TREE: &str = "items";

/// Durable storage backed by sled
pub struct SledStorage {
    db: Arc<Db>,
}

impl SledStorage {
    /// Create or open storage at the default location
    pub fn new() -> Result<Self, StorageError> {
        let path = Self::default_path()?;
        Self::open(path)
    }

    /// Open storage at a specific path
    pub fn open(path: PathBuf) -> Result<Self, StorageError> {
        let db = sled::open(&path)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Get the default database path
    fn default_path() -> Result<PathBuf, StorageError> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| StorageError::Backend("no config directory found".to_string()))?;
        path.push("companion-store");
        path.push("records.db");

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Ok(path)
    }

    fn tree(&self) -> Result<sled::Tree, StorageError> {
        Ok(self.db.open_tree(ITEMS_TREE)?)
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

impl Clone for SledStorage {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
        }
    }
}

#[async_trait]
impl Storage for SledStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let tree = self.tree()?;
        match tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(String::from_utf8(bytes.to_vec())?)),
            None => Ok(None),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let tree = self.tree()?;
        tree.insert(key.as_bytes(), value.as_bytes())?;
        tree.flush()?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let tree = self.tree()?;
        tree.remove(key.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_storage_operations() {
        let dir = tempdir().unwrap();
        let storage = SledStorage::open(dir.path().join("test.db")).unwrap();

        storage.set_item("key1", "value1").await.unwrap();
        assert_eq!(
            storage.get_item("key1").await.unwrap(),
            Some("value1".to_string())
        );

        storage.remove_item("key1").await.unwrap();
        assert_eq!(storage.get_item("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        {
            let storage = SledStorage::open(path.clone()).unwrap();
            storage.set_item("key1", "[1,2,3]").await.unwrap();
            storage.flush().unwrap();
        }
        let storage = SledStorage::open(path).unwrap();
        assert_eq!(
            storage.get_item("key1").await.unwrap(),
            Some("[1,2,3]".to_string())
        );
    }
}
