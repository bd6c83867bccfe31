//! Asynchronous key-value storage primitive
//! Every collection and settings blob lives under its own key; values are
//! UTF-8 JSON strings. The store layer never relies on atomicity across keys.

use async_trait::async_trait;

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStorage;
pub use sled_store::SledStorage;

/// Fault raised by a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("stored value is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Asynchronous key-value interface the record stores are built on
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Multi-key remove used for bulk teardown
    async fn remove_items(&self, keys: &[&str]) -> Result<(), StorageError> {
        for key in keys {
            self.remove_item(key).await?;
        }
        Ok(())
    }
}
