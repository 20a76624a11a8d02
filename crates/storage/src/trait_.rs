//! Item source trait abstraction.

use async_trait::async_trait;
use timeline_core::Item;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Where item snapshots come from.
///
/// This trait allows different backends to be plugged in. Implementations
/// return the whole set at once so every pass sees the same frozen input.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Load every item.
    async fn load_items(&self) -> Result<Vec<Item>>;

    /// Replace the stored snapshot with `items`.
    async fn save_items(&mut self, items: &[Item]) -> Result<()>;
}
