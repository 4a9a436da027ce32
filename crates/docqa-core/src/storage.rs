//! Durable storage collaborator.
//!
//! The engine runs entirely in memory; an [`IndexStorage`] lets it survive
//! restarts by loading a snapshot when it is built and saving one after
//! every mutation. Storage failures never corrupt the in-memory state: the
//! engine logs them and carries on.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::index::IndexState;
use crate::models::Document;

/// Everything needed to rebuild an engine's knowledge base.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// Embedding model that produced the stored vectors.
    pub model: String,
    pub dims: usize,
    pub documents: Vec<Document>,
    pub index: IndexState,
}

impl IndexSnapshot {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty() && self.index.entries.is_empty()
    }
}

#[async_trait]
pub trait IndexStorage: Send + Sync {
    /// Load the last saved snapshot, or `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<IndexSnapshot>>;

    /// Replace the stored snapshot.
    async fn save(&self, snapshot: &IndexSnapshot) -> Result<()>;
}

/// Storage that keeps the snapshot in process memory.
///
/// Useful for tests and for sharing one knowledge base between engines
/// built in the same process.
#[derive(Default)]
pub struct MemoryStorage {
    snapshot: Mutex<Option<IndexSnapshot>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexStorage for MemoryStorage {
    async fn load(&self) -> Result<Option<IndexSnapshot>> {
        let guard = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone())
    }

    async fn save(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let mut guard = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_starts_empty() {
        assert!(MemoryStorage::new().load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_storage_keeps_last_save() {
        let storage = MemoryStorage::new();
        let mut snap = IndexSnapshot {
            model: "hash".into(),
            dims: 384,
            ..Default::default()
        };
        storage.save(&snap).await.unwrap();
        snap.dims = 8;
        storage.save(&snap).await.unwrap();
        assert_eq!(storage.load().await.unwrap().unwrap().dims, 8);
    }
}
