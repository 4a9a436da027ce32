//! Vector index abstraction and the in-memory implementation.
//!
//! The [`VectorIndex`] trait is the seam between answer selection and
//! whatever holds the vectors. [`InMemoryIndex`] keeps entries in a `Vec`
//! behind a `std::sync::RwLock`: writers append under the exclusive lock,
//! so readers observe either the state before an `add` or the state after
//! it, never a partially appended batch.
//!
//! Search is brute-force cosine similarity over every stored vector,
//! ordered by descending score with ties broken by insertion order. Only
//! the top `k` entries are cloned out of the lock.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::embedding::cosine_similarity;
use crate::error::{QaError, Result};
use crate::models::{EntryId, IndexEntry, NewEntry, ScoredEntry};

/// Raw index contents, used to persist and restore an index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
    pub entries: Vec<IndexEntry>,
    /// The id the next appended entry will receive.
    pub next_id: u64,
}

/// Abstract vector index.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](VectorIndex::add) | Append entries, assigning ids |
/// | [`search`](VectorIndex::search) | Top-k by cosine similarity |
/// | [`is_empty`](VectorIndex::is_empty) / [`len`](VectorIndex::len) | Size checks |
/// | [`reset`](VectorIndex::reset) | Drop every entry |
/// | [`export`](VectorIndex::export) / [`import`](VectorIndex::import) | Persistence hooks |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append entries. Never deduplicates. Either every entry is appended or
    /// none is.
    async fn add(&self, entries: Vec<NewEntry>) -> Result<Vec<EntryId>>;

    /// Return at most `k` entries by descending similarity to `query`.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry>>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove every entry.
    async fn reset(&self) -> Result<()>;

    /// Copy out the full index contents.
    async fn export(&self) -> Result<IndexState>;

    /// Replace the index contents with `state`.
    async fn import(&self, state: IndexState) -> Result<()>;
}

#[derive(Default)]
struct Inner {
    entries: Vec<IndexEntry>,
    next_id: u64,
    dims: Option<usize>,
}

/// In-memory vector index.
#[derive(Default)]
pub struct InMemoryIndex {
    inner: RwLock<Inner>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dimensionality fixed by the first stored vector, if any.
    pub fn dims(&self) -> Option<usize> {
        self.read(|inner| inner.dims)
    }

    fn read<T>(&self, f: impl FnOnce(&Inner) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

/// Descending score, then ascending entry id.
fn rank(a: (f32, EntryId), b: (f32, EntryId)) -> std::cmp::Ordering {
    b.0.total_cmp(&a.0).then(a.1.cmp(&b.1))
}

/// Order candidates by descending score, then by ascending entry id.
pub fn rank_candidates(candidates: &mut [ScoredEntry]) {
    candidates.sort_by(|a, b| rank((a.score, a.entry.id), (b.score, b.entry.id)));
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn add(&self, entries: Vec<NewEntry>) -> Result<Vec<EntryId>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        self.write(|inner| {
            let dims = inner.dims.unwrap_or(entries[0].vector.len());
            if let Some(bad) = entries.iter().find(|e| e.vector.len() != dims) {
                return Err(QaError::DimensionMismatch {
                    expected: dims,
                    actual: bad.vector.len(),
                });
            }
            inner.dims = Some(dims);

            let mut ids = Vec::with_capacity(entries.len());
            for e in entries {
                let id = EntryId(inner.next_id);
                inner.next_id += 1;
                inner.entries.push(IndexEntry {
                    id,
                    text: e.text,
                    vector: e.vector,
                    metadata: e.metadata,
                });
                ids.push(id);
            }
            Ok(ids)
        })
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let hits = self.read(|inner| {
            let entries = &inner.entries;
            let mut scored: Vec<(usize, f32)> = entries
                .iter()
                .enumerate()
                .map(|(i, entry)| (i, cosine_similarity(query, &entry.vector)))
                .collect();
            let by_rank = |a: &(usize, f32), b: &(usize, f32)| {
                rank((a.1, entries[a.0].id), (b.1, entries[b.0].id))
            };
            if k < scored.len() {
                scored.select_nth_unstable_by(k - 1, by_rank);
                scored.truncate(k);
            }
            scored.sort_by(by_rank);
            scored
                .into_iter()
                .map(|(i, score)| ScoredEntry {
                    entry: entries[i].clone(),
                    score,
                })
                .collect::<Vec<_>>()
        });
        Ok(hits)
    }

    async fn len(&self) -> usize {
        self.read(|inner| inner.entries.len())
    }

    async fn reset(&self) -> Result<()> {
        self.write(|inner| {
            inner.entries.clear();
            inner.dims = None;
        });
        Ok(())
    }

    async fn export(&self) -> Result<IndexState> {
        Ok(self.read(|inner| IndexState {
            entries: inner.entries.clone(),
            next_id: inner.next_id,
        }))
    }

    async fn import(&self, state: IndexState) -> Result<()> {
        let dims = state.entries.first().map(|e| e.vector.len());
        if let (Some(d), Some(bad)) = (
            dims,
            state.entries.iter().find(|e| Some(e.vector.len()) != dims),
        ) {
            return Err(QaError::DimensionMismatch {
                expected: d,
                actual: bad.vector.len(),
            });
        }
        let max_id = state.entries.iter().map(|e| e.id.0 + 1).max().unwrap_or(0);
        self.write(|inner| {
            inner.next_id = state.next_id.max(max_id);
            inner.entries = state.entries;
            inner.dims = dims;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryMetadata;

    fn entry(text: &str, vector: Vec<f32>) -> NewEntry {
        NewEntry {
            text: text.to_string(),
            vector,
            metadata: EntryMetadata {
                source: "doc".to_string(),
                position: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_empty_index_search_is_empty() {
        let index = InMemoryIndex::new();
        assert!(index.is_empty().await);
        for k in [0, 1, 5, 100] {
            assert!(index.search(&[1.0, 0.0], k).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_ids_are_monotonic() {
        let index = InMemoryIndex::new();
        let a = index.add(vec![entry("a", vec![1.0, 0.0])]).await.unwrap();
        let b = index
            .add(vec![entry("b", vec![0.0, 1.0]), entry("c", vec![1.0, 1.0])])
            .await
            .unwrap();
        assert_eq!(a, vec![EntryId(0)]);
        assert_eq!(b, vec![EntryId(1), EntryId(2)]);
        assert_eq!(index.len().await, 3);
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let index = InMemoryIndex::new();
        index
            .add(vec![
                entry("east", vec![1.0, 0.0]),
                entry("north", vec![0.0, 1.0]),
                entry("north-east", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();
        let hits = index.search(&[0.0, 1.0], 2).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].entry.text, "north");
        assert_eq!(hits[1].entry.text, "north-east");
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn test_ties_favor_insertion_order() {
        let index = InMemoryIndex::new();
        index
            .add(vec![
                entry("first", vec![1.0, 0.0]),
                entry("second", vec![2.0, 0.0]),
                entry("third", vec![3.0, 0.0]),
            ])
            .await
            .unwrap();
        let hits = index.search(&[1.0, 0.0], 3).await.unwrap();
        let order: Vec<&str> = hits.iter().map(|h| h.entry.text.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_top_k_from_large_index_keeps_rank_order() {
        let index = InMemoryIndex::new();
        let entries: Vec<NewEntry> = (0..40)
            .map(|i| entry(&format!("e{}", i), vec![1.0, (i % 4) as f32]))
            .collect();
        index.add(entries).await.unwrap();

        let hits = index.search(&[1.0, 0.0], 5).await.unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.entry.id.0).collect();
        assert_eq!(ids, vec![0, 4, 8, 12, 16]);

        let hits = index.search(&[1.0, 0.0], 12).await.unwrap();
        let ids: Vec<u64> = hits.iter().map(|h| h.entry.id.0).collect();
        assert_eq!(ids, vec![0, 4, 8, 12, 16, 20, 24, 28, 32, 36, 1, 5]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));

        assert_eq!(index.search(&[1.0, 0.0], 100).await.unwrap().len(), 40);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_appends_nothing() {
        let index = InMemoryIndex::new();
        index.add(vec![entry("a", vec![1.0, 0.0])]).await.unwrap();
        let err = index
            .add(vec![entry("b", vec![1.0, 0.0]), entry("c", vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QaError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn test_reset_is_idempotent() {
        let index = InMemoryIndex::new();
        index.add(vec![entry("a", vec![1.0, 0.0])]).await.unwrap();
        index.reset().await.unwrap();
        assert!(index.is_empty().await);
        index.reset().await.unwrap();
        assert!(index.is_empty().await);
        // a new dimensionality is accepted after reset
        index.add(vec![entry("b", vec![1.0, 0.0, 0.0])]).await.unwrap();
        assert_eq!(index.dims(), Some(3));
    }

    #[tokio::test]
    async fn test_export_import_preserves_ids() {
        let source = InMemoryIndex::new();
        source
            .add(vec![entry("a", vec![1.0, 0.0]), entry("b", vec![0.0, 1.0])])
            .await
            .unwrap();
        let state = source.export().await.unwrap();

        let restored = InMemoryIndex::new();
        restored.import(state.clone()).await.unwrap();
        assert_eq!(restored.export().await.unwrap(), state);

        let next = restored.add(vec![entry("c", vec![1.0, 1.0])]).await.unwrap();
        assert_eq!(next, vec![EntryId(2)]);
    }
}
