//! Engine facade: ingestion, querying, and persistence behind one type.
//!
//! [`QaEngine`] owns the normalizer settings, the injected [`Embedder`], the
//! vector index, the [`Selector`], the optional [`IndexStorage`], and the
//! registry of ingested documents. It is `Send + Sync` and meant to be
//! shared behind an `Arc` (the HTTP server does exactly that).
//!
//! # Persistence
//!
//! When storage is configured, every mutation ends with a full snapshot
//! save. Export and save run under an async mutex, so two concurrent
//! ingests cannot leave the older snapshot as the last one written. Save
//! failures are logged; the in-memory state stays authoritative.
//!
//! A stored knowledge base that cannot be loaded or restored is left
//! untouched: the engine starts empty with persistence disabled, since the
//! next save would otherwise replace the unreadable data.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use docqa_core::embedding::HashingEmbedder;
//! use docqa_core::QaEngine;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = QaEngine::builder(Arc::new(HashingEmbedder::default()))
//!     .build()
//!     .await
//!     .unwrap();
//! engine
//!     .ingest("handbook.txt", "The fire exit is on the second floor.")
//!     .await
//!     .unwrap();
//! let answer = engine.query("Where is the fire exit?", None).await.unwrap();
//! assert_eq!(answer.source, "handbook.txt");
//! # }
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::compose::Composer;
use crate::embedding::{embed, EmbedInput, Embedder};
use crate::error::{QaError, Result};
use crate::index::{InMemoryIndex, IndexState, VectorIndex};
use crate::models::{AnswerRecord, Document, EntryMetadata, IndexEntry, IndexStats, NewEntry};
use crate::normalize::Normalizer;
use crate::select::Selector;
use crate::storage::{IndexSnapshot, IndexStorage};

/// Per-query knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Number of candidates to retrieve. `None` uses the engine default.
    pub k: Option<usize>,
    /// Whether a configured composer should write the answer.
    pub compose: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            k: None,
            compose: true,
        }
    }
}

/// Builder for [`QaEngine`].
pub struct QaEngineBuilder {
    embedder: Arc<dyn Embedder>,
    index: Option<Arc<dyn VectorIndex>>,
    normalizer: Normalizer,
    composer: Option<Arc<dyn Composer>>,
    storage: Option<Arc<dyn IndexStorage>>,
    default_k: Option<usize>,
}

impl QaEngineBuilder {
    pub fn normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Use a custom index instead of a fresh [`InMemoryIndex`].
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn composer(mut self, composer: Arc<dyn Composer>) -> Self {
        self.composer = Some(composer);
        self
    }

    pub fn storage(mut self, storage: Arc<dyn IndexStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Override the default `k` (1 without a composer, 3 with one).
    pub fn default_k(mut self, k: usize) -> Self {
        self.default_k = Some(k);
        self
    }

    /// Validate settings, restore any stored snapshot, and build the engine.
    pub async fn build(self) -> Result<QaEngine> {
        self.normalizer.validate()?;

        let index = self
            .index
            .unwrap_or_else(|| Arc::new(InMemoryIndex::new()) as Arc<dyn VectorIndex>);
        let mut selector = Selector::new(self.embedder.clone(), index.clone());
        if let Some(composer) = self.composer {
            selector = selector.with_composer(composer);
        }
        let default_k = self.default_k.unwrap_or_else(|| selector.default_k()).max(1);

        let mut engine = QaEngine {
            normalizer: self.normalizer,
            embedder: self.embedder,
            index,
            selector,
            storage: self.storage,
            documents: RwLock::new(Vec::new()),
            persist_lock: Mutex::new(()),
            mutation_lock: Mutex::new(()),
            default_k,
        };

        if let Some(storage) = engine.storage.clone() {
            let loaded = match storage.load().await {
                Ok(Some(snapshot)) => engine.restore(snapshot).await,
                Ok(None) => {
                    debug!("no stored knowledge base, starting empty");
                    Ok(())
                }
                Err(error) => Err(error),
            };
            match loaded {
                Ok(()) => {}
                Err(error @ QaError::Storage(_)) => {
                    warn!(
                        %error,
                        "stored knowledge base is unreadable, starting empty with persistence disabled"
                    );
                    engine.storage = None;
                }
                Err(other) => return Err(other),
            }
        }

        Ok(engine)
    }
}

/// Document question-answering engine.
pub struct QaEngine {
    normalizer: Normalizer,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    selector: Selector,
    storage: Option<Arc<dyn IndexStorage>>,
    documents: RwLock<Vec<Document>>,
    persist_lock: Mutex<()>,
    /// Orders index and document-registry mutations with respect to each
    /// other and to snapshots.
    mutation_lock: Mutex<()>,
    default_k: usize,
}

impl QaEngine {
    pub fn builder(embedder: Arc<dyn Embedder>) -> QaEngineBuilder {
        QaEngineBuilder {
            embedder,
            index: None,
            normalizer: Normalizer::default(),
            composer: None,
            storage: None,
            default_k: None,
        }
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn has_composer(&self) -> bool {
        self.selector.has_composer()
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Whether mutations are saved to storage.
    pub fn is_persistent(&self) -> bool {
        self.storage.is_some()
    }

    /// Normalize, embed, and index one document. Returns the number of
    /// units added.
    ///
    /// Text that yields no units still registers the document and makes no
    /// embedding call.
    pub async fn ingest(&self, document_id: &str, text: &str) -> Result<usize> {
        let added = self.ingest_one(document_id, text).await?;
        self.persist().await;
        Ok(added)
    }

    /// Ingest several `(document_id, text)` pairs in order, persisting once.
    /// Returns the units added per document.
    pub async fn ingest_many(&self, documents: &[(String, String)]) -> Result<Vec<usize>> {
        let mut added = Vec::with_capacity(documents.len());
        for (id, text) in documents {
            match self.ingest_one(id, text).await {
                Ok(n) => added.push(n),
                Err(e) => {
                    // keep what was already indexed
                    self.persist().await;
                    return Err(e);
                }
            }
        }
        self.persist().await;
        Ok(added)
    }

    async fn ingest_one(&self, document_id: &str, text: &str) -> Result<usize> {
        let units = self.normalizer.normalize_document(document_id, text);

        let entries: Vec<NewEntry> = if units.is_empty() {
            debug!(document = document_id, "document produced no units");
            Vec::new()
        } else {
            let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
            let vectors = embed(self.embedder.as_ref(), EmbedInput::Many(&texts))
                .await?
                .into_vectors();
            units
                .into_iter()
                .zip(vectors)
                .map(|(unit, vector)| NewEntry {
                    text: unit.text,
                    vector,
                    metadata: EntryMetadata {
                        source: unit.document_id,
                        position: unit.position,
                    },
                })
                .collect()
        };

        // entries and their document become visible together
        let added = {
            let _guard = self.mutation_lock.lock().await;
            let added = if entries.is_empty() {
                0
            } else {
                self.index.add(entries).await?.len()
            };
            self.documents
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Document {
                    id: document_id.to_string(),
                    text: text.to_string(),
                    ingested_at: Utc::now(),
                });
            added
        };

        info!(document = document_id, units = added, "ingested document");
        Ok(added)
    }

    /// Answer `question` with default options, overriding `k` if given.
    pub async fn query(&self, question: &str, k: Option<usize>) -> Result<AnswerRecord> {
        self.query_with(
            question,
            QueryOptions {
                k,
                ..QueryOptions::default()
            },
        )
        .await
    }

    pub async fn query_with(&self, question: &str, options: QueryOptions) -> Result<AnswerRecord> {
        let k = options.k.unwrap_or(self.default_k);
        self.selector.answer_with(question, k, options.compose).await
    }

    /// Drop every document and entry. Idempotent.
    pub async fn reset(&self) -> Result<()> {
        {
            let _guard = self.mutation_lock.lock().await;
            self.index.reset().await?;
            self.documents
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
        }
        info!("knowledge base reset");
        self.persist().await;
        Ok(())
    }

    pub async fn stats(&self) -> IndexStats {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner).len();
        IndexStats {
            documents,
            entries: self.index.len().await,
            model: self.embedder.model_name().to_string(),
            dims: self.embedder.dims(),
        }
    }

    /// Capture the current knowledge base.
    pub async fn snapshot(&self) -> Result<IndexSnapshot> {
        let _guard = self.mutation_lock.lock().await;
        let index = self.index.export().await?;
        let documents = self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(IndexSnapshot {
            model: self.embedder.model_name().to_string(),
            dims: self.embedder.dims(),
            documents,
            index,
        })
    }

    async fn persist(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let _guard = self.persist_lock.lock().await;
        let result = match self.snapshot().await {
            Ok(snapshot) => storage.save(&snapshot).await,
            Err(e) => Err(e),
        };
        if let Err(error) = result {
            warn!(%error, "failed to persist knowledge base, continuing in memory");
        }
    }

    async fn restore(&self, snapshot: IndexSnapshot) -> Result<()> {
        let state = if snapshot.model == self.embedder.model_name()
            && snapshot.dims == self.embedder.dims()
        {
            snapshot.index
        } else {
            info!(
                stored_model = %snapshot.model,
                stored_dims = snapshot.dims,
                model = self.embedder.model_name(),
                dims = self.embedder.dims(),
                entries = snapshot.index.entries.len(),
                "embedding model changed, re-embedding stored units"
            );
            self.reembed(snapshot.index).await?
        };

        let _guard = self.mutation_lock.lock().await;
        self.index
            .import(state)
            .await
            .map_err(|e| QaError::Storage(format!("stored index is inconsistent: {}", e)))?;
        let restored = snapshot.documents.len();
        *self.documents.write().unwrap_or_else(PoisonError::into_inner) = snapshot.documents;
        info!(
            documents = restored,
            entries = self.index.len().await,
            "restored knowledge base"
        );
        Ok(())
    }

    async fn reembed(&self, state: IndexState) -> Result<IndexState> {
        let texts: Vec<String> = state.entries.iter().map(|e| e.text.clone()).collect();
        let vectors = embed(self.embedder.as_ref(), EmbedInput::Many(&texts))
            .await?
            .into_vectors();
        if vectors.len() != state.entries.len() {
            return Err(QaError::Embedding("re-embedding returned too few vectors".into()));
        }
        let entries = state
            .entries
            .into_iter()
            .zip(vectors)
            .map(|(entry, vector)| IndexEntry { vector, ..entry })
            .collect();
        Ok(IndexState {
            entries,
            next_id: state.next_id,
        })
    }
}
