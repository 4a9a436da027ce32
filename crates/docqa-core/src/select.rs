//! Answer selection: query → top-k candidates → one attributed answer.
//!
//! # Algorithm
//!
//! 1. Empty index → sentinel record with confidence `0.0`.
//! 2. Embed the query with the same [`Embedder`] that built the index.
//! 3. Fetch the top `k` candidates (`k = 0` is treated as `1`).
//! 4. Re-sort by descending score, insertion order breaking ties. The
//!    index is expected to return sorted results already; this step makes
//!    the outcome independent of any particular index implementation.
//! 5. Candidate 0 is the attributed source; its score is the confidence.
//! 6. With a [`Composer`], all `k` passages become the context for prose.
//!    If composition fails, the best passage is the answer.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::compose::{join_context, Composer};
use crate::embedding::{embed_query, Embedder};
use crate::error::{QaError, Result};
use crate::index::{rank_candidates, VectorIndex};
use crate::models::{AnswerRecord, ScoredEntry, SourceData};

/// Default `k` when answers are taken verbatim from the best passage.
pub const DEFAULT_EXACT_K: usize = 1;
/// Default `k` when a composer writes the answer.
pub const DEFAULT_COMPOSE_K: usize = 3;

/// Executes queries against an index and picks the best-supported answer.
#[derive(Clone)]
pub struct Selector {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    composer: Option<Arc<dyn Composer>>,
}

impl Selector {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            composer: None,
        }
    }

    pub fn with_composer(mut self, composer: Arc<dyn Composer>) -> Self {
        self.composer = Some(composer);
        self
    }

    pub fn has_composer(&self) -> bool {
        self.composer.is_some()
    }

    /// The `k` used when the caller does not pick one.
    pub fn default_k(&self) -> usize {
        if self.has_composer() {
            DEFAULT_COMPOSE_K
        } else {
            DEFAULT_EXACT_K
        }
    }

    /// Answer `query` from the top `k` candidates, composing prose if a
    /// composer is configured.
    pub async fn answer(&self, query: &str, k: usize) -> Result<AnswerRecord> {
        self.answer_with(query, k, true).await
    }

    /// Like [`answer`](Selector::answer), with composition switchable per call.
    pub async fn answer_with(&self, query: &str, k: usize, compose: bool) -> Result<AnswerRecord> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QaError::InvalidInput("question must not be empty".into()));
        }

        let candidates = match self.retrieve(query, k).await {
            Ok(c) => c,
            Err(QaError::EmptyCorpus) => {
                debug!("knowledge base is empty, returning sentinel answer");
                return Ok(AnswerRecord::no_content(query));
            }
            Err(e) => return Err(e),
        };

        let best = &candidates[0];
        let composed = match (&self.composer, compose) {
            (Some(composer), true) => self.compose(composer.as_ref(), query, &candidates).await,
            _ => None,
        };

        Ok(AnswerRecord {
            query: query.to_string(),
            passage: best.entry.text.clone(),
            source: best.entry.metadata.source.clone(),
            confidence: best.score.max(0.0),
            composed,
            candidates: candidates.iter().map(SourceData::from).collect(),
        })
    }

    /// Retrieve and rank candidates. Fails with [`QaError::EmptyCorpus`]
    /// when there is nothing to search.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ScoredEntry>> {
        if self.index.is_empty().await {
            return Err(QaError::EmptyCorpus);
        }
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;
        let mut candidates = self.index.search(&query_vec, k.max(1)).await?;
        if candidates.is_empty() {
            return Err(QaError::EmptyCorpus);
        }
        rank_candidates(&mut candidates);
        debug!(
            candidates = candidates.len(),
            top_score = candidates[0].score,
            "retrieved candidates"
        );
        Ok(candidates)
    }

    async fn compose(
        &self,
        composer: &dyn Composer,
        query: &str,
        candidates: &[ScoredEntry],
    ) -> Option<String> {
        let context = join_context(candidates.iter().map(|c| c.entry.text.as_str()));
        match composer.compose(query, &context).await {
            Ok(prose) if !prose.trim().is_empty() => Some(prose.trim().to_string()),
            Ok(_) => {
                warn!(composer = composer.name(), "composer returned no text, using best passage");
                None
            }
            Err(error) => {
                warn!(composer = composer.name(), %error, "composer failed, using best passage");
                None
            }
        }
    }
}
