//! Core data models used throughout docqa.
//!
//! These types represent the documents, units, index entries, and answers
//! that flow through the ingestion and retrieval pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Answer text returned when the knowledge base holds no units.
pub const NO_CONTENT_ANSWER: &str = "No relevant content found.";

/// Source identifier attached to the sentinel answer.
pub const NO_CONTENT_SOURCE: &str = "N/A";

/// A document as handed to the engine: already-extracted plain text.
///
/// Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// File name or source tag.
    pub id: String,
    pub text: String,
    pub ingested_at: DateTime<Utc>,
}

/// A retrievable span of text derived from a [`Document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    /// Identifier of the owning document.
    pub document_id: String,
    /// Ordinal position among the document's retained units.
    pub position: usize,
    pub text: String,
}

/// Monotonically assigned index entry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryId(pub u64);

/// Metadata stored alongside each indexed unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Identifier of the document the unit came from.
    pub source: String,
    /// The unit's position within that document.
    pub position: usize,
}

/// An entry waiting to be appended to a vector index.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// A stored (unit, vector, metadata) triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: EntryId,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// An index entry paired with its similarity to a query.
#[derive(Debug, Clone)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    /// Cosine similarity in `[-1.0, 1.0]`.
    pub score: f32,
}

/// One candidate passage as it appears in an answer or on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceData {
    pub content: String,
    pub source: String,
    pub score: f32,
}

impl SourceData {
    /// Copy of this source with `content` cut to `max_chars` characters,
    /// followed by `...` when anything was removed.
    pub fn excerpt(&self, max_chars: usize) -> SourceData {
        let content = if self.content.chars().count() > max_chars {
            let cut: String = self.content.chars().take(max_chars).collect();
            format!("{}...", cut)
        } else {
            self.content.clone()
        };
        SourceData {
            content,
            source: self.source.clone(),
            score: self.score,
        }
    }
}

impl From<&ScoredEntry> for SourceData {
    fn from(scored: &ScoredEntry) -> Self {
        SourceData {
            content: scored.entry.text.clone(),
            source: scored.entry.metadata.source.clone(),
            score: scored.score,
        }
    }
}

/// The result of answering one question. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub query: String,
    /// Text of the best-matching unit.
    pub passage: String,
    /// Identifier of the document the passage came from.
    pub source: String,
    /// Raw cosine similarity of the winning candidate, floored at `0.0`.
    pub confidence: f32,
    /// Prose from the answer composer, when one ran successfully.
    pub composed: Option<String>,
    /// All retrieved candidates, best first.
    pub candidates: Vec<SourceData>,
}

impl AnswerRecord {
    /// The sentinel returned for an empty knowledge base.
    pub fn no_content(query: &str) -> Self {
        AnswerRecord {
            query: query.to_string(),
            passage: NO_CONTENT_ANSWER.to_string(),
            source: NO_CONTENT_SOURCE.to_string(),
            confidence: 0.0,
            composed: None,
            candidates: Vec::new(),
        }
    }

    /// The text to display: composed prose if present, otherwise the passage.
    pub fn answer_text(&self) -> &str {
        self.composed.as_deref().unwrap_or(&self.passage)
    }

    /// Whether this is the empty-corpus sentinel.
    pub fn is_empty_corpus(&self) -> bool {
        self.candidates.is_empty() && self.source == NO_CONTENT_SOURCE
    }

    /// Build the transport shape, carrying only the attributed source with
    /// its content cut to `excerpt_chars`.
    pub fn to_response(&self, excerpt_chars: usize) -> QueryResponse {
        let sources = self
            .candidates
            .first()
            .map(|top| vec![top.excerpt(excerpt_chars)])
            .unwrap_or_default();
        QueryResponse {
            answer: self.answer_text().to_string(),
            sources,
            confidence: self.confidence,
        }
    }
}

/// JSON response shape for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceData>,
    pub confidence: f32,
}

/// Counts describing the current knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub documents: usize,
    pub entries: usize,
    pub model: String,
    pub dims: usize,
}
