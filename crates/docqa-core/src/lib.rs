//! # docqa core
//!
//! Runtime-free retrieval logic for docqa: data models, text normalization,
//! the embedding trait, the vector index, answer selection, and the engine
//! facade that ties them together.
//!
//! This crate contains no HTTP clients, database drivers, or filesystem I/O.
//! Concrete embedding backends, answer composers, and durable storage live in
//! the `docqa` application crate and are injected through the traits defined
//! here.
//!
//! ```text
//!  text ─▶ normalize ─▶ units ─▶ Embedder ─▶ vectors ─▶ VectorIndex
//!                                                          │
//!  question ─▶ Embedder ─▶ query vector ─▶ search ─────────┘
//!                                             │
//!                                             ▼
//!                                  Selector ─▶ (Composer) ─▶ AnswerRecord
//! ```

pub mod compose;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod history;
pub mod index;
pub mod models;
pub mod normalize;
pub mod select;
pub mod storage;

pub use engine::{QaEngine, QaEngineBuilder, QueryOptions};
pub use error::{QaError, Result};
pub use models::{AnswerRecord, QueryResponse, SourceData};
