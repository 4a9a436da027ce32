//! Engine construction from configuration.

use anyhow::{Context, Result};
use std::sync::Arc;

use docqa_core::QaEngine;

use crate::compose::create_composer;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::sqlite_storage::SqliteStorage;

/// Build a [`QaEngine`] wired with the configured embedder, composer, and
/// storage. With `storage.path` set, the stored knowledge base is restored.
pub async fn build_engine(config: &Config) -> Result<QaEngine> {
    let embedder = create_embedder(&config.embedding)?;
    let mut builder = QaEngine::builder(embedder).normalizer(config.normalizer.to_normalizer()?);

    if let Some(composer) = create_composer(&config.composer)? {
        builder = builder.composer(composer);
    }
    if let Some(k) = config.retrieval.k {
        builder = builder.default_k(k);
    }
    if let Some(path) = &config.storage.path {
        let storage = SqliteStorage::open(path).await?;
        builder = builder.storage(Arc::new(storage));
    }

    builder.build().await.context("Failed to build engine")
}
