//! SQLite-backed [`IndexStorage`].
//!
//! Saves the whole knowledge base as one snapshot: every save replaces the
//! `documents`, `entries`, and `index_meta` tables inside a single
//! transaction, so a crash mid-save leaves the previous snapshot intact.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use docqa_core::embedding::{blob_to_vec, vec_to_blob};
use docqa_core::index::IndexState;
use docqa_core::models::{Document, EntryId, EntryMetadata, IndexEntry};
use docqa_core::storage::{IndexSnapshot, IndexStorage};
use docqa_core::QaError;

use crate::{db, migrate};

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the database at `path`, creating the schema if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    async fn load_snapshot(&self) -> Result<Option<IndexSnapshot>> {
        let meta_rows = sqlx::query("SELECT key, value FROM index_meta")
            .fetch_all(&self.pool)
            .await?;
        let mut model = None;
        let mut dims = 0usize;
        let mut next_id = 0u64;
        for row in meta_rows {
            let key: String = row.try_get("key")?;
            let value: String = row.try_get("value")?;
            match key.as_str() {
                "model" => model = Some(value),
                "dims" => dims = value.parse().context("index_meta.dims is not a number")?,
                "next_id" => next_id = value.parse().context("index_meta.next_id is not a number")?,
                _ => {}
            }
        }
        let Some(model) = model else {
            return Ok(None);
        };

        let documents = sqlx::query("SELECT id, text, ingested_at FROM documents ORDER BY seq")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| -> Result<Document> {
                let millis: i64 = row.try_get("ingested_at")?;
                Ok(Document {
                    id: row.try_get("id")?,
                    text: row.try_get("text")?,
                    ingested_at: DateTime::<Utc>::from_timestamp_millis(millis)
                        .unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let entries = sqlx::query("SELECT id, text, source, position, vector FROM entries ORDER BY id")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| -> Result<IndexEntry> {
                let id: i64 = row.try_get("id")?;
                let position: i64 = row.try_get("position")?;
                let blob: Vec<u8> = row.try_get("vector")?;
                Ok(IndexEntry {
                    id: EntryId(id as u64),
                    text: row.try_get("text")?,
                    vector: blob_to_vec(&blob),
                    metadata: EntryMetadata {
                        source: row.try_get("source")?,
                        position: position as usize,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(IndexSnapshot {
            model,
            dims,
            documents,
            index: IndexState { entries, next_id },
        }))
    }

    async fn save_snapshot(&self, snapshot: &IndexSnapshot) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM entries").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM documents").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM index_meta").execute(&mut *tx).await?;

        for doc in &snapshot.documents {
            sqlx::query("INSERT INTO documents (id, text, ingested_at) VALUES (?, ?, ?)")
                .bind(&doc.id)
                .bind(&doc.text)
                .bind(doc.ingested_at.timestamp_millis())
                .execute(&mut *tx)
                .await?;
        }

        for entry in &snapshot.index.entries {
            sqlx::query(
                "INSERT INTO entries (id, text, source, position, vector) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(entry.id.0 as i64)
            .bind(&entry.text)
            .bind(&entry.metadata.source)
            .bind(entry.metadata.position as i64)
            .bind(vec_to_blob(&entry.vector))
            .execute(&mut *tx)
            .await?;
        }

        for (key, value) in [
            ("model", snapshot.model.clone()),
            ("dims", snapshot.dims.to_string()),
            ("next_id", snapshot.index.next_id.to_string()),
        ] {
            sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
                .bind(key)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl IndexStorage for SqliteStorage {
    async fn load(&self) -> docqa_core::Result<Option<IndexSnapshot>> {
        self.load_snapshot()
            .await
            .map_err(|e| QaError::Storage(format!("{:#}", e)))
    }

    async fn save(&self, snapshot: &IndexSnapshot) -> docqa_core::Result<()> {
        self.save_snapshot(snapshot)
            .await
            .map_err(|e| QaError::Storage(format!("{:#}", e)))
    }
}
