//! The `ingest` command: load files or inline text into the knowledge base.
//!
//! Explicit file arguments are always ingested. Directories are walked
//! recursively and filtered by `[ingest].include_globs` / `exclude_globs`
//! (plus built-in excludes for `.git`, `target`, and `node_modules`),
//! matched against paths relative to the directory.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::PathBuf;
use walkdir::WalkDir;

use docqa_core::QaEngine;

use crate::app::build_engine;
use crate::config::{Config, IngestConfig};
use crate::extract::{load_document, LoadedDocument};

/// Document id used for `--text` when `--id` is not given.
pub const DEFAULT_TEXT_ID: &str = "manual";

/// Expand `paths` into the files to ingest, sorted for deterministic ordering.
pub fn collect_files(paths: &[PathBuf], config: &IngestConfig) -> Result<Vec<PathBuf>> {
    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut files = Vec::new();
    for root in paths {
        if root.is_file() {
            files.push(root.clone());
            continue;
        }
        if !root.is_dir() {
            bail!("Path does not exist: {}", root.display());
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().to_string();

            if exclude_set.is_match(&rel_str) {
                continue;
            }
            if !include_set.is_match(&rel_str) {
                continue;
            }
            found.push(path.to_path_buf());
        }
        found.sort();
        files.extend(found);
    }

    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

pub async fn run_ingest(config: &Config, paths: &[PathBuf]) -> Result<()> {
    let files = collect_files(paths, &config.ingest)?;
    if files.is_empty() {
        println!("No matching files found.");
        return Ok(());
    }

    let documents = files
        .iter()
        .map(|p| load_document(p))
        .collect::<Result<Vec<LoadedDocument>>>()?;

    let engine = build_engine(config).await?;
    let total = ingest_documents(&engine, &documents).await?;

    println!("ingested {} documents, {} units", documents.len(), total);
    print_storage_note(config, &engine);
    Ok(())
}

/// Ingest `documents` as one batch, saving the knowledge base once, and
/// print the units added per document. Returns the total.
pub async fn ingest_documents(engine: &QaEngine, documents: &[LoadedDocument]) -> Result<usize> {
    let pairs: Vec<(String, String)> = documents
        .iter()
        .map(|doc| (doc.id.clone(), doc.text.clone()))
        .collect();
    let added = engine.ingest_many(&pairs).await?;
    for (doc, n) in documents.iter().zip(&added) {
        println!("{}: {} units", doc.id, n);
    }
    Ok(added.iter().sum())
}

pub async fn run_ingest_text(config: &Config, text: &str, id: Option<&str>) -> Result<()> {
    let id = id.unwrap_or(DEFAULT_TEXT_ID);
    let engine = build_engine(config).await?;
    let added = engine.ingest(id, text).await?;
    println!("{}: {} units", id, added);
    print_storage_note(config, &engine);
    Ok(())
}

fn print_storage_note(config: &Config, engine: &QaEngine) {
    if config.storage.path.is_none() {
        eprintln!("note: storage.path is not set; the knowledge base was not saved");
    } else if !engine.is_persistent() {
        eprintln!("note: the stored knowledge base could not be read; it was left unchanged and nothing was saved");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use docqa_core::embedding::HashingEmbedder;
    use docqa_core::storage::{IndexSnapshot, IndexStorage, MemoryStorage};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingStorage {
        inner: MemoryStorage,
        saves: AtomicUsize,
    }

    #[async_trait]
    impl IndexStorage for CountingStorage {
        async fn load(&self) -> docqa_core::Result<Option<IndexSnapshot>> {
            self.inner.load().await
        }
        async fn save(&self, snapshot: &IndexSnapshot) -> docqa_core::Result<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.inner.save(snapshot).await
        }
    }

    fn touch(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "Some text that is long enough.").unwrap();
        path
    }

    #[test]
    fn test_directory_walk_applies_globs() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.md");
        touch(tmp.path(), "a.txt");
        touch(tmp.path(), "nested/c.txt");
        touch(tmp.path(), "image.png");
        touch(tmp.path(), "node_modules/pkg/readme.txt");
        touch(tmp.path(), "drafts/old.txt");

        let config = IngestConfig {
            exclude_globs: vec!["drafts/**".to_string()],
            ..Default::default()
        };
        let files = collect_files(&[tmp.path().to_path_buf()], &config).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md", "nested/c.txt"]);
    }

    #[test]
    fn test_explicit_file_bypasses_globs() {
        let tmp = TempDir::new().unwrap();
        let log = touch(tmp.path(), "notes.log");
        let files = collect_files(&[log.clone()], &IngestConfig::default()).unwrap();
        assert_eq!(files, vec![log]);
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = collect_files(&[tmp.path().join("absent")], &IngestConfig::default()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_directory_ingest_saves_once() {
        let storage = Arc::new(CountingStorage::default());
        let engine = QaEngine::builder(Arc::new(HashingEmbedder::default()))
            .storage(storage.clone())
            .build()
            .await
            .unwrap();
        let documents = vec![
            LoadedDocument {
                id: "safety.txt".into(),
                text: "The fire exit is on the second floor. Employees must wear helmets at all times."
                    .into(),
            },
            LoadedDocument {
                id: "leave.md".into(),
                text: "Annual leave requests must be submitted two weeks in advance.".into(),
            },
            LoadedDocument {
                id: "broken.pdf".into(),
                text: String::new(),
            },
        ];

        let total = ingest_documents(&engine, &documents).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(storage.saves.load(Ordering::SeqCst), 1);
        let stored = storage.load().await.unwrap().unwrap();
        assert_eq!(stored.documents.len(), 3);
        assert_eq!(stored.index.entries.len(), 3);
    }
}
