//! TOML configuration.
//!
//! Every section is optional; a missing section or key falls back to the
//! defaults below, so an empty file is a valid configuration that embeds
//! locally and keeps the knowledge base in memory.
//!
//! ```toml
//! [normalizer]
//! mode = "sentence"          # or "chunk"
//! min_unit_chars = 15
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [embedding]
//! provider = "local"         # local | openai | ollama | hash
//! model = "all-minilm-l6-v2"
//!
//! [retrieval]
//! # k = 3
//! excerpt_chars = 300
//!
//! [composer]
//! provider = "disabled"      # disabled | openai | ollama
//!
//! [storage]
//! path = "./data/docqa.sqlite"
//!
//! [server]
//! bind = "127.0.0.1:8000"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use docqa_core::normalize::{
    Normalizer, SegmentMode, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_MIN_UNIT_CHARS,
};

/// Path used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/docqa.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub composer: ComposerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NormalizerConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_min_unit_chars")]
    pub min_unit_chars: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            min_unit_chars: DEFAULT_MIN_UNIT_CHARS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_mode() -> String {
    "sentence".to_string()
}
fn default_min_unit_chars() -> usize {
    DEFAULT_MIN_UNIT_CHARS
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl NormalizerConfig {
    pub fn to_normalizer(&self) -> Result<Normalizer> {
        let mode: SegmentMode = self
            .mode
            .parse()
            .map_err(|e: docqa_core::QaError| anyhow::anyhow!("normalizer.mode: {}", e))?;
        Ok(Normalizer {
            mode,
            min_unit_chars: self.min_unit_chars,
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Candidates per query. Unset means 1 without a composer, 3 with one.
    #[serde(default)]
    pub k: Option<usize>,
    /// Characters of source content returned over HTTP and `--json`.
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: None,
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

fn default_excerpt_chars() -> usize {
    300
}

#[derive(Debug, Deserialize, Clone)]
pub struct ComposerConfig {
    #[serde(default = "default_composer_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_composer_retries")]
    pub max_retries: u32,
    #[serde(default = "default_composer_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            provider: default_composer_provider(),
            model: None,
            url: None,
            temperature: default_temperature(),
            max_retries: default_composer_retries(),
            timeout_secs: default_composer_timeout_secs(),
        }
    }
}

impl ComposerConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_composer_provider() -> String {
    "disabled".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_composer_retries() -> u32 {
    2
}
fn default_composer_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// SQLite database file. Unset keeps the knowledge base in memory only.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.txt".to_string(),
        "**/*.md".to_string(),
        "**/*.pdf".to_string(),
        "**/*.docx".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

/// Load the config at `path`, or the built-in defaults when no path was
/// given and the default file does not exist.
pub fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                load_config(default)
            } else {
                tracing::debug!("no config file at {}, using defaults", DEFAULT_CONFIG_PATH);
                Ok(Config::default())
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Normalizer
    let normalizer = config.normalizer.to_normalizer()?;
    normalizer
        .validate()
        .map_err(|e| anyhow::anyhow!("normalizer: {}", e))?;

    // Retrieval
    if config.retrieval.k == Some(0) {
        bail!("retrieval.k must be >= 1");
    }

    // Embedding
    match config.embedding.provider.as_str() {
        "local" | "hash" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, ollama, or hash.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    // Composer
    match config.composer.provider.as_str() {
        "disabled" => {}
        "openai" | "ollama" => {
            if config.composer.model.is_none() {
                bail!(
                    "composer.model must be specified when provider is '{}'",
                    config.composer.provider
                );
            }
        }
        other => bail!(
            "Unknown composer provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(())
}
