//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! the single-or-batch request shape ([`EmbedInput`] / [`Embedded`]), a
//! deterministic [`HashingEmbedder`], and pure helpers for vector
//! serialization and similarity computation.
//!
//! Network and model-backed providers (fastembed, OpenAI, Ollama) live in
//! the `docqa` app crate.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{QaError, Result};

/// Trait for embedding providers.
///
/// One provider instance encodes both the corpus and the queries so the
/// vectors live in the same space. Implementations that load a model must
/// do so once, lazily, and report load failures as
/// [`QaError::ModelInit`] instead of returning placeholder vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per text in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Force any lazy initialization so startup can fail early.
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }
}

/// A single text or a batch of texts to embed.
#[derive(Debug, Clone, Copy)]
pub enum EmbedInput<'a> {
    One(&'a str),
    Many(&'a [String]),
}

/// Output shaped like the corresponding [`EmbedInput`].
#[derive(Debug, Clone, PartialEq)]
pub enum Embedded {
    One(Vec<f32>),
    Many(Vec<Vec<f32>>),
}

impl Embedded {
    /// Flatten into a list of vectors regardless of shape.
    pub fn into_vectors(self) -> Vec<Vec<f32>> {
        match self {
            Embedded::One(v) => vec![v],
            Embedded::Many(vs) => vs,
        }
    }
}

/// Embed one text or many through the same [`Embedder::embed_batch`] path.
///
/// The response is checked: one vector per input, each of the provider's
/// advertised dimensionality.
pub async fn embed(embedder: &dyn Embedder, input: EmbedInput<'_>) -> Result<Embedded> {
    match input {
        EmbedInput::One(text) => {
            let texts = [text.to_string()];
            let mut vectors = embed_checked(embedder, &texts).await?;
            Ok(Embedded::One(vectors.remove(0)))
        }
        EmbedInput::Many(texts) => {
            if texts.is_empty() {
                return Ok(Embedded::Many(Vec::new()));
            }
            Ok(Embedded::Many(embed_checked(embedder, texts).await?))
        }
    }
}

/// Embed a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    match embed(embedder, EmbedInput::One(text)).await? {
        Embedded::One(v) => Ok(v),
        Embedded::Many(mut vs) => vs
            .pop()
            .ok_or_else(|| QaError::Embedding("empty embedding response".into())),
    }
}

async fn embed_checked(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let vectors = embedder.embed_batch(texts).await?;
    if vectors.len() != texts.len() {
        return Err(QaError::Embedding(format!(
            "{} returned {} vectors for {} texts",
            embedder.model_name(),
            vectors.len(),
            texts.len()
        )));
    }
    let dims = embedder.dims();
    if let Some(bad) = vectors.iter().find(|v| dims > 0 && v.len() != dims) {
        return Err(QaError::DimensionMismatch {
            expected: dims,
            actual: bad.len(),
        });
    }
    Ok(vectors)
}

// ============ Hashing Embedder ============

/// Default dimensionality of the [`HashingEmbedder`].
pub const HASHING_DIMS: usize = 384;

/// Deterministic bag-of-words embedder using the hashing trick.
///
/// Each lowercase alphanumeric token is hashed (SHA-256) into one of `dims`
/// buckets; the count vector is L2-normalized. Needs no model download, so
/// it serves offline deployments and tests. Texts sharing vocabulary score
/// higher; it has no notion of synonyms.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    /// Embed one text synchronously.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut bucket = [0u8; 8];
            bucket.copy_from_slice(&digest[..8]);
            let idx = (u64::from_le_bytes(bucket) % self.dims as u64) as usize;
            v[idx] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(HASHING_DIMS)
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

// ============ Vector utilities ============

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use docqa_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, zero vectors, or vectors of different
/// lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    (dot / denom).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            4
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().skip(1).map(|_| vec![0.0; 4]).collect())
        }
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_hashing_is_deterministic_and_normalized() {
        let e = HashingEmbedder::default();
        let a = e.embed_text("Where is the fire exit?");
        let b = e.embed_text("Where is the fire exit?");
        assert_eq!(a, b);
        assert_eq!(a.len(), HASHING_DIMS);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_ignores_case_and_punctuation() {
        let e = HashingEmbedder::default();
        assert_eq!(e.embed_text("Fire EXIT!"), e.embed_text("fire exit"));
    }

    #[test]
    fn test_hashing_empty_text_is_zero_vector() {
        let v = HashingEmbedder::new(8).embed_text("  ...  ");
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_embed_shapes_follow_input() {
        let e = HashingEmbedder::new(16);
        let one = embed(&e, EmbedInput::One("hello world")).await.unwrap();
        assert!(matches!(one, Embedded::One(ref v) if v.len() == 16));

        let texts = vec!["a b".to_string(), "c d".to_string()];
        let many = embed(&e, EmbedInput::Many(&texts)).await.unwrap();
        assert_eq!(many.into_vectors().len(), 2);

        let none = embed(&e, EmbedInput::Many(&[])).await.unwrap();
        assert_eq!(none, Embedded::Many(Vec::new()));
    }

    #[tokio::test]
    async fn test_single_and_batch_share_vectors() {
        let e = HashingEmbedder::default();
        let single = embed_query(&e, "second floor").await.unwrap();
        let batch = embed(&e, EmbedInput::Many(&["second floor".to_string()]))
            .await
            .unwrap()
            .into_vectors();
        assert_eq!(batch[0], single);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_an_error() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let err = embed(&ShortEmbedder, EmbedInput::Many(&texts))
            .await
            .unwrap_err();
        assert!(matches!(err, QaError::Embedding(_)));
    }
}
