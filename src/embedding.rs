// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Embedding providers.
//!
//! The engine treats embedding as an opaque `text → vector` function behind
//! the [`Embedder`] trait. Two implementations ship with the crate:
//!
//! - [`HashingEmbedder`]: deterministic feature hashing, always available
//! - [`CachedEmbedder`]: wraps any provider and memoizes vectors in the
//!   `embeddings` logical cache of a [`TieredCacheManager`]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::TieredCacheManager;
use crate::config::EMBEDDINGS_CACHE;
use crate::signature::{content_hash, ContentSignature};

#[derive(Error, Debug, Clone)]
pub enum EmbeddingError {
    #[error("embedding provider '{provider}' unavailable: {reason}")]
    Unavailable { provider: String, reason: String },
    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
    fn dimensions(&self) -> usize;
    fn name(&self) -> &str;
}

/// Feature-hashing embedder.
///
/// Terms are hashed (FNV-1a) into fixed buckets and weighted by term
/// frequency, then L2 normalized. Not semantically rich, but deterministic and
/// dependency-free, which makes it the default for tests and offline use.
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn bucket(term: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf2_9ce4_8422_2325;
        for b in term.as_bytes() {
            h ^= u64::from(*b);
            h = h.wrapping_mul(0x0100_0000_01b3);
        }
        (h % dims as u64) as usize
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut tf: HashMap<String, f32> = HashMap::new();
        for term in text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|s| s.len() >= 2)
        {
            *tf.entry(term.to_lowercase()).or_default() += 1.0;
        }

        let mut vec = vec![0.0f32; self.dimensions];
        if tf.is_empty() {
            return vec;
        }
        let total: f32 = tf.values().sum();
        for (term, count) in &tf {
            // longer terms carry more signal than short function words
            let weight = 1.0 + (term.len() as f32).ln();
            vec[Self::bucket(term, self.dimensions)] += count / total * weight;
        }

        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// Memoizes another provider's vectors in the `embeddings` logical cache.
///
/// Vectors are keyed by the sha256 of the text and stored as little-endian
/// `f32` bytes, so identical text never reaches the inner provider twice
/// while the entry survives eviction.
pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    cache: Arc<TieredCacheManager>,
    name: String,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, cache: Arc<TieredCacheManager>) -> Self {
        let name = format!("cached-{}", inner.name());
        Self { inner, cache, name }
    }
}

#[async_trait]
impl Embedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let key = content_hash(text);

        if let Some(payload) = self.cache.get_exact(EMBEDDINGS_CACHE, &key).await {
            match decode_vector(&payload, self.inner.dimensions()) {
                Ok(vector) => return Ok(vector),
                Err(e) => warn!(key = %key, error = %e, "Discarding malformed cached embedding"),
            }
        }

        let vector = self.inner.embed(text).await?;
        if vector.len() != self.inner.dimensions() {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.inner.dimensions(),
                actual: vector.len(),
            });
        }

        let signature = Arc::new(ContentSignature::from_parts(text, Vec::new()));
        self.cache
            .put_exact(EMBEDDINGS_CACHE, &key, signature, encode_vector(&vector), 1.0, None)
            .await;
        debug!(key = %key, provider = %self.inner.name(), "Cached embedding");
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Serialize a vector as little-endian f32 bytes.
#[must_use]
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`encode_vector`], checking the expected dimension count.
pub fn decode_vector(bytes: &[u8], expected: usize) -> Result<Vec<f32>, EmbeddingError> {
    if bytes.len() != expected * 4 {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: bytes.len() / 4,
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
