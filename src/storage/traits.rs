// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use thiserror::Error;

use crate::cache_entry::CacheEntry;
use crate::signature::ContentSignature;
use crate::similarity::SimilarityScorer;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Item not found")]
    NotFound,
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Malformed entry '{key}': {reason}")]
    Serialization { key: String, reason: String },
}

impl StorageError {
    /// The backend itself could not be reached. Other errors concern a
    /// single entry and leave the backend usable.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

/// Best entry found by a similarity scan.
#[derive(Debug, Clone)]
pub struct SimilarMatch {
    pub key: String,
    pub score: f64,
    pub entry: CacheEntry,
}

/// Backend-agnostic key/value + nearest-neighbour store.
///
/// Implementations must treat an entry as absent once
/// `now > created_at + ttl_seconds`; lazy expiry on read is enough.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), StorageError>;
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Number of live entries (may lag lazy expiry on durable backends).
    async fn size(&self) -> Result<usize, StorageError>;

    /// Every live entry. Used for similarity scans and budget warmup.
    async fn entries(&self) -> Result<Vec<CacheEntry>, StorageError>;

    async fn healthy(&self) -> bool;

    /// Short backend label for logs and metrics.
    fn backend_name(&self) -> &'static str;

    /// Highest-scoring entry at or above `threshold`.
    ///
    /// Default implementation is a full scan over [`entries`](Self::entries).
    /// Backends with a vector index may override it, keeping the same contract.
    async fn find_similar(
        &self,
        signature: &ContentSignature,
        threshold: f64,
        scorer: &SimilarityScorer,
    ) -> Result<Option<SimilarMatch>, StorageError> {
        let entries = self.entries().await?;
        Ok(best_match(entries, signature, threshold, scorer))
    }

    /// Push buffered state to durable storage before shutdown.
    async fn flush(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Pick the highest composite score at or above `threshold`.
/// Equal scores resolve to the lexicographically smallest key.
pub fn best_match<I>(
    entries: I,
    signature: &ContentSignature,
    threshold: f64,
    scorer: &SimilarityScorer,
) -> Option<SimilarMatch>
where
    I: IntoIterator<Item = CacheEntry>,
{
    let mut best: Option<SimilarMatch> = None;
    for entry in entries {
        let score = scorer.score(signature, &entry.signature).composite;
        if score < threshold {
            continue;
        }
        let better = match &best {
            None => true,
            Some(b) => score > b.score || (score == b.score && entry.key < b.key),
        };
        if better {
            best = Some(SimilarMatch {
                key: entry.key.clone(),
                score,
                entry,
            });
        }
    }
    best
}
