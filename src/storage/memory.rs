// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use super::traits::{best_match, CacheStore, SimilarMatch, StorageError};
use crate::cache_entry::{now_millis, CacheEntry};
use crate::signature::ContentSignature;
use crate::similarity::SimilarityScorer;

/// In-process store. Also the fallback every durable store degrades to.
///
/// Expiry is lazy: an expired entry is removed the first time a read or a
/// scan touches it.
pub struct InMemoryStore {
    data: DashMap<String, CacheEntry>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Get current item count, expired entries included
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }

    /// Drop every expired entry, returning how many went.
    /// Optional: reads already ignore expired entries.
    pub fn sweep_expired(&self) -> usize {
        let now = now_millis();
        let before = self.data.len();
        self.data.retain(|_, e| !e.is_expired(now));
        before.saturating_sub(self.data.len())
    }

    fn live_entries(&self) -> Vec<CacheEntry> {
        let now = now_millis();
        let mut expired = Vec::new();
        let live = self
            .data
            .iter()
            .filter_map(|r| {
                if r.value().is_expired(now) {
                    expired.push(r.key().clone());
                    None
                } else {
                    Some(r.value().clone())
                }
            })
            .collect();
        for key in expired {
            // Re-check under the shard lock: a concurrent put may have refreshed it
            self.data.remove_if(&key, |_, e| e.is_expired(now));
        }
        live
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), StorageError> {
        self.data.insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let now = now_millis();
        let found = self.data.get(key).map(|r| r.value().clone());
        match found {
            Some(entry) if entry.is_expired(now) => {
                trace!(key, "Lazily expiring entry");
                self.data.remove_if(key, |_, e| e.is_expired(now));
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.data.remove(key);
        Ok(())
    }

    async fn size(&self) -> Result<usize, StorageError> {
        let now = now_millis();
        Ok(self.data.iter().filter(|r| !r.value().is_expired(now)).count())
    }

    async fn entries(&self) -> Result<Vec<CacheEntry>, StorageError> {
        Ok(self.live_entries())
    }

    async fn healthy(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn find_similar(
        &self,
        signature: &ContentSignature,
        threshold: f64,
        scorer: &SimilarityScorer,
    ) -> Result<Option<SimilarMatch>, StorageError> {
        Ok(best_match(self.live_entries(), signature, threshold, scorer))
    }
}
