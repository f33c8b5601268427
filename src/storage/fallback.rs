// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Durable store with a permanent in-memory fallback.
//!
//! ```text
//!   op ──► durable? ──ok──► result
//!             │
//!            err ──► backend error? ──no──► Err (entry-level, backend kept)
//!                         │
//!                        yes ──► warn! + metric ──► degraded = true ──► memory ──► result
//! ```
//!
//! Once degraded, every later call goes straight to memory for the rest of
//! the process. Entries written to the durable store before the switch are
//! not migrated; they are simply recomputed on demand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::memory::InMemoryStore;
use super::traits::{CacheStore, SimilarMatch, StorageError};
use crate::cache_entry::CacheEntry;
use crate::metrics;
use crate::signature::ContentSignature;
use crate::similarity::SimilarityScorer;

pub struct FallbackStore {
    cache: String,
    durable: Option<Arc<dyn CacheStore>>,
    memory: InMemoryStore,
    degraded: AtomicBool,
    /// Set on the switch; cleared once the owner has dropped its
    /// bookkeeping for entries left behind in the durable store
    abandoned: AtomicBool,
}

impl FallbackStore {
    /// Wrap a durable store for the logical cache `cache`.
    pub fn new(cache: &str, durable: Arc<dyn CacheStore>) -> Self {
        Self {
            cache: cache.to_string(),
            durable: Some(durable),
            memory: InMemoryStore::new(),
            degraded: AtomicBool::new(false),
            abandoned: AtomicBool::new(false),
        }
    }

    /// Memory only, used when the durable backend never came up.
    pub fn memory_only(cache: &str) -> Self {
        Self {
            cache: cache.to_string(),
            durable: None,
            memory: InMemoryStore::new(),
            degraded: AtomicBool::new(false),
            abandoned: AtomicBool::new(false),
        }
    }

    /// Memory only because the durable backend failed to connect.
    /// Reports degraded from the start.
    pub fn unavailable(cache: &str) -> Self {
        let store = Self::memory_only(cache);
        store.degraded.store(true, Ordering::Relaxed);
        store
    }

    /// True once a durable failure forced the switch to memory.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// True exactly once after a durable failure, so the caller can forget
    /// entries that now live only in the abandoned backend.
    pub fn take_abandoned(&self) -> bool {
        self.abandoned.swap(false, Ordering::AcqRel)
    }

    /// Durable store if still in use.
    fn active(&self) -> Option<&Arc<dyn CacheStore>> {
        if self.is_degraded() {
            None
        } else {
            self.durable.as_ref()
        }
    }

    fn degrade(&self, operation: &str, error: &StorageError) {
        let backend = self.durable.as_ref().map_or("none", |d| d.backend_name());
        if !self.degraded.swap(true, Ordering::Relaxed) {
            self.abandoned.store(true, Ordering::Release);
            warn!(
                cache = %self.cache,
                backend,
                operation,
                error = %error,
                "Durable backend unavailable, switching to in-memory store"
            );
            metrics::set_backend_healthy(backend, false);
        }
        metrics::record_backend_fallback(&self.cache, operation);
    }
}

#[async_trait]
impl CacheStore for FallbackStore {
    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), StorageError> {
        if let Some(durable) = self.active() {
            match durable.put(key, entry).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_unavailable() => self.degrade("put", &e),
                Err(e) => return Err(e),
            }
        }
        self.memory.put(key, entry).await
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        if let Some(durable) = self.active() {
            match durable.get(key).await {
                Ok(found) => return Ok(found),
                Err(e) if e.is_unavailable() => self.degrade("get", &e),
                Err(e) => return Err(e),
            }
        }
        self.memory.get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if let Some(durable) = self.active() {
            match durable.delete(key).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_unavailable() => self.degrade("delete", &e),
                Err(e) => return Err(e),
            }
        }
        self.memory.delete(key).await
    }

    async fn size(&self) -> Result<usize, StorageError> {
        if let Some(durable) = self.active() {
            match durable.size().await {
                Ok(n) => return Ok(n),
                Err(e) if e.is_unavailable() => self.degrade("size", &e),
                Err(e) => return Err(e),
            }
        }
        self.memory.size().await
    }

    async fn entries(&self) -> Result<Vec<CacheEntry>, StorageError> {
        if let Some(durable) = self.active() {
            match durable.entries().await {
                Ok(all) => return Ok(all),
                Err(e) if e.is_unavailable() => self.degrade("entries", &e),
                Err(e) => return Err(e),
            }
        }
        self.memory.entries().await
    }

    async fn find_similar(
        &self,
        signature: &ContentSignature,
        threshold: f64,
        scorer: &SimilarityScorer,
    ) -> Result<Option<SimilarMatch>, StorageError> {
        if let Some(durable) = self.active() {
            match durable.find_similar(signature, threshold, scorer).await {
                Ok(found) => return Ok(found),
                Err(e) if e.is_unavailable() => self.degrade("find_similar", &e),
                Err(e) => return Err(e),
            }
        }
        self.memory.find_similar(signature, threshold, scorer).await
    }

    async fn healthy(&self) -> bool {
        // Memory always answers, so the wrapper is healthy even when degraded
        true
    }

    fn backend_name(&self) -> &'static str {
        match self.active() {
            Some(durable) => durable.backend_name(),
            None => self.memory.backend_name(),
        }
    }

    async fn flush(&self) -> Result<(), StorageError> {
        if let Some(durable) = self.active() {
            match durable.flush().await {
                Ok(()) => info!(cache = %self.cache, backend = durable.backend_name(), "Flushed durable store"),
                Err(e) if e.is_unavailable() => self.degrade("flush", &e),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
