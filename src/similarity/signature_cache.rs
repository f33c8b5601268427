// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded signature cache.
//!
//! Keeps derived [`ContentSignature`]s keyed by content hash so repeated
//! inputs never recompute tokens or embeddings. When full, the oldest
//! `evict_batch` entries are dropped in one sweep instead of one per insert.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::signature::ContentSignature;

pub struct SignatureCache {
    /// content hash → signature
    entries: DashMap<String, Arc<ContentSignature>>,
    /// Insertion order, oldest first
    order: Mutex<VecDeque<String>>,
    capacity: usize,
    evict_batch: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SignatureCache {
    pub fn new(capacity: usize, evict_batch: usize) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            evict_batch: evict_batch.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get(&self, hash: &str) -> Option<Arc<ContentSignature>> {
        match self.entries.get(hash) {
            Some(sig) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(sig.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, hash: String, signature: Arc<ContentSignature>) {
        let mut order = self.order.lock();

        if self.entries.contains_key(&hash) {
            self.entries.insert(hash, signature);
            return;
        }

        if self.entries.len() >= self.capacity {
            for _ in 0..self.evict_batch {
                match order.pop_front() {
                    Some(old) => {
                        self.entries.remove(&old);
                    }
                    None => break,
                }
            }
        }

        self.entries.insert(hash.clone(), signature);
        order.push_back(hash);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses, len)
    #[must_use]
    pub fn stats(&self) -> (u64, u64, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.entries.len(),
        )
    }

    pub fn clear(&self) {
        let mut order = self.order.lock();
        self.entries.clear();
        order.clear();
    }
}

impl Default for SignatureCache {
    fn default() -> Self {
        Self::new(1000, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(text: &str) -> Arc<ContentSignature> {
        Arc::new(ContentSignature::from_parts(text, vec![1.0]))
    }

    #[test]
    fn test_hit_and_miss() {
        let cache = SignatureCache::default();
        cache.insert("h1".into(), sig("one"));

        assert!(cache.get("h1").is_some());
        assert!(cache.get("h2").is_none());
        assert_eq!(cache.stats(), (1, 1, 1));
    }

    #[test]
    fn test_overflow_evicts_oldest_batch() {
        let cache = SignatureCache::new(1000, 100);
        for i in 0..1000 {
            cache.insert(format!("h{}", i), sig(&format!("text {}", i)));
        }
        assert_eq!(cache.len(), 1000);

        // 1001st insert drops the 100 oldest
        cache.insert("h1000".into(), sig("text 1000"));
        assert_eq!(cache.len(), 901);
        assert!(cache.get("h0").is_none());
        assert!(cache.get("h99").is_none());
        assert!(cache.get("h100").is_some());
        assert!(cache.get("h1000").is_some());
    }

    #[test]
    fn test_reinsert_does_not_duplicate_order() {
        let cache = SignatureCache::new(2, 1);
        cache.insert("a".into(), sig("a"));
        cache.insert("a".into(), sig("a"));
        cache.insert("b".into(), sig("b"));
        assert_eq!(cache.len(), 2);

        cache.insert("c".into(), sig("c"));
        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn test_clear() {
        let cache = SignatureCache::new(4, 1);
        cache.insert("a".into(), sig("a"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
