// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache entry data structure.
//!
//! A [`CacheEntry`] is the unit every [`CacheStore`](crate::storage::traits::CacheStore)
//! holds: the payload, the signature it was stored under, and the access
//! history the eviction policy scores.
//!
//! # Example
//!
//! ```
//! use recall_engine::CacheEntry;
//! use recall_engine::signature::ContentSignature;
//! use std::sync::Arc;
//!
//! let sig = Arc::new(ContentSignature::from_parts("capital of France", vec![1.0, 0.0]));
//! let entry = CacheEntry::new(sig.fingerprint.clone(), sig, b"Paris".to_vec(), 0.02, 3600);
//!
//! assert_eq!(entry.payload, b"Paris");
//! assert_eq!(entry.access_count, 0);
//! assert!(!entry.is_expired(entry.created_at));
//! assert!(entry.size_bytes() > 5);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::signature::ContentSignature;

/// Importance assumed when the caller supplies none.
pub const DEFAULT_IMPORTANCE: f64 = 0.5;

/// Current wall-clock time in epoch millis.
#[must_use]
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Unique key within one logical cache (the signature fingerprint by default)
    pub key: String,
    pub signature: Arc<ContentSignature>,
    /// Opaque result bytes
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
    /// Creation timestamp (epoch millis)
    pub created_at: u64,
    /// Timestamp of last access (epoch millis)
    pub last_accessed_at: u64,
    /// Number of cache hits served by this entry
    pub access_count: u64,
    /// Cost of the computation this entry saves on each hit
    pub cost_saved: f64,
    /// Seconds until expiry, 0 = never
    pub ttl_seconds: u64,
    /// Caller-supplied eviction weight in [0, 1]
    #[serde(default = "default_importance")]
    pub importance: f64,
}

fn default_importance() -> f64 {
    DEFAULT_IMPORTANCE
}

impl CacheEntry {
    pub fn new(
        key: String,
        signature: Arc<ContentSignature>,
        payload: Vec<u8>,
        cost_saved: f64,
        ttl_seconds: u64,
    ) -> Self {
        let now = now_millis();
        Self {
            key,
            signature,
            payload,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            cost_saved,
            ttl_seconds,
            importance: DEFAULT_IMPORTANCE,
        }
    }

    #[must_use]
    pub fn with_importance(mut self, importance: f64) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    /// Whether the entry is past `created_at + ttl_seconds` at `now_ms`.
    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.ttl_seconds > 0
            && now_ms > self.created_at.saturating_add(self.ttl_seconds.saturating_mul(1000))
    }

    /// Seconds of TTL left at `now_ms`, `None` for entries that never expire.
    #[must_use]
    pub fn remaining_ttl_secs(&self, now_ms: u64) -> Option<u64> {
        if self.ttl_seconds == 0 {
            return None;
        }
        let expires_at = self.created_at.saturating_add(self.ttl_seconds.saturating_mul(1000));
        Some(expires_at.saturating_sub(now_ms).div_ceil(1000))
    }

    pub fn record_access(&mut self, now_ms: u64) {
        self.last_accessed_at = now_ms;
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Estimated memory footprint: struct overhead + key + payload + signature.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        std::mem::size_of::<Self>()
            + std::mem::size_of::<ContentSignature>()
            + self.key.len()
            + self.payload.len()
            + self.signature.size_bytes()
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(ttl: u64) -> CacheEntry {
        let sig = Arc::new(ContentSignature::from_parts("hello world", vec![0.5, 0.5]));
        CacheEntry::new("k".into(), sig, vec![1, 2, 3], 1.5, ttl)
    }

    #[test]
    fn test_ttl_zero_never_expires() {
        let e = entry(0);
        assert!(!e.is_expired(u64::MAX));
        assert_eq!(e.remaining_ttl_secs(e.created_at), None);
    }

    #[test]
    fn test_expiry_boundary() {
        let e = entry(10);
        let deadline = e.created_at + 10_000;
        assert!(!e.is_expired(deadline));
        assert!(e.is_expired(deadline + 1));
        assert_eq!(e.remaining_ttl_secs(e.created_at), Some(10));
        assert_eq!(e.remaining_ttl_secs(deadline + 5), Some(0));
    }

    #[test]
    fn test_record_access() {
        let mut e = entry(0);
        e.record_access(e.created_at + 42);
        e.record_access(e.created_at + 50);
        assert_eq!(e.access_count, 2);
        assert_eq!(e.last_accessed_at, e.created_at + 50);
    }

    #[test]
    fn test_importance_is_clamped() {
        assert_eq!(entry(0).importance, DEFAULT_IMPORTANCE);
        assert_eq!(entry(0).with_importance(3.0).importance, 1.0);
    }

    #[test]
    fn test_size_grows_with_payload() {
        let small = entry(0);
        let mut large = entry(0);
        large.payload = vec![0u8; 10_000];
        assert!(large.size_bytes() >= small.size_bytes() + 9_997);
    }

    #[test]
    fn test_json_payload_is_hex() {
        let e = entry(60);
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["payload"], "010203");

        let back: CacheEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.payload, vec![1, 2, 3]);
        assert_eq!(back.signature.fingerprint, e.signature.fingerprint);
    }

    #[test]
    fn test_missing_importance_defaults() {
        let mut json = serde_json::to_value(entry(0)).unwrap();
        json.as_object_mut().unwrap().remove("importance");
        let back: CacheEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back.importance, DEFAULT_IMPORTANCE);
    }
}
