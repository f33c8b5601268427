// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis storage backend.
//!
//! Each entry is one JSON string under `{prefix}{key}`, written with
//! `SET ... EX` so Redis owns expiry. A companion set `{prefix}__keys`
//! indexes the live keys for similarity scans:
//!
//! ```text
//! recall:results:3f2a...   → {"key":"3f2a...","signature":{...},"payload":"5061726973",...}
//! recall:results:__keys    → SET { "3f2a...", "9bc1...", ... }
//! ```
//!
//! Index members whose entry has expired are pruned lazily the next time a
//! read or scan misses them. Values that no longer decode are deleted the
//! same way, with a warning, and read as absent.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{cmd, pipe, AsyncCommands, Client};
use tracing::{debug, warn};

use super::traits::{CacheStore, StorageError};
use crate::cache_entry::{now_millis, CacheEntry};
use crate::resilience::retry::{retry, RetryConfig};

/// Keys fetched per `MGET` during a scan.
const SCAN_BATCH: usize = 128;

pub struct RedisStore {
    connection: ConnectionManager,
    /// Namespace for this logical cache, e.g. "recall:results:"
    prefix: String,
}

impl RedisStore {
    /// Connect to Redis, retrying with backoff before giving up.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use recall_engine::storage::redis::RedisStore;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// // Keys will be "myapp:results:<fingerprint>"
    /// let store = RedisStore::connect("redis://localhost", "myapp:results:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(connection_string: &str, prefix: &str) -> Result<Self, StorageError> {
        let connection = Self::open(connection_string).await?;
        Ok(Self::with_connection(connection, prefix))
    }

    /// Open a shared connection manager. One connection serves every
    /// logical cache; each gets its own [`RedisStore`] via [`with_connection`](Self::with_connection).
    pub async fn open(connection_string: &str) -> Result<ConnectionManager, StorageError> {
        let client = Client::open(connection_string)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        retry("redis_connect", &RetryConfig::connect(), || async {
            ConnectionManager::new(client.clone()).await
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }

    #[must_use]
    pub fn with_connection(connection: ConnectionManager, prefix: &str) -> Self {
        Self {
            connection,
            prefix: prefix.to_string(),
        }
    }

    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    #[inline]
    fn index_key(&self) -> String {
        format!("{}__keys", self.prefix)
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn decode(key: &str, raw: &[u8]) -> Result<CacheEntry, StorageError> {
        serde_json::from_slice(raw).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Decode `raw`, or delete the undecodable value and report it absent.
    async fn decode_or_drop(&self, key: &str, raw: &[u8]) -> Result<Option<CacheEntry>, StorageError> {
        match Self::decode(key, raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(prefix = %self.prefix, key, error = %e, "Dropping malformed entry");
                self.drop_malformed(vec![key.to_string()]).await?;
                Ok(None)
            }
        }
    }

    /// Delete values that fail to decode, along with their index members.
    async fn drop_malformed(&self, keys: Vec<String>) -> Result<(), StorageError> {
        if keys.is_empty() {
            return Ok(());
        }
        let conn = self.connection.clone();
        let prefixed: Vec<String> = keys.iter().map(|k| self.prefixed_key(k)).collect();
        let index = self.index_key();

        retry("redis_drop_malformed", &RetryConfig::operation(), || {
            let mut conn = conn.clone();
            let prefixed = prefixed.clone();
            let index = index.clone();
            let keys = keys.clone();
            async move {
                let mut pipeline = pipe();
                pipeline.atomic().del(&prefixed).ignore().srem(&index, keys).ignore();
                let _: () = pipeline.query_async(&mut conn).await?;
                Ok(())
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }

    /// Remove index members whose entries are gone.
    async fn prune_index(&self, stale: Vec<String>) -> Result<(), StorageError> {
        if stale.is_empty() {
            return Ok(());
        }
        debug!(prefix = %self.prefix, count = stale.len(), "Pruning expired keys from index");
        let conn = self.connection.clone();
        let index = self.index_key();

        retry("redis_srem", &RetryConfig::operation(), || {
            let mut conn = conn.clone();
            let index = index.clone();
            let stale = stale.clone();
            async move {
                let _: () = conn.srem(&index, &stale).await?;
                Ok(())
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }

    async fn members(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.connection.clone();
        let index = self.index_key();

        retry("redis_smembers", &RetryConfig::operation(), || {
            let mut conn = conn.clone();
            let index = index.clone();
            async move {
                let keys: Vec<String> = cmd("SMEMBERS").arg(&index).query_async(&mut conn).await?;
                Ok(keys)
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), StorageError> {
        let ttl = match entry.remaining_ttl_secs(now_millis()) {
            // Already past its TTL: nothing worth storing
            Some(0) => return Ok(()),
            other => other,
        };
        let data = serde_json::to_vec(entry).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let conn = self.connection.clone();
        let prefixed = self.prefixed_key(key);
        let index = self.index_key();

        retry("redis_set", &RetryConfig::operation(), || {
            let mut conn = conn.clone();
            let prefixed = prefixed.clone();
            let index = index.clone();
            let data = data.clone();
            let member = key.to_string();
            async move {
                let mut pipeline = pipe();
                pipeline.atomic();
                match ttl {
                    Some(secs) => pipeline.set_ex(&prefixed, data, secs).ignore(),
                    None => pipeline.set(&prefixed, data).ignore(),
                };
                pipeline.sadd(&index, member).ignore();
                let _: () = pipeline.query_async(&mut conn).await?;
                Ok(())
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, StorageError> {
        let conn = self.connection.clone();
        let prefixed = self.prefixed_key(key);

        let data: Option<Vec<u8>> = retry("redis_get", &RetryConfig::operation(), || {
            let mut conn = conn.clone();
            let prefixed = prefixed.clone();
            async move {
                let data: Option<Vec<u8>> = conn.get(&prefixed).await?;
                Ok(data)
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

        match data {
            Some(bytes) => self.decode_or_drop(key, &bytes).await,
            None => {
                self.prune_index(vec![key.to_string()]).await?;
                Ok(None)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let conn = self.connection.clone();
        let prefixed = self.prefixed_key(key);
        let index = self.index_key();

        retry("redis_delete", &RetryConfig::operation(), || {
            let mut conn = conn.clone();
            let prefixed = prefixed.clone();
            let index = index.clone();
            let member = key.to_string();
            async move {
                let mut pipeline = pipe();
                pipeline.atomic().del(&prefixed).ignore().srem(&index, member).ignore();
                let _: () = pipeline.query_async(&mut conn).await?;
                Ok(())
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }

    async fn size(&self) -> Result<usize, StorageError> {
        let conn = self.connection.clone();
        let index = self.index_key();

        retry("redis_scard", &RetryConfig::operation(), || {
            let mut conn = conn.clone();
            let index = index.clone();
            async move {
                let n: usize = conn.scard(&index).await?;
                Ok(n)
            }
        })
        .await
        .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))
    }

    async fn entries(&self) -> Result<Vec<CacheEntry>, StorageError> {
        let members = self.members().await?;
        let mut live = Vec::with_capacity(members.len());
        let mut stale = Vec::new();
        let mut malformed = Vec::new();

        for chunk in members.chunks(SCAN_BATCH) {
            let conn = self.connection.clone();
            let keys: Vec<String> = chunk.iter().map(|k| self.prefixed_key(k)).collect();

            let values: Vec<Option<Vec<u8>>> = retry("redis_mget", &RetryConfig::operation(), || {
                let mut conn = conn.clone();
                let keys = keys.clone();
                async move {
                    let values: Vec<Option<Vec<u8>>> =
                        cmd("MGET").arg(&keys).query_async(&mut conn).await?;
                    Ok(values)
                }
            })
            .await
            .map_err(|e: redis::RedisError| StorageError::Backend(e.to_string()))?;

            for (member, value) in chunk.iter().zip(values) {
                match value {
                    Some(bytes) => match Self::decode(member, &bytes) {
                        Ok(entry) => live.push(entry),
                        Err(e) => {
                            warn!(prefix = %self.prefix, key = %member, error = %e, "Skipping malformed entry");
                            malformed.push(member.clone());
                        }
                    },
                    None => stale.push(member.clone()),
                }
            }
        }

        self.prune_index(stale).await?;
        self.drop_malformed(malformed).await?;
        Ok(live)
    }

    async fn healthy(&self) -> bool {
        let mut conn = self.connection.clone();
        let pong: Result<String, _> = cmd("PING").query_async(&mut conn).await;
        matches!(pong.as_deref(), Ok("PONG"))
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
