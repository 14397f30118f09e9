//! # Read-Through Cache
//!
//! A cache-aside read path shared by every usecase.
//!
//! ## Policy
//!
//! 1. The cache is populated only after a successful store read.
//! 2. Cache failures (backend errors, undecodable payloads) are logged and
//!    behave exactly like a miss. They never fail the read.
//! 3. Writes call [`ReadThroughCache::invalidate`]; nothing ever writes a
//!    freshly mutated value into the cache.
//! 4. Keys are `"<kind>:<id>"` ([`CacheKey`]).
//!
//! Staleness is bounded by the TTL (5 minutes unless configured): an entry
//! is never served after it expires.
//!
//! A read that fetched from the store before a concurrent write invalidated
//! the key does not populate the cache with what it fetched. Invalidations
//! bump a per-stripe epoch and [`ReadThroughCache::get_or_fetch`] only
//! populates if the epoch of its key's stripe did not move during the fetch.

use crate::error::{CacheError, ServiceError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// How often [`MemoryCache`] sweeps expired entries, checked on `set`.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const EPOCH_STRIPES: usize = 64;

/// Namespaced cache key, rendered as `"<kind>:<id>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(kind: &str, id: impl Display) -> Self {
        Self(format!("{kind}:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key-value store with per-entry TTL. Absence is `Ok(None)`, not an error.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    async fn set(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: Vec<u8>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    next_sweep: Option<Instant>,
}

impl Entries {
    fn purge(&mut self, now: Instant) -> usize {
        let before = self.map.len();
        self.map.retain(|_, e| e.expires_at > now);
        before - self.map.len()
    }

    fn sweep_if_due(&mut self, now: Instant) {
        if matches!(self.next_sweep, Some(at) if now < at) {
            return;
        }
        self.next_sweep = Some(now + SWEEP_INTERVAL);
        let purged = self.purge(now);
        if purged > 0 {
            debug!(purged, live = self.map.len(), "Swept expired cache entries");
        }
    }
}

/// In-process [`CacheBackend`].
///
/// Expired entries are dropped when read, and `set` sweeps the whole map at
/// most once per minute, so keys written once and never read again are
/// still freed.
///
/// Uses `tokio::time::Instant`, so tests can pause and advance the clock.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Entries>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Backend("cache lock poisoned".into()))
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.lock()
            .map(|entries| entries.map.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired entry now instead of waiting for the next sweep.
    pub fn purge_expired(&self) -> usize {
        match self.lock() {
            Ok(mut entries) => entries.purge(Instant::now()),
            Err(_) => 0,
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.lock()?;
        match entries.map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.payload.clone())),
            Some(_) => {
                entries.map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, payload: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let entry = CacheEntry {
            payload,
            expires_at: now + ttl,
        };
        let mut entries = self.lock()?;
        entries.map.insert(key.to_string(), entry);
        entries.sweep_if_due(now);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.lock()?.map.remove(key);
        Ok(())
    }
}

fn stripe(key: &CacheKey) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() % EPOCH_STRIPES as u64) as usize
}

/// Typed cache-aside wrapper over a [`CacheBackend`].
#[derive(Clone)]
pub struct ReadThroughCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
    epochs: Arc<RwLock<[u64; EPOCH_STRIPES]>>,
}

impl ReadThroughCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self {
            backend,
            ttl,
            epochs: Arc::new(RwLock::new([0; EPOCH_STRIPES])),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value for `key`, or `None` on miss, expiry, backend failure or
    /// a payload that doesn't decode as `V`.
    pub async fn get<V: DeserializeOwned>(&self, key: &CacheKey) -> Option<V> {
        let payload = match self.backend.get(key.as_str()).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(%key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(%key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_slice(&payload) {
            Ok(value) => {
                debug!(%key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(%key, error = %e, "Undecodable cache entry, treating as miss");
                None
            }
        }
    }

    /// Stores `value` under `key` for `ttl`. Failures are logged and swallowed.
    pub async fn set<V: Serialize + Sync>(&self, key: &CacheKey, value: &V, ttl: Duration) {
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%key, error = %e, "Cache encode failed");
                return;
            }
        };
        if let Err(e) = self.backend.set(key.as_str(), payload, ttl).await {
            warn!(%key, error = %e, "Cache set failed");
        }
    }

    /// Evicts `key`. A failed eviction leaves at most one TTL of staleness.
    pub async fn invalidate(&self, key: &CacheKey) {
        let mut epochs = self.epochs.write().await;
        let slot = &mut epochs[stripe(key)];
        *slot = slot.wrapping_add(1);
        match self.backend.delete(key.as_str()).await {
            Ok(()) => debug!(%key, "Cache invalidated"),
            Err(e) => warn!(%key, error = %e, ttl = ?self.ttl, "Cache invalidation failed"),
        }
    }

    /// The read path: cache first, then `fetch`, then populate on success.
    ///
    /// `fetch` errors (including not-found) are returned as-is and nothing is
    /// cached for them. If the key is invalidated while `fetch` runs, the
    /// fetched value is returned but not cached, since it may predate the
    /// write. The next read goes to the store again.
    pub async fn get_or_fetch<V, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<V, ServiceError>
    where
        V: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, ServiceError>> + Send,
    {
        if let Some(hit) = self.get(key).await {
            return Ok(hit);
        }

        let slot = stripe(key);
        let observed = self.epochs.read().await[slot];
        let value = fetch().await?;

        // Held across the set so an invalidation can't land between the check and the write.
        let epochs = self.epochs.read().await;
        if epochs[slot] == observed {
            self.set(key, &value, self.ttl).await;
        } else {
            debug!(%key, "Invalidated during fetch, not caching");
        }
        Ok(value)
    }
}
