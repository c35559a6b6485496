// src/object_size_cache.rs
//
// Short-lived memo of object sizes learned from stat calls.
//
// Range normalization needs the object size. Batch range reads against the
// same object would otherwise pay one stat round trip per call. The entity tag
// and version seen by the stat are kept alongside the size so a read planned
// from a cached entry can be pinned to the object it was planned against.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::object_store::ObjectMeta;

/// What a stat said about an object: its size and, when the backend has
/// them, the entity tag and version identifying that content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownObject {
    pub size: u64,
    pub e_tag: Option<String>,
    pub version: Option<String>,
}

impl From<u64> for KnownObject {
    fn from(size: u64) -> Self {
        Self { size, e_tag: None, version: None }
    }
}

impl From<&ObjectMeta> for KnownObject {
    fn from(meta: &ObjectMeta) -> Self {
        Self { size: meta.size, e_tag: meta.e_tag.clone(), version: meta.version.clone() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SizeKey {
    path: String,
    version: Option<String>,
}

impl SizeKey {
    fn new(path: &str, version: Option<&str>) -> Self {
        Self { path: path.to_string(), version: version.map(str::to_string) }
    }
}

#[derive(Debug, Clone)]
struct Remembered {
    known: KnownObject,
    at: Instant,
}

impl Remembered {
    fn fresh(&self, ttl: Duration) -> bool {
        self.at.elapsed() < ttl
    }
}

/// Sizes keyed by path and version, shared between clones of a `Fetcher`.
///
/// Entries older than the TTL are treated as absent. Any failed read planned
/// from an entry evicts it.
///
/// ```no_run
/// use objfetch::object_size_cache::ObjectSizeCache;
/// use std::time::Duration;
///
/// # async fn demo() {
/// let sizes = ObjectSizeCache::new(Duration::from_secs(30));
/// sizes.put("shards/0001.bin", None, 64u64 << 20).await;
/// assert_eq!(sizes.get("shards/0001.bin", None).await, Some(64 << 20));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ObjectSizeCache {
    entries: Arc<RwLock<HashMap<SizeKey, Remembered>>>,
    ttl: Duration,
}

impl ObjectSizeCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Arc::default(), ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Everything recorded for `path`/`version` within the TTL.
    pub async fn lookup(&self, path: &str, version: Option<&str>) -> Option<KnownObject> {
        let entries = self.entries.read().await;
        let hit = entries
            .get(&SizeKey::new(path, version))
            .filter(|r| r.fresh(self.ttl))
            .map(|r| r.known.clone());
        tracing::trace!(path, ?version, size = hit.as_ref().map(|k| k.size), "size lookup");
        hit
    }

    /// Size for `path`/`version` if one was recorded within the TTL.
    pub async fn get(&self, path: &str, version: Option<&str>) -> Option<u64> {
        self.lookup(path, version).await.map(|k| k.size)
    }

    pub async fn put(&self, path: &str, version: Option<&str>, known: impl Into<KnownObject>) {
        let known = known.into();
        self.entries
            .write()
            .await
            .insert(SizeKey::new(path, version), Remembered { known, at: Instant::now() });
    }

    pub async fn invalidate(&self, path: &str, version: Option<&str>) {
        if self.entries.write().await.remove(&SizeKey::new(path, version)).is_some() {
            tracing::debug!(path, ?version, "evicted cached size");
        }
    }

    /// Drops stale entries and returns how many went.
    pub async fn prune(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, r| r.fresh(self.ttl));
        let dropped = before - entries.len();
        if dropped > 0 {
            tracing::debug!(dropped, kept = entries.len(), "pruned size cache");
        }
        dropped
    }

    /// Number of stored entries, stale ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
