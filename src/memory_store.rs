// src/memory_store.rs
//
// InMemoryStore: versioned ObjectStore held entirely in memory.
// Every put appends a new version; reads without a version see the latest.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::RwLock;

use crate::constants::DEFAULT_STREAM_BUFFER_SIZE;
use crate::object_store::{
    Attributes, FetchRequest, ObjectMeta, ObjectStat, ObjectStore, PieceStream, StoreError,
};
use crate::range::ByteRange;

/// Optional overrides applied by [`InMemoryStore::put_opts`].
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Entity tag to record instead of the computed CRC32 tag
    pub e_tag: Option<String>,
    pub attributes: Attributes,
    /// Modification time to record instead of now
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    meta: ObjectMeta,
    attributes: Attributes,
}

#[derive(Debug, Clone)]
pub struct InMemoryStore {
    objects: Arc<RwLock<HashMap<String, Vec<StoredObject>>>>,
    next_version: Arc<AtomicU64>,
    piece_size: usize,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            next_version: Arc::new(AtomicU64::new(1)),
            piece_size: DEFAULT_STREAM_BUFFER_SIZE,
        }
    }

    /// Size of the pieces `fetch_whole` yields (default 1 MiB)
    pub fn with_piece_size(mut self, piece_size: usize) -> Self {
        self.piece_size = piece_size.max(1);
        self
    }

    pub async fn put(&self, path: &str, data: impl Into<Bytes>) -> ObjectMeta {
        self.put_opts(path, data, PutOptions::default()).await
    }

    /// Store a new version of `path` and return its metadata.
    pub async fn put_opts(&self, path: &str, data: impl Into<Bytes>, opts: PutOptions) -> ObjectMeta {
        let data = data.into();
        let version = self.next_version.fetch_add(1, Ordering::Relaxed).to_string();
        let meta = ObjectMeta {
            path: path.to_string(),
            size: data.len() as u64,
            last_modified: opts.last_modified.unwrap_or_else(Utc::now),
            e_tag: Some(opts.e_tag.unwrap_or_else(|| format!("\"{:08x}\"", crc32fast::hash(&data)))),
            version: Some(version),
        };
        tracing::trace!("InMemoryStore::put {} v{:?} ({} bytes)", path, meta.version, meta.size);

        let mut objects = self.objects.write().await;
        objects.entry(path.to_string()).or_default().push(StoredObject {
            data,
            meta: meta.clone(),
            attributes: opts.attributes,
        });
        meta
    }

    /// Remove every version of `path`. Returns whether anything was removed.
    pub async fn delete(&self, path: &str) -> bool {
        self.objects.write().await.remove(path).is_some()
    }

    async fn lookup(&self, path: &str, version: Option<&str>) -> Result<StoredObject, StoreError> {
        let objects = self.objects.read().await;
        let versions = objects.get(path).ok_or(StoreError::NotFound)?;
        let found = match version {
            None => versions.last(),
            Some(v) => versions.iter().find(|o| o.meta.version.as_deref() == Some(v)),
        };
        found.cloned().ok_or(StoreError::NotFound)
    }

    async fn checked(&self, request: &FetchRequest) -> Result<StoredObject, StoreError> {
        let object = self.lookup(&request.path, request.version.as_deref()).await?;
        request
            .preconditions
            .evaluate(&object.meta)
            .map_err(StoreError::ConditionFailed)?;
        Ok(object)
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn stat(&self, path: &str, version: Option<&str>) -> Result<ObjectStat, StoreError> {
        let object = self.lookup(path, version).await?;
        Ok(ObjectStat { meta: object.meta, attributes: object.attributes })
    }

    async fn fetch_range(&self, request: &FetchRequest, range: ByteRange) -> Result<Bytes, StoreError> {
        let object = self.checked(request).await?;
        if range.end > object.data.len() as u64 {
            return Err(anyhow::anyhow!(
                "range {} beyond end of {} ({} bytes)", range, request.path, object.data.len()
            ).into());
        }
        Ok(object.data.slice(range.start as usize..range.end as usize))
    }

    async fn fetch_whole(&self, request: &FetchRequest) -> Result<PieceStream, StoreError> {
        let object = self.checked(request).await?;
        let piece_size = self.piece_size;
        Ok(async_stream::stream! {
            let data = object.data;
            let mut offset = 0;
            while offset < data.len() {
                let end = (offset + piece_size).min(data.len());
                yield Ok::<_, StoreError>(data.slice(offset..end));
                offset = end;
            }
        }
        .boxed())
    }
}
