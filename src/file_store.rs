// src/file_store.rs
//
// LocalFileStore: ObjectStore over a POSIX directory tree.
// Object paths are `/`-separated keys relative to the store root.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

use crate::constants::DEFAULT_STREAM_BUFFER_SIZE;
use crate::object_store::{
    Attribute, Attributes, FetchRequest, ObjectMeta, ObjectStat, ObjectStore, PieceStream, StoreError,
};
use crate::range::ByteRange;

/// FileSystem adapter implementing the fetch capability for local files.
///
/// Local files carry no versions: any versioned request is `NotFound`.
/// Preconditions are answered from file metadata before reading.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    piece_size: usize,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            piece_size: DEFAULT_STREAM_BUFFER_SIZE,
        }
    }

    /// Size of the pieces `fetch_whole` reads at a time (default 1 MiB)
    pub fn with_piece_size(mut self, piece_size: usize) -> Self {
        self.piece_size = piece_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an object path onto the filesystem, refusing to escape the root
    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative.components().any(|c| !matches!(c, Component::Normal(_) | Component::CurDir)) {
            return Err(StoreError::Other(anyhow::anyhow!("invalid object path: {path}")));
        }
        Ok(self.root.join(relative))
    }

    async fn stat_path(&self, path: &str, version: Option<&str>) -> Result<(PathBuf, ObjectStat), StoreError> {
        if let Some(version) = version {
            debug!("LocalFileStore has no versions, {} @ {} not found", path, version);
            return Err(StoreError::NotFound);
        }

        let full = self.resolve(path)?;
        let metadata = fs::metadata(&full).await?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound);
        }

        let modified = metadata.modified().map_err(|e| StoreError::Other(e.into()))?;
        let last_modified: DateTime<Utc> = modified.into();
        let e_tag = format!(
            "\"{:x}-{:x}\"",
            last_modified.timestamp_nanos_opt().unwrap_or_default(),
            metadata.len()
        );

        let mut attributes = Attributes::new();
        if let Some(content_type) = guess_content_type(&full) {
            attributes.insert(Attribute::ContentType, content_type.to_string());
        }

        let meta = ObjectMeta {
            path: path.to_string(),
            size: metadata.len(),
            last_modified,
            e_tag: Some(e_tag),
            version: None,
        };
        Ok((full, ObjectStat { meta, attributes }))
    }

    /// Stat and answer the request's preconditions
    async fn checked_path(&self, request: &FetchRequest) -> Result<(PathBuf, ObjectStat), StoreError> {
        let (full, stat) = self.stat_path(&request.path, request.version.as_deref()).await?;
        request
            .preconditions
            .evaluate(&stat.meta)
            .map_err(StoreError::ConditionFailed)?;
        Ok((full, stat))
    }
}

fn guess_content_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let content_type = match ext.as_str() {
        "json" => "application/json",
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "parquet" => "application/vnd.apache.parquet",
        "zst" => "application/zstd",
        "gz" => "application/gzip",
        "bin" | "npz" | "tfrecord" => "application/octet-stream",
        _ => return None,
    };
    Some(content_type)
}

#[async_trait]
impl ObjectStore for LocalFileStore {
    async fn stat(&self, path: &str, version: Option<&str>) -> Result<ObjectStat, StoreError> {
        Ok(self.stat_path(path, version).await?.1)
    }

    async fn fetch_range(&self, request: &FetchRequest, range: ByteRange) -> Result<Bytes, StoreError> {
        let (full, _) = self.checked_path(request).await?;
        trace!("LocalFileStore::fetch_range {} {}", full.display(), range);

        let mut file = fs::File::open(&full).await?;
        file.seek(std::io::SeekFrom::Start(range.start)).await?;

        let mut buffer = vec![0u8; range.len() as usize];
        file.read_exact(&mut buffer).await?;
        Ok(Bytes::from(buffer))
    }

    async fn fetch_whole(&self, request: &FetchRequest) -> Result<PieceStream, StoreError> {
        let (full, stat) = self.checked_path(request).await?;
        debug!(
            "LocalFileStore::fetch_whole {} ({} bytes, {} byte pieces)",
            full.display(), stat.meta.size, self.piece_size
        );

        let file = fs::File::open(&full).await?;
        Ok(ReaderStream::with_capacity(file, self.piece_size)
            .map(|piece| piece.map_err(StoreError::from))
            .boxed())
    }
}
