// src/object_store.rs
//
// Pluggable object-store capability consumed by the fetch engine.
// A backend only has to answer three questions: how big/what is this object
// (`stat`), give me these bytes (`fetch_range`), and give me the whole body as
// a stream (`fetch_whole`). Everything else (coalescing, concurrency, ordering,
// re-chunking, conditional outcomes) lives above this trait.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Error as AnyError};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use thiserror::Error;

use crate::conditional::{Condition, Preconditions};
use crate::range::ByteRange;

/// Immutable metadata describing one object (at one version).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub path: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub e_tag: Option<String>,
    pub version: Option<String>,
}

/// Well-known object attributes plus free-form user metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Attribute {
    ContentType,
    ContentEncoding,
    ContentDisposition,
    ContentLanguage,
    CacheControl,
    Metadata(String),
}

pub type Attributes = HashMap<Attribute, String>;

/// What `stat` returns: the metadata plus whatever attributes the backend keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStat {
    pub meta: ObjectMeta,
    pub attributes: Attributes,
}

/// Failure signals a backend may raise. Converted into `FetchError` by
/// [`Preconditions::interpret`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("object not found")]
    NotFound,

    /// The backend evaluated the preconditions itself and names the clause.
    #[error("condition {0} not satisfied")]
    ConditionFailed(Condition),

    /// Raw protocol status (e.g. 304 / 404 / 412) with no further detail.
    #[error("backend status {0}")]
    Status(u16),

    #[error(transparent)]
    Other(#[from] AnyError),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound
        } else {
            StoreError::Other(e.into())
        }
    }
}

/// Stream of backend-sized body pieces.
pub type PieceStream = BoxStream<'static, Result<Bytes, StoreError>>;

/// Everything a backend needs to address and condition a fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub path: String,
    pub version: Option<String>,
    pub preconditions: Preconditions,
}

impl FetchRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version;
        self
    }

    pub fn with_preconditions(mut self, preconditions: Preconditions) -> Self {
        self.preconditions = preconditions;
        self
    }
}

/// ObjectStore trait for pluggable storage backends.
///
/// Implementations may block on network I/O at every call; retries, signing
/// and transport concerns belong to the implementation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Metadata (HEAD-like) for `path`, optionally at `version`.
    async fn stat(&self, path: &str, version: Option<&str>) -> Result<ObjectStat, StoreError>;

    /// Exactly the bytes in `range`. The range has already been normalized
    /// against the object size.
    async fn fetch_range(&self, request: &FetchRequest, range: ByteRange) -> Result<Bytes, StoreError>;

    /// The whole object as a stream of pieces of backend-chosen size.
    async fn fetch_whole(&self, request: &FetchRequest) -> Result<PieceStream, StoreError>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn stat(&self, path: &str, version: Option<&str>) -> Result<ObjectStat, StoreError> {
        (**self).stat(path, version).await
    }

    async fn fetch_range(&self, request: &FetchRequest, range: ByteRange) -> Result<Bytes, StoreError> {
        (**self).fetch_range(request, range).await
    }

    async fn fetch_whole(&self, request: &FetchRequest) -> Result<PieceStream, StoreError> {
        (**self).fetch_whole(request).await
    }
}

/// URI schemes the crate knows how to route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    File,
    Memory,
    S3,
    Azure,
    Gcs,
    Unknown,
}

/// Best-effort scheme inference from a URI.
pub fn infer_scheme(uri: &str) -> Scheme {
    if uri.starts_with("file://") { Scheme::File }
    else if uri.starts_with("mem://") { Scheme::Memory }
    else if uri.starts_with("s3://") { Scheme::S3 }
    else if uri.starts_with("az://") || uri.contains(".blob.core.windows.net/") { Scheme::Azure }
    else if uri.starts_with("gs://") || uri.starts_with("gcs://") { Scheme::Gcs }
    else { Scheme::Unknown }
}

/// Pick a backend from a URI and return it with the object path it addresses.
///
/// - `file:///abs/path/obj.bin` -> local store rooted at `/`, path `abs/path/obj.bin`
/// - `mem://key` -> a fresh, empty in-memory store, path `key`
pub fn store_for_uri(uri: &str) -> anyhow::Result<(Arc<dyn ObjectStore>, String)> {
    match infer_scheme(uri) {
        Scheme::File => {
            let path = &uri["file://".len()..];
            let store = crate::file_store::LocalFileStore::new("/");
            Ok((Arc::new(store), path.trim_start_matches('/').to_string()))
        }
        Scheme::Memory => {
            let store = crate::memory_store::InMemoryStore::new();
            Ok((Arc::new(store), uri["mem://".len()..].to_string()))
        }
        Scheme::S3 | Scheme::Azure | Scheme::Gcs => {
            bail!("No transport is bundled for {uri}; implement ObjectStore for this backend")
        }
        Scheme::Unknown => bail!("Unable to infer backend from URI: {uri}. Supported schemes: file://, mem://"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_scheme() {
        assert_eq!(infer_scheme("file:///tmp/x"), Scheme::File);
        assert_eq!(infer_scheme("mem://x"), Scheme::Memory);
        assert_eq!(infer_scheme("s3://bucket/key"), Scheme::S3);
        assert_eq!(infer_scheme("gs://bucket/key"), Scheme::Gcs);
        assert_eq!(infer_scheme("https://acct.blob.core.windows.net/c/k"), Scheme::Azure);
        assert_eq!(infer_scheme("/tmp/x"), Scheme::Unknown);
    }

    #[test]
    fn test_store_for_uri_paths() {
        let (_, path) = store_for_uri("file:///tmp/data/obj.bin").unwrap();
        assert_eq!(path, "tmp/data/obj.bin");
        let (_, path) = store_for_uri("mem://a/b").unwrap();
        assert_eq!(path, "a/b");
        assert!(store_for_uri("s3://bucket/key").is_err());
        assert!(store_for_uri("ftp://x").is_err());
    }

    #[test]
    fn test_io_not_found_maps() {
        let e = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(StoreError::from(e), StoreError::NotFound));
        let e = std::io::Error::other("disk");
        assert!(matches!(StoreError::from(e), StoreError::Other(_)));
    }
}
