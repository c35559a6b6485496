// src/fetcher.rs
//
// Async public surface: single gets (whole / ranged / conditional / head),
// single explicit ranges, and coalesced batch range reads.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::conditional::Preconditions;
use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::get_result::{Body, GetResult};
use crate::object_size_cache::ObjectSizeCache;
use crate::object_store::{FetchRequest, ObjectStat, ObjectStore};
use crate::options::GetOptions;
use crate::range::{normalize_range, ByteRange, GetRange};
use crate::range_engine::{RangeEngine, RangeFetchStats};

/// Fetch engine bound to one backend.
///
/// Cheap to clone; clones share the backend, the in-flight cap and the size
/// cache.
#[derive(Clone)]
pub struct Fetcher {
    store: Arc<dyn ObjectStore>,
    engine: RangeEngine,
    size_cache: ObjectSizeCache,
    min_chunk_size: usize,
}

impl Fetcher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self::with_config(store, FetchConfig::default())
    }

    pub fn with_config(store: Arc<dyn ObjectStore>, config: FetchConfig) -> Self {
        Self {
            store,
            engine: RangeEngine::new(config.range_engine),
            size_cache: ObjectSizeCache::new(config.size_cache_ttl),
            min_chunk_size: config.min_chunk_size,
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn engine(&self) -> &RangeEngine {
        &self.engine
    }

    pub fn size_cache(&self) -> &ObjectSizeCache {
        &self.size_cache
    }

    /// Configured default for [`GetResult::stream`].
    pub fn min_chunk_size(&self) -> usize {
        self.min_chunk_size
    }

    /// Metadata and attributes for `path`. Refreshes the size cache.
    pub async fn stat(&self, path: &str, version: Option<&str>) -> Result<ObjectStat> {
        self.stat_with(path, version, &Preconditions::default()).await
    }

    async fn stat_with(
        &self,
        path: &str,
        version: Option<&str>,
        preconditions: &Preconditions,
    ) -> Result<ObjectStat> {
        match self.store.stat(path, version).await {
            Ok(stat) => {
                self.size_cache.put(path, version, &stat.meta).await;
                Ok(stat)
            }
            Err(e) => Err(self.fail(preconditions.interpret(e, path), path, version).await),
        }
    }

    /// Any failed read makes the cached entry suspect.
    async fn fail(&self, err: FetchError, path: &str, version: Option<&str>) -> FetchError {
        self.size_cache.invalidate(path, version).await;
        err
    }

    /// Single whole / ranged / conditional / head fetch.
    ///
    /// Preconditions are answered from the stat result first and forwarded to
    /// the backend with the body request. Without a range the body stays a
    /// lazy stream; with a range it is fetched in one call. A head request
    /// never reads the body, so its range is reported but not enforced.
    pub async fn get(&self, path: &str, options: GetOptions) -> Result<GetResult> {
        options.validate()?;
        let preconditions = options.preconditions();
        let version = options.version.as_deref();

        let stat = self.stat_with(path, version, &preconditions).await?;
        preconditions
            .evaluate(&stat.meta)
            .map_err(|condition| condition.into_error(path))?;

        if options.head {
            let size = stat.meta.size;
            let range = normalize_range(options.range.as_ref(), size)
                .unwrap_or(ByteRange { start: size, end: size });
            debug!("head {} -> {} bytes, range {}", path, size, range);
            return Ok(GetResult::new(stat.meta, range, stat.attributes, Body::Buffer(Bytes::new())));
        }
        let range = normalize_range(options.range.as_ref(), stat.meta.size)?;

        // Pin the body to the version that was just stat'ed
        let request = FetchRequest::new(path)
            .with_version(options.version.clone().or_else(|| stat.meta.version.clone()))
            .with_preconditions(preconditions);

        let body = if options.range.is_some() {
            trace!("get {} range {}", path, range);
            Body::Buffer(self.fetch_one(&request, range).await?)
        } else {
            trace!("get {} whole ({} bytes)", path, stat.meta.size);
            let pieces = match self.store.fetch_whole(&request).await {
                Ok(pieces) => pieces,
                Err(e) => {
                    let err = request.preconditions.interpret(e, path);
                    return Err(self.fail(err, path, version).await);
                }
            };
            Body::Stream(
                pieces
                    .map(move |piece| piece.map_err(|e| request.preconditions.interpret(e, &request.path)))
                    .boxed(),
            )
        };

        Ok(GetResult::new(stat.meta, range, stat.attributes, body))
    }

    /// One backend range read, checked for length.
    async fn fetch_one(&self, request: &FetchRequest, range: ByteRange) -> Result<Bytes> {
        let bytes = match self.store.fetch_range(request, range).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = request.preconditions.interpret(e, &request.path);
                return Err(self.fail(err, &request.path, request.version.as_deref()).await);
            }
        };
        if bytes.len() as u64 != range.len() {
            return Err(anyhow::anyhow!(
                "short read for {} {}: got {} of {} bytes",
                request.path, range, bytes.len(), range.len()
            ).into());
        }
        Ok(bytes)
    }

    /// `length` bytes starting at `offset`. The end is clamped to the object.
    pub async fn get_range(&self, path: &str, offset: u64, length: u64) -> Result<Bytes> {
        let requested = ByteRange::from_offset_len(offset, length)?;
        let mut buffers = self
            .read_pinned(path, &[requested], |request, ranges| async move {
                Ok::<_, FetchError>(vec![self.fetch_one(&request, ranges[0]).await?])
            })
            .await?;
        buffers
            .pop()
            .ok_or_else(|| FetchError::invalid_state(format!("no buffer returned for {path}")))
    }

    /// One buffer per `(offsets[i], lengths[i])`, in input order, fetched with
    /// coalescing and bounded parallelism.
    pub async fn get_ranges(&self, path: &str, offsets: &[u64], lengths: &[u64]) -> Result<Vec<Bytes>> {
        if offsets.len() != lengths.len() {
            return Err(FetchError::invalid_state(format!(
                "offsets ({}) and lengths ({}) differ in length",
                offsets.len(),
                lengths.len()
            )));
        }
        let ranges = offsets
            .iter()
            .zip(lengths)
            .map(|(&offset, &length)| ByteRange::from_offset_len(offset, length))
            .collect::<Result<Vec<_>>>()?;

        let (buffers, _) = self.get_ranges_with_stats(path, &ranges, None).await?;
        Ok(buffers)
    }

    /// Batch range read returning statistics, with optional cancellation.
    pub async fn get_ranges_with_stats(
        &self,
        path: &str,
        ranges: &[ByteRange],
        cancel: Option<CancellationToken>,
    ) -> Result<(Vec<Bytes>, RangeFetchStats)> {
        if ranges.is_empty() {
            return Ok((Vec::new(), RangeFetchStats::empty()));
        }

        self.read_pinned(path, ranges, |request, normalized| {
            let cancel = cancel.clone();
            async move {
                let store = Arc::clone(&self.store);
                let request = Arc::new(request);
                let fetch = move |range: ByteRange| {
                    let store = Arc::clone(&store);
                    let request = Arc::clone(&request);
                    async move {
                        store
                            .fetch_range(&request, range)
                            .await
                            .map_err(|e| request.preconditions.interpret(e, &request.path))
                    }
                };
                self.engine.fetch_ranges(&normalized, fetch, cancel).await
            }
        })
        .await
    }

    /// Normalize `ranges` against what is known about `path` and hand them to
    /// `read` with a request pinned to that object.
    ///
    /// A cached entry is only trusted when every range already fits inside
    /// it; any clamp or past-the-end decision is made against a fresh stat.
    /// Reads planned from the cache carry the cached entity tag, so a replaced
    /// object fails the read instead of returning mixed content, and the batch
    /// is planned again once from a fresh stat.
    async fn read_pinned<T, F, Fut>(&self, path: &str, ranges: &[ByteRange], read: F) -> Result<T>
    where
        F: Fn(FetchRequest, Vec<ByteRange>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(known) = self.size_cache.lookup(path, None).await {
            if ranges.iter().all(|r| r.end <= known.size) {
                let normalized = normalize_all(ranges, known.size)?;
                let request = FetchRequest::new(path).with_preconditions(Preconditions {
                    if_match: known.e_tag.clone(),
                    ..Default::default()
                });
                match read(request, normalized).await {
                    Ok(out) => return Ok(out),
                    Err(err) => {
                        self.size_cache.invalidate(path, None).await;
                        if !matches!(err, FetchError::Precondition { .. }) {
                            return Err(err);
                        }
                        debug!("{} changed since its size was cached, planning again", path);
                    }
                }
            } else {
                trace!("cached size {} of {} is too small for the request, re-checking", known.size, path);
            }
        }

        let stat = self.stat(path, None).await?;
        let normalized = normalize_all(ranges, stat.meta.size)?;
        let request = FetchRequest::new(path)
            .with_version(stat.meta.version.clone())
            .with_preconditions(Preconditions {
                if_match: stat.meta.e_tag.clone(),
                ..Default::default()
            });

        match read(request, normalized).await {
            Ok(out) => Ok(out),
            Err(FetchError::Precondition { .. }) => {
                let err = anyhow::anyhow!("{path} was replaced while it was being read");
                Err(self.fail(err.into(), path, None).await)
            }
            Err(err) => Err(self.fail(err, path, None).await),
        }
    }
}

fn normalize_all(ranges: &[ByteRange], size: u64) -> Result<Vec<ByteRange>> {
    ranges.iter().map(|r| GetRange::from(*r).normalize(size)).collect()
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("engine", &self.engine)
            .field("min_chunk_size", &self.min_chunk_size)
            .finish()
    }
}
