// src/blocking.rs
//
// Synchronous wrappers around Fetcher for callers without an async runtime.
// Each wrapper owns (a share of) a tokio runtime and blocks on it.
//
// Must not be called from inside an async context: tokio panics when a
// runtime is blocked on from one of its own worker threads.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use tokio::runtime::Runtime;

use crate::chunked_stream::ChunkedStream;
use crate::error::Result;
use crate::fetcher::Fetcher;
use crate::get_result::GetResult;
use crate::object_store::{Attributes, ObjectMeta, ObjectStat};
use crate::options::GetOptions;
use crate::range::ByteRange;

/// Blocking facade over a [`Fetcher`].
#[derive(Clone)]
pub struct BlockingFetcher {
    inner: Fetcher,
    runtime: Arc<Runtime>,
}

impl BlockingFetcher {
    /// Wrap `inner` with a dedicated multi-threaded runtime.
    pub fn new(inner: Fetcher) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("objfetch-blocking")
            .build()?;
        Ok(Self::with_runtime(inner, Arc::new(runtime)))
    }

    /// Wrap `inner` on a runtime the caller already owns.
    pub fn with_runtime(inner: Fetcher, runtime: Arc<Runtime>) -> Self {
        Self { inner, runtime }
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.inner
    }

    pub fn stat(&self, path: &str, version: Option<&str>) -> Result<ObjectStat> {
        self.runtime.block_on(self.inner.stat(path, version))
    }

    pub fn get(&self, path: &str, options: GetOptions) -> Result<BlockingGetResult> {
        let inner = self.runtime.block_on(self.inner.get(path, options))?;
        Ok(BlockingGetResult {
            inner,
            runtime: Arc::clone(&self.runtime),
            default_chunk_size: self.inner.min_chunk_size(),
        })
    }

    pub fn get_range(&self, path: &str, offset: u64, length: u64) -> Result<Bytes> {
        self.runtime.block_on(self.inner.get_range(path, offset, length))
    }

    pub fn get_ranges(&self, path: &str, offsets: &[u64], lengths: &[u64]) -> Result<Vec<Bytes>> {
        self.runtime.block_on(self.inner.get_ranges(path, offsets, lengths))
    }
}

impl std::fmt::Debug for BlockingFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingFetcher").field("inner", &self.inner).finish()
    }
}

/// Blocking counterpart of [`GetResult`]; same draining rules.
#[derive(Debug)]
pub struct BlockingGetResult {
    inner: GetResult,
    runtime: Arc<Runtime>,
    default_chunk_size: usize,
}

impl BlockingGetResult {
    pub fn meta(&self) -> Result<&ObjectMeta> {
        self.inner.meta()
    }

    pub fn range(&self) -> Result<ByteRange> {
        self.inner.range()
    }

    pub fn attributes(&self) -> Result<&Attributes> {
        self.inner.attributes()
    }

    pub fn bytes(self) -> Result<Bytes> {
        self.runtime.block_on(self.inner.bytes())
    }

    /// Chunk iterator over the body. Can be called once.
    pub fn stream(&mut self, min_chunk_size: usize) -> Result<BlockingChunkIter> {
        Ok(BlockingChunkIter {
            stream: self.inner.stream(min_chunk_size)?,
            runtime: Arc::clone(&self.runtime),
        })
    }

    /// [`stream`](Self::stream) with the fetcher's configured chunk size.
    pub fn stream_default(&mut self) -> Result<BlockingChunkIter> {
        self.stream(self.default_chunk_size)
    }
}

/// Iterator of coalesced chunks, pulling from the backend on demand.
pub struct BlockingChunkIter {
    stream: ChunkedStream,
    runtime: Arc<Runtime>,
}

impl Iterator for BlockingChunkIter {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}

impl std::fmt::Debug for BlockingChunkIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingChunkIter").field("stream", &self.stream).finish()
    }
}
