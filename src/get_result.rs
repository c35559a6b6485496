// src/get_result.rs
//
// Result of a single `get`: metadata, effective range, attributes and a body
// that is consumed exactly once, either materialized or streamed.

use bytes::Bytes;
use futures::stream::BoxStream;

use crate::chunked_stream::ChunkedStream;
use crate::constants::DEFAULT_MIN_CHUNK_SIZE;
use crate::error::{FetchError, Result};
use crate::object_store::{Attributes, ObjectMeta};
use crate::range::ByteRange;

/// Body of a [`GetResult`].
pub(crate) enum Body {
    /// Not yet pulled from the backend.
    Stream(BoxStream<'static, Result<Bytes>>),
    /// Already in memory (range reads, `head`).
    Buffer(Bytes),
    /// Handed out; the result is draining.
    Drained,
}

/// Outcome of a successful `get`.
///
/// `meta`, `range` and `attributes` are only available until the body is
/// consumed. Once [`stream`](Self::stream) hands out the body the result is
/// draining and those accessors return `InvalidState`. [`bytes`](Self::bytes)
/// consumes the result outright.
pub struct GetResult {
    meta: ObjectMeta,
    range: ByteRange,
    attributes: Attributes,
    body: Body,
}

impl GetResult {
    pub(crate) fn new(meta: ObjectMeta, range: ByteRange, attributes: Attributes, body: Body) -> Self {
        Self { meta, range, attributes, body }
    }

    pub fn is_draining(&self) -> bool {
        matches!(self.body, Body::Drained)
    }

    fn ensure_readable(&self, what: &str) -> Result<()> {
        if self.is_draining() {
            return Err(FetchError::invalid_state(format!(
                "{what} accessed after the body started draining"
            )));
        }
        Ok(())
    }

    pub fn meta(&self) -> Result<&ObjectMeta> {
        self.ensure_readable("meta")?;
        Ok(&self.meta)
    }

    /// Byte range the body covers.
    pub fn range(&self) -> Result<ByteRange> {
        self.ensure_readable("range")?;
        Ok(self.range)
    }

    pub fn attributes(&self) -> Result<&Attributes> {
        self.ensure_readable("attributes")?;
        Ok(&self.attributes)
    }

    /// Hand out the body as a chunked stream. Can be called once.
    pub fn stream(&mut self, min_chunk_size: usize) -> Result<ChunkedStream> {
        match std::mem::replace(&mut self.body, Body::Drained) {
            Body::Stream(inner) => Ok(ChunkedStream::new(inner, min_chunk_size)),
            Body::Buffer(bytes) => Ok(ChunkedStream::from_bytes(bytes, min_chunk_size)),
            Body::Drained => Err(FetchError::invalid_state("body stream already consumed")),
        }
    }

    /// [`stream`](Self::stream) with the default 10 MiB minimum chunk size.
    pub fn stream_default(&mut self) -> Result<ChunkedStream> {
        self.stream(DEFAULT_MIN_CHUNK_SIZE)
    }

    /// Drain the body into one contiguous buffer.
    pub async fn bytes(mut self) -> Result<Bytes> {
        match std::mem::replace(&mut self.body, Body::Drained) {
            Body::Buffer(bytes) => Ok(bytes),
            Body::Stream(inner) => ChunkedStream::new(inner, usize::MAX).collect_bytes().await,
            Body::Drained => Err(FetchError::invalid_state("body stream already consumed")),
        }
    }
}

impl std::fmt::Debug for GetResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = match self.body {
            Body::Stream(_) => "stream",
            Body::Buffer(_) => "buffer",
            Body::Drained => "drained",
        };
        f.debug_struct("GetResult")
            .field("meta", &self.meta)
            .field("range", &self.range)
            .field("body", &body)
            .finish()
    }
}
