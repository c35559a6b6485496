// src/chunked_stream.rs
//
// Re-chunking reader over a backend body stream. Backends deliver pieces of
// whatever size suits their transport; callers get chunks of at least
// `min_chunk_size` bytes (except the final one), pulled lazily.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, FusedStream, Stream, StreamExt};

use crate::error::Result;

/// Lazy, single-pass sequence of chunks.
///
/// Pieces are buffered until at least `min_chunk_size` bytes are held, then
/// emitted as one chunk. A single buffered piece is handed out as-is (shared
/// with the backend buffer, no copy); several are concatenated once.
///
/// Exhaustion and errors are terminal: after either, `poll_next` yields `None`.
pub struct ChunkedStream {
    inner: Option<BoxStream<'static, Result<Bytes>>>,
    pending: Vec<Bytes>,
    pending_len: usize,
    min_chunk_size: usize,
}

impl ChunkedStream {
    pub fn new(inner: BoxStream<'static, Result<Bytes>>, min_chunk_size: usize) -> Self {
        Self {
            inner: Some(inner),
            pending: Vec::new(),
            pending_len: 0,
            min_chunk_size,
        }
    }

    /// A stream over an already materialized buffer.
    pub fn from_bytes(bytes: Bytes, min_chunk_size: usize) -> Self {
        Self::new(futures::stream::once(async move { Ok(bytes) }).boxed(), min_chunk_size)
    }

    pub fn min_chunk_size(&self) -> usize {
        self.min_chunk_size
    }

    /// Drain the remaining chunks into one contiguous buffer.
    pub async fn collect_bytes(mut self) -> Result<Bytes> {
        let mut parts = Vec::new();
        while let Some(chunk) = self.next().await {
            parts.push(chunk?);
        }
        Ok(concat(parts))
    }

    fn take_pending(&mut self) -> Bytes {
        self.pending_len = 0;
        concat(std::mem::take(&mut self.pending))
    }

    fn finish(&mut self) {
        self.inner = None;
    }
}

/// Join buffers, copying only when there is more than one.
fn concat(mut parts: Vec<Bytes>) -> Bytes {
    match parts.len() {
        0 => Bytes::new(),
        1 => parts.pop().unwrap_or_default(),
        _ => {
            let total = parts.iter().map(Bytes::len).sum();
            let mut buf = BytesMut::with_capacity(total);
            for part in &parts {
                buf.extend_from_slice(part);
            }
            buf.freeze()
        }
    }
}

impl Stream for ChunkedStream {
    type Item = Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let Some(inner) = this.inner.as_mut() else {
                return Poll::Ready(None);
            };
            match inner.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(piece))) => {
                    if piece.is_empty() {
                        continue;
                    }
                    this.pending_len += piece.len();
                    this.pending.push(piece);
                    if this.pending_len >= this.min_chunk_size {
                        return Poll::Ready(Some(Ok(this.take_pending())));
                    }
                }
                Poll::Ready(Some(Err(e))) => {
                    tracing::debug!("Body stream failed after {} buffered bytes: {}", this.pending_len, e);
                    this.finish();
                    this.pending.clear();
                    this.pending_len = 0;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(None) => {
                    this.finish();
                    if this.pending_len > 0 {
                        return Poll::Ready(Some(Ok(this.take_pending())));
                    }
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl FusedStream for ChunkedStream {
    fn is_terminated(&self) -> bool {
        self.inner.is_none() && self.pending.is_empty()
    }
}

impl std::fmt::Debug for ChunkedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedStream")
            .field("min_chunk_size", &self.min_chunk_size)
            .field("pending_len", &self.pending_len)
            .field("terminated", &self.inner.is_none())
            .finish()
    }
}
