// tests/common/mod.rs
//
// Common test utilities: deterministic object contents and an instrumented
// backend that counts calls and observes concurrency.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use objfetch::{
    ByteRange, FetchConfig, FetchRequest, Fetcher, InMemoryStore, ObjectStat, ObjectStore,
    PieceStream, StoreError,
};

/// Deterministic contents: byte `i` is `i % 251`.
pub fn patterned(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Wraps an [`InMemoryStore`] and records every range fetch.
pub struct CountingStore {
    pub inner: InMemoryStore,
    delay: Duration,
    range_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    spans: Mutex<Vec<ByteRange>>,
}

impl CountingStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self::with_delay(inner, Duration::ZERO)
    }

    /// Every range fetch sleeps for `delay` while counted as in flight.
    pub fn with_delay(inner: InMemoryStore, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            range_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            spans: Mutex::new(Vec::new()),
        }
    }

    pub fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Spans fetched so far, sorted.
    pub fn spans(&self) -> Vec<ByteRange> {
        let mut spans = self.spans.lock().unwrap().clone();
        spans.sort();
        spans
    }
}

#[async_trait]
impl ObjectStore for CountingStore {
    async fn stat(&self, path: &str, version: Option<&str>) -> Result<ObjectStat, StoreError> {
        self.inner.stat(path, version).await
    }

    async fn fetch_range(&self, request: &FetchRequest, range: ByteRange) -> Result<Bytes, StoreError> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        self.spans.lock().unwrap().push(range);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let result = self.inner.fetch_range(request, range).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn fetch_whole(&self, request: &FetchRequest) -> Result<PieceStream, StoreError> {
        self.inner.fetch_whole(request).await
    }
}

/// An in-memory store holding `data` at `path`, wrapped for counting.
pub async fn counting_store_with(path: &str, data: Vec<u8>) -> Arc<CountingStore> {
    let inner = InMemoryStore::new();
    inner.put(path, data).await;
    Arc::new(CountingStore::new(inner))
}

pub fn fetcher_over(store: Arc<CountingStore>, config: FetchConfig) -> Fetcher {
    Fetcher::with_config(store, config)
}
