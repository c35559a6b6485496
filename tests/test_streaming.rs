// tests/test_streaming.rs
//
// GetResult bodies: chunked streaming, materialization and the draining rules.

mod common;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::StreamExt;

use common::patterned;
use objfetch::chunked_stream::ChunkedStream;
use objfetch::constants::MIB;
use objfetch::{
    ByteRange, FetchError, FetchRequest, Fetcher, GetOptions, GetRange, InMemoryStore, ObjectStat,
    ObjectStore, PieceStream, StoreError,
};

#[tokio::test]
async fn test_min_chunk_size_over_1mib_pieces() -> Result<()> {
    let mib = MIB as usize;
    let data = patterned(25 * mib);
    let store = Arc::new(InMemoryStore::new().with_piece_size(mib));
    store.put("big.bin", data.clone()).await;
    let fetcher = Fetcher::new(store);

    let mut result = fetcher.get("big.bin", GetOptions::default()).await?;
    assert_eq!(result.meta()?.size, 25 * MIB);

    let chunks: Vec<Bytes> = result
        .stream(10 * mib)?
        .map(|c| c.expect("chunk"))
        .collect()
        .await;

    let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
    assert_eq!(sizes, vec![10 * mib, 10 * mib, 5 * mib]);
    for chunk in &chunks[..chunks.len() - 1] {
        assert!(chunk.len() >= 10 * mib);
    }
    assert_eq!(chunks.concat(), data);
    Ok(())
}

#[tokio::test]
async fn test_meta_after_stream_is_invalid_state() -> Result<()> {
    let store = Arc::new(InMemoryStore::new().with_piece_size(100));
    store.put("obj", patterned(1000)).await;
    let fetcher = Fetcher::new(store);

    let mut result = fetcher.get("obj", GetOptions::default()).await?;
    let mut chunks = result.stream(1)?;
    let first = chunks.next().await.expect("one chunk")?;
    assert_eq!(first.len(), 100);

    assert!(matches!(result.meta(), Err(FetchError::InvalidState(_))));
    assert!(matches!(result.attributes(), Err(FetchError::InvalidState(_))));
    assert!(matches!(result.range(), Err(FetchError::InvalidState(_))));
    assert!(matches!(result.stream(1), Err(FetchError::InvalidState(_))));
    assert!(result.is_draining());
    Ok(())
}

#[tokio::test]
async fn test_bytes_materializes_whole_and_range() -> Result<()> {
    let data = patterned(5000);
    let store = Arc::new(InMemoryStore::new().with_piece_size(512));
    store.put("obj", data.clone()).await;
    let fetcher = Fetcher::new(store);

    let whole = fetcher.get("obj", GetOptions::default()).await?.bytes().await?;
    assert_eq!(&whole[..], &data[..]);

    let result = fetcher
        .get("obj", GetOptions::default().with_range(GetRange::Suffix(100)))
        .await?;
    assert_eq!(result.range()?, ByteRange::new(4900, 5000)?);
    assert_eq!(&result.bytes().await?[..], &data[4900..]);
    Ok(())
}

#[tokio::test]
async fn test_range_body_streams_in_chunks() -> Result<()> {
    let data = patterned(4096);
    let store = Arc::new(InMemoryStore::new());
    store.put("obj", data.clone()).await;
    let fetcher = Fetcher::new(store);

    let mut result = fetcher
        .get("obj", GetOptions::default().with_range(1000u64..3000))
        .await?;
    let chunks: Vec<Bytes> = result.stream(64)?.map(|c| c.expect("chunk")).collect().await;
    assert_eq!(chunks.concat(), &data[1000..3000]);
    Ok(())
}

#[tokio::test]
async fn test_empty_object_streams_nothing() -> Result<()> {
    let store = Arc::new(InMemoryStore::new());
    store.put("empty", Bytes::new()).await;
    let fetcher = Fetcher::new(store);

    let mut result = fetcher.get("empty", GetOptions::default()).await?;
    assert_eq!(result.range()?, ByteRange::whole(0));
    let mut chunks = result.stream(1)?;
    assert!(chunks.next().await.is_none());
    Ok(())
}

/// Delivers a few pieces and then fails.
struct FailingStore {
    inner: InMemoryStore,
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn stat(&self, path: &str, version: Option<&str>) -> Result<ObjectStat, StoreError> {
        self.inner.stat(path, version).await
    }

    async fn fetch_range(&self, request: &FetchRequest, range: ByteRange) -> Result<Bytes, StoreError> {
        self.inner.fetch_range(request, range).await
    }

    async fn fetch_whole(&self, _request: &FetchRequest) -> Result<PieceStream, StoreError> {
        let pieces: Vec<Result<Bytes, StoreError>> = vec![
            Ok(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"def")),
            Err(StoreError::Other(anyhow::anyhow!("connection reset"))),
            Ok(Bytes::from_static(b"never seen")),
        ];
        Ok(futures::stream::iter(pieces).boxed())
    }
}

#[tokio::test]
async fn test_mid_stream_failure_is_terminal() -> Result<()> {
    let inner = InMemoryStore::new();
    inner.put("obj", patterned(100)).await;
    let fetcher = Fetcher::new(Arc::new(FailingStore { inner }));

    let mut result = fetcher.get("obj", GetOptions::default()).await?;
    let mut chunks = result.stream(3)?;

    assert_eq!(chunks.next().await.expect("chunk")?, Bytes::from_static(b"abc"));
    assert_eq!(chunks.next().await.expect("chunk")?, Bytes::from_static(b"def"));
    let err = chunks.next().await.expect("error").unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)));
    assert!(err.to_string().contains("connection reset"));
    assert!(chunks.next().await.is_none());
    assert!(chunks.next().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_chunked_stream_passthrough_without_minimum() -> Result<()> {
    let pieces: Vec<objfetch::Result<Bytes>> = vec![
        Ok(Bytes::from_static(b"a")),
        Ok(Bytes::new()),
        Ok(Bytes::from_static(b"bc")),
    ];
    let chunks: Vec<Bytes> = ChunkedStream::new(futures::stream::iter(pieces).boxed(), 0)
        .map(|c| c.expect("chunk"))
        .collect()
        .await;
    assert_eq!(chunks, vec![Bytes::from_static(b"a"), Bytes::from_static(b"bc")]);
    Ok(())
}
