// tests/test_file_store.rs
//
// Integration tests for the local filesystem backend behind Fetcher.

mod common;

use std::fs;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use futures::stream::StreamExt;

use common::patterned;
use objfetch::{
    store_for_uri, FetchError, Fetcher, GetOptions, GetRange, LocalFileStore,
};

#[tokio::test]
async fn test_file_whole_and_ranges() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let size = 3 * 1024 * 1024 + 17;
    let data = patterned(size);
    fs::create_dir_all(dir.path().join("shards"))?;
    fs::write(dir.path().join("shards/0001.bin"), &data)?;

    let store = LocalFileStore::new(dir.path()).with_piece_size(256 * 1024);
    let fetcher = Fetcher::new(Arc::new(store));

    let mut result = fetcher.get("shards/0001.bin", GetOptions::default()).await?;
    assert_eq!(result.meta()?.size, size as u64);
    let chunks: Vec<Bytes> = result
        .stream(1024 * 1024)?
        .map(|c| c.expect("chunk"))
        .collect()
        .await;
    for chunk in &chunks[..chunks.len() - 1] {
        assert!(chunk.len() >= 1024 * 1024);
    }
    assert_eq!(chunks.concat(), data);

    let buffers = fetcher
        .get_ranges("shards/0001.bin", &[2_000_000, 17, size as u64 - 5], &[64, 64, 64])
        .await?;
    assert_eq!(&buffers[0][..], &data[2_000_000..2_000_064]);
    assert_eq!(&buffers[1][..], &data[17..81]);
    assert_eq!(&buffers[2][..], &data[size - 5..]);
    Ok(())
}

#[tokio::test]
async fn test_file_conditional_and_missing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("obj.txt"), b"hello world")?;
    let fetcher = Fetcher::new(Arc::new(LocalFileStore::new(dir.path())));

    let etag = fetcher.stat("obj.txt", None).await?.meta.e_tag.expect("file etag");
    let err = fetcher
        .get("obj.txt", GetOptions::default().if_none_match(etag.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::NotModified { .. }));

    let tail = fetcher
        .get("obj.txt", GetOptions::default().if_match(etag).with_range(GetRange::Suffix(5)))
        .await?
        .bytes()
        .await?;
    assert_eq!(tail, Bytes::from_static(b"world"));

    let err = fetcher.get("missing.txt", GetOptions::default()).await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound { .. }));
    let err = fetcher
        .get("obj.txt", GetOptions::default().version("1"))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn test_file_uri_routing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("routed.bin");
    let data = patterned(4096);
    fs::write(&file, &data)?;

    let uri = format!("file://{}", file.display());
    let (store, path) = store_for_uri(&uri)?;
    let fetcher = Fetcher::new(store);
    assert_eq!(&fetcher.get_range(&path, 4000, 1000).await?[..], &data[4000..]);
    Ok(())
}
