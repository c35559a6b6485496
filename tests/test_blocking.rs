// tests/test_blocking.rs
//
// The blocking surface runs the same engine on its own runtime.

mod common;

use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;

use common::patterned;
use objfetch::{BlockingFetcher, FetchError, Fetcher, GetOptions, InMemoryStore};

fn blocking_with(path: &str, data: Vec<u8>, piece_size: usize) -> Result<BlockingFetcher> {
    let store = InMemoryStore::new().with_piece_size(piece_size);
    tokio::runtime::Builder::new_current_thread()
        .build()?
        .block_on(store.put(path, data));
    Ok(BlockingFetcher::new(Fetcher::new(Arc::new(store)))?)
}

#[test]
fn test_blocking_ranges_and_range() -> Result<()> {
    let data = patterned(2000);
    let fetcher = blocking_with("obj", data.clone(), 1024)?;

    let buffers = fetcher.get_ranges("obj", &[500, 0, 1000], &[10, 10, 10])?;
    assert_eq!(&buffers[0][..], &data[500..510]);
    assert_eq!(&buffers[1][..], &data[0..10]);
    assert_eq!(&buffers[2][..], &data[1000..1010]);

    assert_eq!(&fetcher.get_range("obj", 1995, 50)?[..], &data[1995..]);
    assert_eq!(fetcher.stat("obj", None)?.meta.size, 2000);
    Ok(())
}

#[test]
fn test_blocking_stream() -> Result<()> {
    let data = patterned(10_000);
    let fetcher = blocking_with("obj", data.clone(), 1000)?;

    let mut result = fetcher.get("obj", GetOptions::default())?;
    assert_eq!(result.meta()?.size, 10_000);

    let chunks: Vec<Bytes> = result.stream(3000)?.collect::<objfetch::Result<_>>()?;
    let sizes: Vec<usize> = chunks.iter().map(Bytes::len).collect();
    assert_eq!(sizes, vec![3000, 3000, 3000, 1000]);
    assert_eq!(chunks.concat(), data);

    assert!(matches!(result.meta(), Err(FetchError::InvalidState(_))));
    assert!(matches!(result.stream(1), Err(FetchError::InvalidState(_))));
    Ok(())
}

#[test]
fn test_blocking_bytes_and_errors() -> Result<()> {
    let data = patterned(300);
    let fetcher = blocking_with("obj", data.clone(), 64)?;

    assert_eq!(&fetcher.get("obj", GetOptions::default())?.bytes()?[..], &data[..]);
    assert!(matches!(fetcher.get("nope", GetOptions::default()), Err(FetchError::NotFound { .. })));
    assert!(matches!(fetcher.get_ranges("obj", &[0], &[]), Err(FetchError::InvalidState(_))));
    Ok(())
}
