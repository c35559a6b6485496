// src/api.rs
//! # objfetch Public API
//!
//! Stable facade over the fetch engine.
//!
//! ## Core Concepts
//!
//! - **Fetcher**: `get` / `get_range` / `get_ranges` against one backend
//! - **GetResult**: metadata plus a body consumed once, whole or as chunks
//! - **ObjectStore**: the capability a backend provides (stat, range, whole)
//!
//! ## Quick Start
//!
//! ```no_run
//! use objfetch::api::{store_for_uri, Fetcher, GetOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let (store, path) = store_for_uri("file:///data/shard-0001.bin")?;
//! let fetcher = Fetcher::new(store);
//!
//! // Three small reads, one backend call
//! let buffers = fetcher.get_ranges(&path, &[500, 0, 1000], &[10, 10, 10]).await?;
//! assert_eq!(buffers.len(), 3);
//!
//! // Stream the whole object in chunks of at least 10 MiB
//! let mut result = fetcher.get(&path, GetOptions::default()).await?;
//! println!("{} bytes", result.meta()?.size);
//! let _chunks = result.stream_default()?;
//! # Ok(())
//! # }
//! ```

/// Async fetch surface
pub use crate::fetcher::Fetcher;

/// Synchronous wrappers for callers without a runtime
pub use crate::blocking::{BlockingChunkIter, BlockingFetcher, BlockingGetResult};

/// Request and result types
pub use crate::options::GetOptions;
pub use crate::get_result::GetResult;
pub use crate::chunked_stream::ChunkedStream;
pub use crate::range::{ByteRange, GetRange};
pub use crate::conditional::{Condition, Preconditions};

/// Errors
pub use crate::error::{FetchError, Result};

/// Backend capability and the bundled backends
pub use crate::object_store::{
    infer_scheme, store_for_uri, Attribute, Attributes, FetchRequest, ObjectMeta, ObjectStat,
    ObjectStore, PieceStream, Scheme, StoreError,
};
pub use crate::file_store::LocalFileStore;
pub use crate::memory_store::{InMemoryStore, PutOptions};

/// Tuning
pub use crate::config::FetchConfig;
pub use crate::range_engine::{RangeEngine, RangeEngineConfig, RangeFetchStats};
