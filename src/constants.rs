// src/constants.rs
//
// Centralized constants for objfetch to avoid hardcoded values throughout the codebase

/// One mebibyte, used to express the defaults below
pub const MIB: u64 = 1024 * 1024;

// ============================================================================
// Range coalescing / parallel fetch
// ============================================================================
//
// Requested ranges for the same object are merged into one backend call when the
// gap between them is smaller than the coalesce gap. Reading a few extra MiB in a
// single request is cheaper than paying another round trip on object storage.
//
// The in-flight cap applies per RangeEngine, across every batch that shares it.
// ============================================================================

/// Default gap below which two requested ranges are merged into one fetch (10 MiB)
pub const DEFAULT_COALESCE_GAP: u64 = 10 * MIB;

/// Default maximum number of backend range fetches in flight (10)
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 10;

/// Default timeout for a single backend fetch (seconds)
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 300; // 5 minutes

// ============================================================================
// Streaming
// ============================================================================

/// Default minimum size of every streamed chunk except the last one (10 MiB)
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 10 * MIB as usize;

/// Piece size used when reading whole local files as a stream (1 MiB)
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = MIB as usize;

// ============================================================================
// Size cache
// ============================================================================

/// Default time-to-live of cached object sizes (seconds)
pub const DEFAULT_SIZE_CACHE_TTL_SECS: u64 = 60;
