// src/lib.rs
//
// Crate root: public re-exports.
//
// Range-coalescing parallel fetches and chunked streaming over pluggable
// object storage backends.

// ===== Core Public API =====
pub mod api;

// Re-export the main API at the crate root for convenience
pub use api::*;

// ===== Internal Modules (Implementation) =====
// These are public for internal use but may change without notice

pub mod constants;
pub mod config;
pub mod error;
pub mod range;
pub mod options;
pub mod conditional;
pub mod coalesce;
pub mod range_engine;
pub mod chunked_stream;
pub mod get_result;
pub mod object_size_cache;
pub mod fetcher;
pub mod blocking;

// Storage backends
pub mod object_store;
pub mod file_store;
pub mod memory_store;
