// src/error.rs
//
// Error taxonomy surfaced to callers of the fetch API

use thiserror::Error;
use anyhow::Error as AnyError;

use crate::conditional::Condition;

/// Convenience alias used throughout the crate.
pub type Result<T, E = FetchError> = std::result::Result<T, E>;

/// Every failure a fetch can surface. None of these are recovered internally.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Zero-length range, or a start at/after the end of the object.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// `if_match` / `if_unmodified_since` did not hold.
    #[error("precondition {condition} failed for {path}")]
    Precondition { path: String, condition: Condition },

    /// `if_none_match` / `if_modified_since` reported an unchanged object.
    #[error("object not modified: {path}")]
    NotModified { path: String },

    #[error("object not found: {path}")]
    NotFound { path: String },

    /// Backend or network failure, passed through as-is.
    #[error(transparent)]
    Transport(#[from] AnyError),

    /// Result accessed after draining began, stream consumed twice, or
    /// mismatched batch arguments.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl FetchError {
    pub(crate) fn invalid_range(msg: impl Into<String>) -> Self {
        FetchError::InvalidRange(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        FetchError::InvalidState(msg.into())
    }

    /// True for the two conditional-request outcomes.
    pub fn is_conditional(&self) -> bool {
        matches!(self, FetchError::Precondition { .. } | FetchError::NotModified { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = FetchError::Precondition {
            path: "data/a.bin".to_string(),
            condition: Condition::IfMatch,
        };
        assert_eq!(err.to_string(), "precondition if-match failed for data/a.bin");
        assert!(err.is_conditional());

        let err = FetchError::from(anyhow::anyhow!("connection reset"));
        assert_eq!(err.to_string(), "connection reset");
        assert!(!err.is_conditional());
    }
}
