// src/conditional.rs
//
// Conditional request evaluation: which preconditions a fetch carries, how they
// are answered from object metadata, and how backend precondition signals are
// mapped onto typed outcomes.
//
// Outcome table:
//   if_match            fails -> Precondition
//   if_unmodified_since fails -> Precondition
//   if_none_match       fails -> NotModified
//   if_modified_since   fails -> NotModified

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::FetchError;
use crate::object_store::{ObjectMeta, StoreError};

/// The individual clause of a conditional request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    IfMatch,
    IfNoneMatch,
    IfModifiedSince,
    IfUnmodifiedSince,
}

impl Condition {
    /// Typed outcome when this clause does not hold for `path`.
    pub fn into_error(self, path: &str) -> FetchError {
        match self {
            Condition::IfMatch | Condition::IfUnmodifiedSince => FetchError::Precondition {
                path: path.to_string(),
                condition: self,
            },
            Condition::IfNoneMatch | Condition::IfModifiedSince => FetchError::NotModified {
                path: path.to_string(),
            },
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Condition::IfMatch => "if-match",
            Condition::IfNoneMatch => "if-none-match",
            Condition::IfModifiedSince => "if-modified-since",
            Condition::IfUnmodifiedSince => "if-unmodified-since",
        };
        f.write_str(name)
    }
}

/// Preconditions forwarded with a fetch. Every supplied field must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preconditions {
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<DateTime<Utc>>,
    pub if_unmodified_since: Option<DateTime<Utc>>,
}

impl Preconditions {
    pub fn is_empty(&self) -> bool {
        self.if_match.is_none()
            && self.if_none_match.is_none()
            && self.if_modified_since.is_none()
            && self.if_unmodified_since.is_none()
    }

    /// Answer the preconditions from metadata, for stores without native
    /// conditional support and for `head` requests.
    ///
    /// Precondition-type clauses are checked before not-modified ones, so a
    /// request failing both reports `Precondition`.
    pub fn evaluate(&self, meta: &ObjectMeta) -> Result<(), Condition> {
        if let Some(expected) = &self.if_match {
            if !etag_matches(expected, meta.e_tag.as_deref()) {
                return Err(Condition::IfMatch);
            }
        }
        if let Some(since) = self.if_unmodified_since {
            if meta.last_modified > since {
                return Err(Condition::IfUnmodifiedSince);
            }
        }
        if let Some(tags) = &self.if_none_match {
            if etag_matches(tags, meta.e_tag.as_deref()) {
                return Err(Condition::IfNoneMatch);
            }
        }
        if let Some(since) = self.if_modified_since {
            if meta.last_modified <= since {
                return Err(Condition::IfModifiedSince);
            }
        }
        Ok(())
    }

    /// Map a backend failure for `path` into the caller-facing error.
    ///
    /// Raw 412 / 304 statuses carry no clause, so they are attributed to the
    /// first supplied clause of the matching family.
    pub fn interpret(&self, err: StoreError, path: &str) -> FetchError {
        match err {
            StoreError::NotFound => FetchError::NotFound { path: path.to_string() },
            StoreError::ConditionFailed(condition) => condition.into_error(path),
            StoreError::Status(304) => FetchError::NotModified { path: path.to_string() },
            StoreError::Status(412) => {
                let condition = if self.if_unmodified_since.is_some() && self.if_match.is_none() {
                    Condition::IfUnmodifiedSince
                } else {
                    Condition::IfMatch
                };
                condition.into_error(path)
            }
            StoreError::Status(404) => FetchError::NotFound { path: path.to_string() },
            StoreError::Status(code) => FetchError::Transport(anyhow::anyhow!(
                "backend returned status {code} for {path}"
            )),
            StoreError::Other(e) => FetchError::Transport(e),
        }
    }
}

/// Strip weak-validator prefix and surrounding quotes.
fn normalize_etag(tag: &str) -> &str {
    let tag = tag.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    tag.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(tag)
}

/// Whether any tag in a comma-separated list matches `actual`. `*` matches any
/// existing entity tag.
fn etag_matches(list: &str, actual: Option<&str>) -> bool {
    let Some(actual) = actual.map(normalize_etag) else {
        return false;
    };
    list.split(',')
        .map(normalize_etag)
        .any(|candidate| candidate == "*" || candidate == actual)
}
