// src/options.rs
//
// Options accepted by `get`. Builder helpers are provided so callers can write
// a fluent style:
//
// let opts = GetOptions::default()
//     .with_range(GetRange::Suffix(1024))
//     .if_none_match("\"abc\"")
//     .version("3");

use chrono::{DateTime, Utc};

use crate::conditional::Preconditions;
use crate::error::{FetchError, Result};
use crate::range::GetRange;

/// Options for a single `get`.
///
/// Fields are independent: every supplied precondition must hold, `range` only
/// narrows the body, and `head` suppresses the body entirely (the range is
/// still validated and reported).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Entity tag(s) the object must carry.
    pub if_match: Option<String>,
    /// Entity tag(s) the object must not carry.
    pub if_none_match: Option<String>,
    /// Only return the object if modified after this instant.
    pub if_modified_since: Option<DateTime<Utc>>,
    /// Only return the object if not modified after this instant.
    pub if_unmodified_since: Option<DateTime<Utc>>,
    /// Backend-specific version token.
    pub version: Option<String>,
    /// Byte range to return; `None` means the whole object.
    pub range: Option<GetRange>,
    /// Metadata only, no body bytes.
    pub head: bool,
}

impl GetOptions {
    pub fn with_range(mut self, range: impl Into<GetRange>) -> Self {
        self.range = Some(range.into());
        self
    }

    pub fn if_match(mut self, etag: impl Into<String>) -> Self {
        self.if_match = Some(etag.into());
        self
    }

    pub fn if_none_match(mut self, etag: impl Into<String>) -> Self {
        self.if_none_match = Some(etag.into());
        self
    }

    pub fn if_modified_since(mut self, since: DateTime<Utc>) -> Self {
        self.if_modified_since = Some(since);
        self
    }

    pub fn if_unmodified_since(mut self, since: DateTime<Utc>) -> Self {
        self.if_unmodified_since = Some(since);
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn head(mut self, head: bool) -> Self {
        self.head = head;
        self
    }

    /// The precondition subset forwarded to the backend.
    pub fn preconditions(&self) -> Preconditions {
        Preconditions {
            if_match: self.if_match.clone(),
            if_none_match: self.if_none_match.clone(),
            if_modified_since: self.if_modified_since,
            if_unmodified_since: self.if_unmodified_since,
        }
    }

    /// Reject malformed options before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("if_match", &self.if_match), ("if_none_match", &self.if_none_match)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(FetchError::invalid_state(format!("{name} must not be empty")));
            }
        }
        if self.version.as_deref().is_some_and(str::is_empty) {
            return Err(FetchError::invalid_state("version must not be empty"));
        }
        match self.range {
            Some(GetRange::Bounded(start, end)) if end <= start => Err(FetchError::invalid_range(
                format!("zero-length or inverted range {start}..{end}"),
            )),
            Some(GetRange::Suffix(0)) => Err(FetchError::invalid_range("zero-length suffix")),
            _ => Ok(()),
        }
    }
}
