// src/range.rs
//
// Byte ranges and the normalizer that turns a caller's (possibly open-ended)
// range request into a concrete [start, end) interval for a given object size.

use std::fmt;
use std::ops::Range;

use crate::error::{FetchError, Result};

/// Half-open byte interval `[start, end)` within an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Build a non-empty range. Fails with `InvalidRange` when `end <= start`.
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if end <= start {
            return Err(FetchError::invalid_range(format!(
                "zero-length or inverted range {start}..{end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Build a range from an offset and a length, checking for overflow.
    pub fn from_offset_len(offset: u64, length: u64) -> Result<Self> {
        let end = offset.checked_add(length).ok_or_else(|| {
            FetchError::invalid_range(format!("offset {offset} + length {length} overflows"))
        })?;
        Self::new(offset, end)
    }

    /// The whole of an object of `size` bytes. Empty when `size == 0`.
    pub fn whole(size: u64) -> Self {
        Self { start: 0, end: size }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Offsets of `inner` relative to `self.start`, usable to slice a buffer
    /// holding exactly `self`. Fails when `inner` is not inside `self` or the
    /// offsets do not fit in `usize`.
    pub(crate) fn relative(&self, inner: &ByteRange) -> Result<Range<usize>> {
        if inner.start < self.start || inner.end > self.end {
            return Err(FetchError::invalid_range(format!("{inner} is not inside span {self}")));
        }
        let offset = |pos: u64| {
            usize::try_from(pos - self.start).map_err(|_| {
                FetchError::invalid_range(format!("{inner} is not addressable within span {self}"))
            })
        };
        Ok(offset(inner.start)?..offset(inner.end)?)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl From<ByteRange> for Range<u64> {
    fn from(r: ByteRange) -> Self {
        r.start..r.end
    }
}

/// A range as requested by the caller, before the object size is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetRange {
    /// Explicit `[start, end)`; `end` past the object is clamped.
    Bounded(u64, u64),
    /// From `start` to the end of the object.
    Offset(u64),
    /// The last `n` bytes of the object.
    Suffix(u64),
}

impl GetRange {
    /// Resolve against an object of `size` bytes.
    pub fn normalize(&self, size: u64) -> Result<ByteRange> {
        match *self {
            GetRange::Bounded(start, end) => {
                if end <= start {
                    return Err(FetchError::invalid_range(format!(
                        "zero-length or inverted range {start}..{end}"
                    )));
                }
                if start >= size {
                    return Err(FetchError::invalid_range(format!(
                        "start {start} is at or beyond end of object ({size} bytes)"
                    )));
                }
                Ok(ByteRange { start, end: end.min(size) })
            }
            GetRange::Offset(start) => GetRange::Bounded(start, size).normalize(size),
            GetRange::Suffix(0) => Err(FetchError::invalid_range("zero-length suffix")),
            GetRange::Suffix(n) => Ok(ByteRange { start: size.saturating_sub(n), end: size }),
        }
    }
}

impl From<Range<u64>> for GetRange {
    fn from(r: Range<u64>) -> Self {
        GetRange::Bounded(r.start, r.end)
    }
}

impl From<ByteRange> for GetRange {
    fn from(r: ByteRange) -> Self {
        GetRange::Bounded(r.start, r.end)
    }
}

/// Normalize an optional range request; an absent range means the whole object.
pub fn normalize_range(range: Option<&GetRange>, size: u64) -> Result<ByteRange> {
    match range {
        Some(r) => r.normalize(size),
        None => Ok(ByteRange::whole(size)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounded_clamps_end() {
        let r = GetRange::Bounded(100, 5000).normalize(1000).unwrap();
        assert_eq!(r, ByteRange { start: 100, end: 1000 });
        assert_eq!(r.len(), 900);
    }

    #[test]
    fn test_bounded_rejects_empty_and_inverted() {
        for (s, e) in [(10, 10), (10, 5), (0, 0)] {
            let err = GetRange::Bounded(s, e).normalize(1000).unwrap_err();
            assert!(matches!(err, FetchError::InvalidRange(_)), "{s}..{e}");
        }
    }

    #[test]
    fn test_bounded_rejects_start_past_end() {
        assert!(matches!(
            GetRange::Bounded(1000, 1010).normalize(1000),
            Err(FetchError::InvalidRange(_))
        ));
        assert!(GetRange::Bounded(999, 1010).normalize(1000).is_ok());
    }

    #[test]
    fn test_offset_and_suffix() {
        assert_eq!(GetRange::Offset(40).normalize(100).unwrap(), ByteRange { start: 40, end: 100 });
        assert!(GetRange::Offset(100).normalize(100).is_err());

        assert_eq!(GetRange::Suffix(10).normalize(100).unwrap(), ByteRange { start: 90, end: 100 });
        assert_eq!(GetRange::Suffix(500).normalize(100).unwrap(), ByteRange { start: 0, end: 100 });
        assert!(GetRange::Suffix(0).normalize(100).is_err());
        assert!(GetRange::Suffix(3).normalize(0).unwrap().is_empty());
    }

    #[test]
    fn test_absent_is_whole_object() {
        assert_eq!(normalize_range(None, 42).unwrap(), ByteRange { start: 0, end: 42 });
        assert!(normalize_range(None, 0).unwrap().is_empty());
    }

    #[test]
    fn test_from_offset_len() {
        assert_eq!(ByteRange::from_offset_len(5, 10).unwrap(), ByteRange { start: 5, end: 15 });
        assert!(ByteRange::from_offset_len(5, 0).is_err());
        assert!(ByteRange::from_offset_len(u64::MAX, 2).is_err());
    }

    #[test]
    fn test_relative_slice() {
        let span = ByteRange { start: 100, end: 200 };
        let inner = ByteRange { start: 150, end: 160 };
        assert_eq!(span.relative(&inner).unwrap(), 50..60);
        assert_eq!(span.relative(&span).unwrap(), 0..100);
    }

    #[test]
    fn test_relative_rejects_outside_span() {
        let span = ByteRange { start: 100, end: 200 };
        for inner in [ByteRange { start: 50, end: 150 }, ByteRange { start: 150, end: 250 }] {
            assert!(matches!(span.relative(&inner), Err(FetchError::InvalidRange(_))), "{inner}");
        }
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn test_relative_rejects_offsets_past_usize() {
        let span = ByteRange { start: 0, end: 8 << 30 };
        let inner = ByteRange { start: 5 << 30, end: 6 << 30 };
        assert!(matches!(span.relative(&inner), Err(FetchError::InvalidRange(_))));
    }
}
