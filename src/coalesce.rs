// src/coalesce.rs
//
// Range coalescing: merge requested ranges of one object that lie close
// together into a single backend fetch, remembering which original request
// each merged span has to serve.

use crate::range::ByteRange;

/// One backend fetch covering one or more requested ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTask {
    /// `[min(member start), max(member end))`
    pub span: ByteRange,
    /// `(original request index, requested range)`, sorted by range start.
    pub members: Vec<(usize, ByteRange)>,
}

impl FetchTask {
    fn open(index: usize, range: ByteRange) -> Self {
        Self { span: range, members: vec![(index, range)] }
    }

    /// Whether `range` should join this task given the merge threshold.
    /// Overlapping or touching ranges always join when `gap > 0`; overlapping
    /// ranges join even when `gap == 0`.
    fn accepts(&self, range: &ByteRange, gap: u64) -> bool {
        range.start < self.span.end || range.start - self.span.end < gap
    }

    fn push(&mut self, index: usize, range: ByteRange) {
        self.span.end = self.span.end.max(range.end);
        self.members.push((index, range));
    }
}

/// Greedy single-pass interval merge.
///
/// Ranges are sorted by start; a range joins the current task when the gap
/// between the task end and its start is smaller than `gap`, otherwise it
/// opens a new task. The result does not depend on input order beyond the
/// member indices it records.
pub fn coalesce_ranges(ranges: &[ByteRange], gap: u64) -> Vec<FetchTask> {
    let mut order: Vec<usize> = (0..ranges.len()).collect();
    order.sort_by_key(|&i| (ranges[i].start, ranges[i].end, i));

    let mut tasks: Vec<FetchTask> = Vec::new();
    for idx in order {
        let range = ranges[idx];
        match tasks.last_mut() {
            Some(task) if task.accepts(&range, gap) => task.push(idx, range),
            _ => tasks.push(FetchTask::open(idx, range)),
        }
    }

    tracing::trace!("Coalesced {} ranges into {} fetch tasks (gap {})", ranges.len(), tasks.len(), gap);
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: u64, end: u64) -> ByteRange {
        ByteRange { start, end }
    }

    #[test]
    fn test_merges_within_gap() {
        let tasks = coalesce_ranges(&[r(0, 10), r(15, 20), r(100, 110)], 10);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].span, r(0, 20));
        assert_eq!(tasks[0].members, vec![(0, r(0, 10)), (1, r(15, 20))]);
        assert_eq!(tasks[1].span, r(100, 110));
        assert_eq!(tasks[1].members, vec![(2, r(100, 110))]);
    }

    #[test]
    fn test_gap_boundary() {
        // gap of 9 < 10 merges, gap of exactly 10 does not
        assert_eq!(coalesce_ranges(&[r(0, 10), r(19, 30)], 10).len(), 1);
        assert_eq!(coalesce_ranges(&[r(0, 10), r(20, 30)], 10).len(), 2);
    }

    #[test]
    fn test_overlap_and_identical() {
        let tasks = coalesce_ranges(&[r(50, 80), r(0, 60), r(50, 80)], 0);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].span, r(0, 80));
        let idx: Vec<usize> = tasks[0].members.iter().map(|(i, _)| *i).collect();
        assert_eq!(idx, vec![1, 0, 2]);
    }

    #[test]
    fn test_contained_range_keeps_wider_end() {
        let tasks = coalesce_ranges(&[r(0, 100), r(10, 20), r(150, 160)], 40);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].span, r(0, 100));
        assert_eq!(tasks[1].span, r(150, 160));
    }

    #[test]
    fn test_unsorted_input() {
        let tasks = coalesce_ranges(&[r(500, 510), r(0, 10), r(1000, 1010)], 100);
        let spans: Vec<ByteRange> = tasks.iter().map(|t| t.span).collect();
        assert_eq!(spans, vec![r(0, 10), r(500, 510), r(1000, 1010)]);
        assert_eq!(tasks[0].members[0].0, 1);
    }

    #[test]
    fn test_empty() {
        assert!(coalesce_ranges(&[], 10).is_empty());
    }
}
