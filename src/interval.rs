//! Closed integer intervals and the fixed-size chunking used to keep SQL
//! predicate lists under the server's appetite.
//!
//! Mirrors `slicetool.ids.Interval` and `slicetool.ids.partition` from the
//! tool this engine was distilled from: an interval is `[start, end]`
//! inclusive, and partitioning a list just slices it into runs of at most
//! `n` items without reordering anything.

use std::cmp::{max, min};

/// An inclusive closed range over non-negative row ids: `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    /// Construct an interval. `start` must be `<= end`; this is an internal
    /// invariant enforced by every caller in this crate, not user input, so
    /// it's a debug assertion rather than a `Result`.
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "interval start {start} > end {end}");
        Interval { start, end }
    }

    /// A single-row interval, used when a granularity-1 scan needs to
    /// express an id as the degenerate range `[id, id]`.
    pub fn single(id: u64) -> Self {
        Interval { start: id, end: id }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.start <= id && id <= self.end
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// True if `self` lies entirely within `other` — used to check the
    /// ZoomMap containment invariant (every populated level's intervals lie
    /// within the union of the next-coarser level's intervals).
    pub fn within(&self, other: &Interval) -> bool {
        other.start <= self.start && self.end <= other.end
    }

    /// The smallest interval covering both `self` and `other`.
    pub fn union_bounds(&self, other: &Interval) -> Interval {
        Interval::new(min(self.start, other.start), max(self.end, other.end))
    }

    /// Render as a `col BETWEEN start AND end` fragment. The caller is
    /// responsible for backquoting `col` if needed.
    pub fn sql_between(&self, col: &str) -> String {
        format!("{col} BETWEEN {} AND {}", self.start, self.end)
    }
}

/// Split `data` into consecutive chunks of at most `chunk_size` items each,
/// preserving order. `chunk_size == 0` returns no chunks.
///
/// Concatenating the results back together reproduces `data` exactly — this
/// is the round-trip property `batch_rows`/`batch_conditions`/
/// `batch_fingerprints` all rely on to split predicate lists without losing
/// or duplicating any id.
pub fn partition<T: Clone>(chunk_size: usize, data: &[T]) -> Vec<Vec<T>> {
    if chunk_size == 0 {
        return Vec::new();
    }
    data.chunks(chunk_size).map(|c| c.to_vec()).collect()
}
