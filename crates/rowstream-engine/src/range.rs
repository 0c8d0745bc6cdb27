use crate::boundary::BoundaryIndex;

/// Half-open interval `[start, end)` in the global row coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Split a requested range against the current frontier total.
///
/// The common case returns the range unchanged. A range running past the
/// total wraps once: `[start % total, min(end, total))` followed by
/// `[0, end % total)`. A single wraparound is all this supports — the batch
/// size is required to be no larger than the dataset, so a request can never
/// span more than one full lap.
pub fn split(range: RowRange, total: usize) -> Vec<RowRange> {
    if range.end <= total {
        vec![range]
    } else {
        vec![
            RowRange::new(range.start % total, range.end.min(total)),
            RowRange::new(0, range.end % total),
        ]
    }
}

/// Inclusive partition-index span `[first, last]` covering a sub-range.
///
/// The exclusive endpoint is resolved by locating `end - 1`, not `end`: an
/// end landing exactly on a boundary must not pull in the next, possibly
/// unread, partition.
pub fn partition_span(range: RowRange, boundary: &BoundaryIndex) -> (usize, usize) {
    (boundary.locate(range.start), boundary.locate(range.end - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundary(counts: &[usize]) -> BoundaryIndex {
        let parts: Vec<String> = (0..counts.len()).map(|i| format!("p{i}")).collect();
        let mut idx = BoundaryIndex::new();
        idx.extend_in_full(&parts, |id| {
            let i: usize = id.trim_start_matches('p').parse().unwrap();
            Ok(counts[i])
        })
        .unwrap();
        idx
    }

    #[test]
    fn in_bounds_range_passes_through() {
        assert_eq!(
            split(RowRange::new(5, 15), 20),
            vec![RowRange::new(5, 15)]
        );
        // End landing exactly on the total is still a single segment.
        assert_eq!(
            split(RowRange::new(10, 20), 20),
            vec![RowRange::new(10, 20)]
        );
    }

    #[test]
    fn overrun_wraps_once() {
        // T=20, cursor [16, 24): tail of the dataset plus the first 4 rows.
        assert_eq!(
            split(RowRange::new(16, 24), 20),
            vec![RowRange::new(16, 20), RowRange::new(0, 4)]
        );
    }

    #[test]
    fn wrap_after_exact_laps() {
        // T=20, B=8: ceil(20/8)=3 batches end at 24; the extra batch starts
        // at 24 % 20 = 4.
        assert_eq!(
            split(RowRange::new(4, 12), 20),
            vec![RowRange::new(4, 12)]
        );
    }

    #[test]
    fn span_excludes_partition_at_exact_end() {
        let idx = boundary(&[10, 10, 10]);
        // [0, 10) is entirely inside partition 0 even though 10 is a boundary.
        assert_eq!(partition_span(RowRange::new(0, 10), &idx), (0, 0));
        assert_eq!(partition_span(RowRange::new(0, 11), &idx), (0, 1));
        assert_eq!(partition_span(RowRange::new(9, 20), &idx), (0, 1));
        assert_eq!(partition_span(RowRange::new(10, 30), &idx), (1, 2));
    }

    #[test]
    fn span_against_partial_frontier() {
        let parts: Vec<String> = (0..4).map(|i| format!("p{i}")).collect();
        let mut idx = BoundaryIndex::new();
        idx.extend_until_covers(5, &parts, |_| Ok(3)).unwrap();
        // Frontier is [0, 3, 6]; a range inside it resolves normally.
        assert_eq!(partition_span(RowRange::new(2, 6), &idx), (0, 1));
    }
}
