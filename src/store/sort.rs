//! Deterministic collection ordering
//! Pinned records first, then records needing attention, then most recent.
//! The sort is stable so a single mutation never visibly reorders unrelated
//! records when the whole collection is re-sorted.

use super::Record;
use std::cmp::Ordering;

/// Comparison key a record exposes to the sorter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    /// User-controlled priority flag; pinned records sort first
    pub pinned: bool,
    /// Kind-specific secondary flag (unreviewed memories, enabled presets)
    pub attention: bool,
    /// Most relevant timestamp, newest first
    pub recent_at: i64,
}

fn compare(a: &Rank, b: &Rank) -> Ordering {
    b.pinned
        .cmp(&a.pinned)
        .then(b.attention.cmp(&a.attention))
        .then(b.recent_at.cmp(&a.recent_at))
}

/// Stable in-place sort by rank
pub fn sort_records<R: Record>(records: &mut [R]) {
    records.sort_by(|a, b| compare(&a.rank(), &b.rank()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::Value;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Row {
        id: &'static str,
        pinned: bool,
        attention: bool,
        recent_at: i64,
        updated_at: i64,
    }

    impl Record for Row {
        const KIND: &'static str = "row";

        fn normalize(_raw: &Value) -> Self {
            unreachable!("sort tests construct rows directly")
        }

        fn id(&self) -> &str {
            self.id
        }

        fn updated_at(&self) -> i64 {
            self.updated_at
        }

        fn rank(&self) -> Rank {
            Rank {
                pinned: self.pinned,
                attention: self.attention,
                recent_at: self.recent_at,
            }
        }
    }

    fn row(id: &'static str, pinned: bool, attention: bool, recent_at: i64) -> Row {
        Row {
            id,
            pinned,
            attention,
            recent_at,
            updated_at: recent_at,
        }
    }

    #[test]
    fn test_priority_holds_for_every_permutation() {
        // a: unpinned but unreviewed, b: pinned, c: unpinned and reviewed
        let a = row("a", false, true, 1);
        let b = row("b", true, false, 0);
        let c = row("c", false, false, 5);

        let permutations: [[&Row; 3]; 6] = [
            [&a, &b, &c],
            [&a, &c, &b],
            [&b, &a, &c],
            [&b, &c, &a],
            [&c, &a, &b],
            [&c, &b, &a],
        ];
        for permutation in permutations {
            let mut records: Vec<Row> = permutation.iter().map(|r| (*r).clone()).collect();
            sort_records(&mut records);
            let order: Vec<&str> = records.iter().map(|r| r.id).collect();
            assert_eq!(order, vec!["b", "a", "c"]);
        }
    }

    #[test]
    fn test_ties_keep_input_order() {
        let mut records = vec![row("x", false, false, 7), row("y", false, false, 7)];
        sort_records(&mut records);
        assert_eq!(records[0].id, "x");
        assert_eq!(records[1].id, "y");
    }

    #[test]
    fn test_recency_descending() {
        let mut records = vec![row("old", false, false, 1), row("new", false, false, 9)];
        sort_records(&mut records);
        assert_eq!(records[0].id, "new");
    }
}
