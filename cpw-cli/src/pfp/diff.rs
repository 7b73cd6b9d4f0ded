//! Newly appeared records between two cleaned snapshots

use std::collections::HashSet;

use serde::Serialize;

use super::identity::canonical_code;
use super::{Snapshot, SnapshotError, columns};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    pub previous_codes: usize,
    pub current_codes: usize,
    pub new_count: usize,
    pub already_existed: usize,
}

/// Records of `current` absent from `previous`, in `current` order
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub records: Snapshot,
    pub stats: DiffStats,
}

fn code_set(snapshot: &Snapshot, col: usize) -> HashSet<String> {
    (0..snapshot.len())
        .map(|i| canonical_code(&snapshot.value(i, col).to_string()))
        .collect()
}

/// Membership test on `Unique Code`; row order of `previous` is irrelevant.
/// Legacy renderings of a code match the current one.
pub fn diff_new(previous: &Snapshot, current: &Snapshot) -> Result<Delta, SnapshotError> {
    let prev_col = previous.require_column(columns::UNIQUE_CODE)?;
    let curr_col = current.require_column(columns::UNIQUE_CODE)?;

    let known = code_set(previous, prev_col);
    let fresh: Vec<usize> = (0..current.len())
        .filter(|&i| {
            let code = canonical_code(&current.value(i, curr_col).to_string());
            !known.contains(&code)
        })
        .collect();

    let stats = DiffStats {
        previous_codes: known.len(),
        current_codes: code_set(current, curr_col).len(),
        new_count: fresh.len(),
        already_existed: current.len() - fresh.len(),
    };
    log::info!(
        "Delta: {} new of {} current records ({} already existed)",
        stats.new_count,
        current.len(),
        stats.already_existed
    );

    Ok(Delta {
        records: current.select(&fresh),
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pfp::fixtures::{codes, snapshot};
    use crate::store::CellValue;

    fn code_list(snap: &Snapshot) -> Vec<String> {
        (0..snap.len()).map(|i| snap.value(i, 0).to_string()).collect()
    }

    #[test]
    fn test_diff_scenario() {
        let previous = codes(&["A", "B"]);
        let current = codes(&["A", "C", "D"]);
        let delta = diff_new(&previous, &current).unwrap();

        assert_eq!(code_list(&delta.records), vec!["C", "D"]);
        assert_eq!(
            delta.stats,
            DiffStats {
                previous_codes: 2,
                current_codes: 3,
                new_count: 2,
                already_existed: 1,
            }
        );
        assert_eq!(delta.records.value(0, 1), &CellValue::text("emp C"));
    }

    #[test]
    fn test_diff_with_itself_is_empty() {
        let current = codes(&["A", "C", "D"]);
        let delta = diff_new(&current, &current).unwrap();
        assert!(delta.records.is_empty());
        assert_eq!(delta.stats.already_existed, 3);
    }

    #[test]
    fn test_diff_ignores_previous_order() {
        let current = codes(&["E", "A", "C", "B"]);
        let forward = diff_new(&codes(&["A", "B", "Z"]), &current).unwrap();
        let reversed = diff_new(&codes(&["Z", "B", "A"]), &current).unwrap();
        assert_eq!(forward, reversed);
        assert_eq!(code_list(&forward.records), vec!["E", "C"]);
    }

    #[test]
    fn test_diff_matches_legacy_coded_snapshot() {
        let previous = codes(&["1234.0 - Alice", "77 - nan"]);
        let current = codes(&["1234 - Alice", "77 - ", "88 - Bob"]);
        let delta = diff_new(&previous, &current).unwrap();

        assert_eq!(code_list(&delta.records), vec!["88 - Bob"]);
        assert_eq!(delta.stats.already_existed, 2);
    }

    #[test]
    fn test_diff_requires_code_column() {
        let previous = snapshot(&["Employee Name"], &[]);
        let current = codes(&["A"]);
        assert!(matches!(
            diff_new(&previous, &current),
            Err(SnapshotError::MissingColumn { .. })
        ));
    }
}
