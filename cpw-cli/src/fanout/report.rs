//! Per-run summary of bucket outcomes and failures

use std::path::PathBuf;

use serde::Serialize;

use super::{ArtifactKind, BucketError, MergeOutcome, OutcomeKind};

/// Aggregated per-bucket results of one export run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub artifact: ArtifactKind,
    pub target_dir: PathBuf,
    pub outcomes: Vec<MergeOutcome>,
    pub failures: Vec<BucketError>,
}

impl RunReport {
    pub fn new(artifact: ArtifactKind, target_dir: PathBuf) -> Self {
        Self {
            artifact,
            target_dir,
            outcomes: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, result: Result<MergeOutcome, BucketError>) {
        match result {
            Ok(outcome) => self.outcomes.push(outcome),
            Err(err) => self.failures.push(err),
        }
    }

    pub fn created(&self) -> impl Iterator<Item = &MergeOutcome> {
        self.outcomes.iter().filter(|o| o.kind == OutcomeKind::Created)
    }

    pub fn updated(&self) -> impl Iterator<Item = &MergeOutcome> {
        self.outcomes.iter().filter(|o| o.kind == OutcomeKind::Updated)
    }

    pub fn failed(&self) -> &[BucketError] {
        &self.failures
    }

    pub fn rows_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.rows_written).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::MergeStage;
    use crate::store::StoreError;
    use std::path::Path;

    fn outcome(bucket: &str, kind: OutcomeKind, rows: usize) -> MergeOutcome {
        MergeOutcome {
            bucket: bucket.to_string(),
            artifact: ArtifactKind::GbaMain,
            kind,
            path: PathBuf::from(format!("/w/{}.xlsm", bucket)),
            start_row: 2,
            rows_written: rows,
            visibility: None,
        }
    }

    #[test]
    fn test_report_partitions_results() {
        let mut report = RunReport::new(ArtifactKind::GbaMain, PathBuf::from("/w"));
        report.record(Ok(outcome("Places", OutcomeKind::Created, 3)));
        report.record(Ok(outcome("Mobility", OutcomeKind::Updated, 2)));
        report.record(Err(BucketError::new(
            "Resilience",
            Path::new("/w/r.xlsm"),
            MergeStage::Save,
            StoreError::io("/w/r.xlsm", "locked"),
        )));

        assert_eq!(report.created().map(|o| o.bucket.as_str()).collect::<Vec<_>>(), vec!["Places"]);
        assert_eq!(report.updated().count(), 1);
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.rows_written(), 5);
        assert!(!report.is_success());
    }
}
