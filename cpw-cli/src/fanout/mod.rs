//! Fan-out of classified records into per-bucket workbooks
//!
//! Each bucket owns one target artifact. The merger opens it (or creates it
//! from the template), finds where to append, writes the rows and saves.
//! A failure on one bucket is recorded in the [`RunReport`] and the next
//! bucket still runs; the workbook handle is closed on every path.

pub mod gba;
pub mod report;
pub mod team;

pub use gba::export_gba;
pub use report::RunReport;
pub use team::export_team;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::paths::{PathError, sanitize_file_name};
use crate::pfp::SnapshotError;
use crate::store::{StoreError, TabularStore, WorkbookHandle};
use crate::visibility::VisibilityReport;

/// Kind of per-bucket workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArtifactKind {
    GbaMain,
    TeamMain,
}

impl ArtifactKind {
    /// `CPW Tool_<bucket>_Main.xlsm` / `CPW Tool_<bucket>_Team.xlsm`
    pub fn file_name(&self, bucket: &str) -> String {
        let suffix = match self {
            ArtifactKind::GbaMain => "Main",
            ArtifactKind::TeamMain => "Team",
        };
        format!("CPW Tool_{}_{}.xlsm", sanitize_file_name(bucket), suffix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeKind {
    Created,
    Updated,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Created => write!(f, "created"),
            OutcomeKind::Updated => write!(f, "updated"),
        }
    }
}

/// Result of a successful bucket merge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub bucket: String,
    pub artifact: ArtifactKind,
    pub kind: OutcomeKind,
    pub path: PathBuf,
    /// First row written to
    pub start_row: u32,
    pub rows_written: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<VisibilityReport>,
}

/// Step of a bucket merge that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MergeStage {
    OpenTarget,
    OpenTemplate,
    Prepare,
    Write,
    Save,
}

impl std::fmt::Display for MergeStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeStage::OpenTarget => write!(f, "open workbook"),
            MergeStage::OpenTemplate => write!(f, "open template"),
            MergeStage::Prepare => write!(f, "prepare workbook"),
            MergeStage::Write => write!(f, "write rows"),
            MergeStage::Save => write!(f, "save workbook"),
        }
    }
}

/// Per-bucket artifact failure; sibling buckets are unaffected
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketError {
    pub bucket: String,
    pub path: PathBuf,
    pub stage: MergeStage,
    #[serde(serialize_with = "display")]
    pub error: StoreError,
}

impl BucketError {
    fn new(bucket: &str, path: &Path, stage: MergeStage, error: StoreError) -> Self {
        Self {
            bucket: bucket.to_string(),
            path: path.to_path_buf(),
            stage,
            error,
        }
    }
}

impl std::fmt::Display for BucketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: failed to {} {}: {}",
            self.bucket,
            self.stage,
            self.path.display(),
            self.error
        )
    }
}

impl std::error::Error for BucketError {}

fn display<T: std::fmt::Display, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Failure of a whole export run, before any bucket is touched
#[derive(Debug, Clone, PartialEq)]
pub enum ExportError {
    /// Nothing in the source classified into a bucket; nothing written
    NoMatchingRecords,
    Path(PathError),
    Source(SnapshotError),
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::NoMatchingRecords => write!(f, "No matching records found"),
            ExportError::Path(e) => write!(f, "{}", e),
            ExportError::Source(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ExportError {}

impl From<PathError> for ExportError {
    fn from(err: PathError) -> Self {
        ExportError::Path(err)
    }
}

impl From<SnapshotError> for ExportError {
    fn from(err: SnapshotError) -> Self {
        ExportError::Source(err)
    }
}

impl From<StoreError> for ExportError {
    fn from(err: StoreError) -> Self {
        ExportError::Source(SnapshotError::Store(err))
    }
}

/// Progress callbacks while buckets are merged
pub trait MergeObserver {
    fn bucket_started(&mut self, _bucket: &str, _index: usize, _total: usize) {}

    fn bucket_finished(&mut self, _result: &Result<MergeOutcome, BucketError>) {}
}

impl MergeObserver for () {}

/// Records grouped by bucket, buckets in order of first appearance
#[derive(Debug, Clone, PartialEq)]
pub struct Buckets<T> {
    groups: Vec<(String, Vec<T>)>,
    index: HashMap<String, usize>,
}

impl<T> Default for Buckets<T> {
    fn default() -> Self {
        Self {
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Buckets<T> {
    pub fn push(&mut self, bucket: &str, record: T) {
        let slot = match self.index.get(bucket) {
            Some(&i) => i,
            None => {
                self.index.insert(bucket.to_string(), self.groups.len());
                self.groups.push((bucket.to_string(), Vec::new()));
                self.groups.len() - 1
            }
        };
        self.groups[slot].1.push(record);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, bucket: &str) -> Option<&[T]> {
        self.index.get(bucket).map(|&i| self.groups[i].1.as_slice())
    }

    #[cfg(test)]
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.groups
            .iter()
            .map(|(name, records)| (name.as_str(), records.as_slice()))
    }
}

/// Merge every bucket in order, recording each result in `report`
fn run_buckets<T>(
    buckets: &Buckets<T>,
    report: &mut RunReport,
    observer: &mut dyn MergeObserver,
    mut merge: impl FnMut(&str, &[T]) -> Result<MergeOutcome, BucketError>,
) {
    let total = buckets.len();
    for (i, (bucket, records)) in buckets.iter().enumerate() {
        observer.bucket_started(bucket, i + 1, total);
        log::info!("Processing {} ({}/{}): {} records", bucket, i + 1, total, records.len());

        let result = merge(bucket, records);
        match &result {
            Ok(outcome) => log::info!(
                "{} {}: {} rows from row {}",
                outcome.kind,
                outcome.path.display(),
                outcome.rows_written,
                outcome.start_row
            ),
            Err(e) => log::error!("{}", e),
        }
        observer.bucket_finished(&result);
        report.record(result);
    }
}

/// Close `handle`, logging instead of failing; used after a bucket error
fn close_quietly<S: TabularStore + ?Sized>(store: &mut S, handle: WorkbookHandle) {
    if let Err(e) = store.close(handle) {
        log::warn!("Failed to close workbook {}: {}", handle, e);
    }
}

/// Ensure `sheet` exists in the workbook under exactly that name. A sheet
/// differing only in case is renamed; a missing one is added.
fn ensure_sheet<S: TabularStore + ?Sized>(
    store: &mut S,
    handle: WorkbookHandle,
    sheet: &str,
) -> Result<(), StoreError> {
    let existing = store
        .sheet_names(handle)?
        .into_iter()
        .find(|name| name.eq_ignore_ascii_case(sheet));
    match existing {
        Some(name) if name == sheet => {}
        Some(name) => {
            log::info!("Renaming sheet '{}' to '{}'", name, sheet);
            store.rename_sheet(handle, &name, sheet)?;
        }
        None => {
            log::info!("Sheet '{}' missing, adding it", sheet);
            store.add_sheet(handle, sheet)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_file_names() {
        assert_eq!(
            ArtifactKind::GbaMain.file_name("Enabling Function"),
            "CPW Tool_Enabling Function_Main.xlsm"
        );
        assert_eq!(
            ArtifactKind::TeamMain.file_name("Rail/Track"),
            "CPW Tool_Rail_Track_Team.xlsm"
        );
    }

    #[test]
    fn test_ensure_sheet_fixes_case_or_adds() {
        use crate::store::{Document, MemoryStore};

        let mut store = MemoryStore::new();
        store
            .files_mut()
            .insert("/w/book.xlsm", Document::with_sheets(&["oracle", "Cover"]));
        let handle = store.open(Path::new("/w/book.xlsm")).unwrap();

        ensure_sheet(&mut store, handle, "Oracle").unwrap();
        ensure_sheet(&mut store, handle, "Cover").unwrap();
        ensure_sheet(&mut store, handle, "Resource List").unwrap();
        assert_eq!(
            store.sheet_names(handle).unwrap(),
            vec!["Oracle", "Cover", "Resource List"]
        );
    }

    #[test]
    fn test_buckets_keep_first_appearance_order() {
        let mut buckets = Buckets::default();
        buckets.push("Places", 1);
        buckets.push("Mobility", 2);
        buckets.push("Places", 3);

        assert_eq!(buckets.names().collect::<Vec<_>>(), vec!["Places", "Mobility"]);
        assert_eq!(buckets.get("Places"), Some(&[1, 3][..]));
        assert_eq!(buckets.len(), 2);
    }

    #[test]
    fn test_bucket_error_serializes_message() {
        let err = BucketError::new(
            "Places",
            Path::new("/w/a.xlsm"),
            MergeStage::Save,
            StoreError::io("/w/a.xlsm", "disk full"),
        );
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["stage"], "Save");
        assert!(json["error"].as_str().unwrap().contains("disk full"));
        assert!(err.to_string().starts_with("Places: failed to save workbook"));
    }
}
