//! Project Financial Plan snapshots
//!
//! A snapshot is one weekly extract: a fixed header plus ordered rows.
//! - `identity`: unique codes and the three-stage cleaning pass
//! - `diff`: records that appeared since an earlier snapshot
//! - `io`: reading/writing snapshots through a [`crate::store::TabularStore`]

pub mod diff;
pub mod identity;
pub mod io;

pub use diff::{DiffStats, diff_new};
pub use identity::{CLEANING_STAGES, CleaningStats, assign_identity, clean};
pub use io::{read_snapshot, write_snapshot};

use crate::store::{CellValue, StoreError};

/// Header captions used by the PFP extract and the workbooks built from it
pub mod columns {
    pub const UNIQUE_CODE: &str = "Unique Code";
    pub const PROJECT_NUMBER: &str = "Project Number";
    pub const PROJECT_NAME: &str = "Project Name";
    pub const EMPLOYEE_NAME: &str = "Employee Name";
    pub const RESOURCE_NAME: &str = "Resource Name";
    pub const ORGANIZATION_NAME: &str = "Expenditure Organization Name";
    pub const ORACLE_DATE: &str = "Oracle Date";
    pub const INDEX: &str = "Index";
    pub const DEPARTMENT_NAME: &str = "Department Name";
}

static EMPTY: CellValue = CellValue::Empty;

/// Error while reading or transforming a snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotError {
    /// A column the step depends on is absent from the header
    MissingColumn { column: String },
    /// Workbook has no sheet to read
    NoSheets,
    Store(StoreError),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::MissingColumn { column } => {
                write!(f, "Required column '{}' not found in header", column)
            }
            SnapshotError::NoSheets => write!(f, "Workbook has no sheets"),
            SnapshotError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SnapshotError {}

impl From<StoreError> for SnapshotError {
    fn from(err: StoreError) -> Self {
        SnapshotError::Store(err)
    }
}

/// Ordered rows under a fixed header
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Snapshot {
    /// Rows shorter than the header are padded with empty cells
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                if row.len() < width {
                    row.resize(width, CellValue::Empty);
                }
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the column whose trimmed caption equals `name`
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize, SnapshotError> {
        self.column(name).ok_or_else(|| SnapshotError::MissingColumn {
            column: name.to_string(),
        })
    }

    pub fn value(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&EMPTY)
    }

    /// Keep the rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> Snapshot {
        Snapshot {
            headers: self.headers.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }
}
