use std::path::PathBuf;

use super::WorkbookHandle;

/// Errors raised by a [`super::TabularStore`]
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// File could not be read or written
    Io { path: PathBuf, message: String },
    /// File was readable but not a workbook we understand
    Format { path: PathBuf, message: String },
    /// Handle was never issued or is already closed
    InvalidHandle(WorkbookHandle),
    /// A created workbook was saved without a target path
    NoPath(WorkbookHandle),
    SheetNotFound { sheet: String },
    DuplicateSheet { sheet: String },
    TableNotFound { sheet: String, table: String },
    /// Write attempted on locked cells of a protected sheet
    SheetProtected { sheet: String },
    WrongPassphrase { sheet: String },
    /// Row or column outside the addressable grid
    OutOfBounds { sheet: String, message: String },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StoreError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn format(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StoreError::Format {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn sheet_not_found(sheet: &str) -> Self {
        StoreError::SheetNotFound {
            sheet: sheet.to_string(),
        }
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Io { path, message } => {
                write!(f, "I/O error on '{}': {}", path.display(), message)
            }
            StoreError::Format { path, message } => {
                write!(f, "Invalid workbook '{}': {}", path.display(), message)
            }
            StoreError::InvalidHandle(handle) => {
                write!(f, "Workbook handle {} is not open", handle)
            }
            StoreError::NoPath(handle) => {
                write!(f, "Workbook handle {} has no file path - save it with a path first", handle)
            }
            StoreError::SheetNotFound { sheet } => write!(f, "Sheet '{}' not found", sheet),
            StoreError::DuplicateSheet { sheet } => write!(f, "Sheet '{}' already exists", sheet),
            StoreError::TableNotFound { sheet, table } => {
                write!(f, "Table '{}' not found on sheet '{}'", table, sheet)
            }
            StoreError::SheetProtected { sheet } => {
                write!(f, "Sheet '{}' is protected - unprotect it before writing", sheet)
            }
            StoreError::WrongPassphrase { sheet } => {
                write!(f, "Wrong passphrase for protected sheet '{}'", sheet)
            }
            StoreError::OutOfBounds { sheet, message } => {
                write!(f, "Out of bounds on sheet '{}': {}", sheet, message)
            }
        }
    }
}

impl std::error::Error for StoreError {}
