//! Tabular storage behind the fan-out engine
//!
//! The workflow never touches spreadsheet files directly; everything goes
//! through [`TabularStore`]. Two backends share one document model:
//! - `MemoryStore` keeps documents in a map (tests only)
//! - [`XlsxStore`] reads xlsx/xlsm files and saves them back in place,
//!   patching only the parts that changed
//!
//! Coordinates are 1-based (`CellRef::new(1, 1)` is `A1`).

mod document;
mod error;
#[cfg(test)]
mod memory;
mod protection;
mod value;
mod workbook_store;
mod xlsx;

use std::path::{Path, PathBuf};

pub use document::{Document, Protection, ProtectionFlags, TableDef};
pub use error::StoreError;
#[cfg(test)]
pub use memory::MemoryStore;
pub use value::{CellRef, CellValue, format_number};
pub use xlsx::XlsxStore;

/// Opaque token for an open workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkbookHandle(pub(crate) u64);

impl std::fmt::Display for WorkbookHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Row/column storage with an open/save/close lifecycle
pub trait TabularStore {
    fn exists(&self, path: &Path) -> bool;

    fn open(&mut self, path: &Path) -> Result<WorkbookHandle, StoreError>;

    /// Start a blank workbook containing `Sheet1`; it has no path until saved
    fn create(&mut self) -> WorkbookHandle;

    /// Persist the workbook. Passing a path behaves like "Save As": the
    /// handle is re-targeted and later path-less saves go there.
    fn save(&mut self, handle: WorkbookHandle, path: Option<&Path>) -> Result<(), StoreError>;

    fn close(&mut self, handle: WorkbookHandle) -> Result<(), StoreError>;

    fn path_of(&self, handle: WorkbookHandle) -> Result<Option<PathBuf>, StoreError>;

    fn sheet_names(&self, handle: WorkbookHandle) -> Result<Vec<String>, StoreError>;

    fn has_sheet(&self, handle: WorkbookHandle, sheet: &str) -> Result<bool, StoreError> {
        Ok(self
            .sheet_names(handle)?
            .iter()
            .any(|s| s.eq_ignore_ascii_case(sheet)))
    }

    fn add_sheet(&mut self, handle: WorkbookHandle, name: &str) -> Result<(), StoreError>;

    fn rename_sheet(
        &mut self,
        handle: WorkbookHandle,
        from: &str,
        to: &str,
    ) -> Result<(), StoreError>;

    /// Read the inclusive block `top_left..=bottom_right` row by row
    fn read_range(
        &self,
        handle: WorkbookHandle,
        sheet: &str,
        top_left: CellRef,
        bottom_right: CellRef,
    ) -> Result<Vec<Vec<CellValue>>, StoreError>;

    /// Write a row-major block starting at `top_left`
    fn write_range(
        &mut self,
        handle: WorkbookHandle,
        sheet: &str,
        top_left: CellRef,
        values: &[Vec<CellValue>],
    ) -> Result<(), StoreError>;

    fn clear_range(
        &mut self,
        handle: WorkbookHandle,
        sheet: &str,
        top_left: CellRef,
        bottom_right: CellRef,
    ) -> Result<(), StoreError>;

    /// Last used row in `col`, 1 when the column is empty
    fn last_used_row(
        &self,
        handle: WorkbookHandle,
        sheet: &str,
        col: u32,
    ) -> Result<u32, StoreError>;

    /// Last used column in `row`, 1 when the row is empty
    fn last_used_col(
        &self,
        handle: WorkbookHandle,
        sheet: &str,
        row: u32,
    ) -> Result<u32, StoreError>;

    /// (max row, max col) over populated cells, (0, 0) when empty
    fn used_extent(&self, handle: WorkbookHandle, sheet: &str) -> Result<(u32, u32), StoreError>;

    /// Column whose trimmed header in `header_row` equals `name`
    fn find_header(
        &self,
        handle: WorkbookHandle,
        sheet: &str,
        header_row: u32,
        name: &str,
    ) -> Result<Option<u32>, StoreError>;

    /// `(sheet column, caption)` for every column of a named table
    fn table_headers(
        &self,
        handle: WorkbookHandle,
        sheet: &str,
        table: &str,
    ) -> Result<Vec<(u32, String)>, StoreError>;

    fn set_column_hidden(
        &mut self,
        handle: WorkbookHandle,
        sheet: &str,
        col: u32,
        hidden: bool,
    ) -> Result<(), StoreError>;

    fn is_column_hidden(
        &self,
        handle: WorkbookHandle,
        sheet: &str,
        col: u32,
    ) -> Result<bool, StoreError>;

    fn protect(
        &mut self,
        handle: WorkbookHandle,
        sheet: &str,
        passphrase: &str,
        flags: ProtectionFlags,
    ) -> Result<(), StoreError>;

    fn unprotect(
        &mut self,
        handle: WorkbookHandle,
        sheet: &str,
        passphrase: &str,
    ) -> Result<(), StoreError>;

    fn is_protected(&self, handle: WorkbookHandle, sheet: &str) -> Result<bool, StoreError>;

    /// Lock exactly the inclusive column span `first..=last`, unlock the rest
    fn set_locked_columns(
        &mut self,
        handle: WorkbookHandle,
        sheet: &str,
        first: u32,
        last: u32,
    ) -> Result<(), StoreError>;
}

/// Run `body` against an open workbook and always close it afterwards,
/// whether `body` succeeded or not. A close failure after a successful body
/// is logged, not raised: the body's own result wins.
pub fn with_open<S, T, E>(
    store: &mut S,
    handle: WorkbookHandle,
    body: impl FnOnce(&mut S, WorkbookHandle) -> Result<T, E>,
) -> Result<T, E>
where
    S: TabularStore + ?Sized,
{
    let result = body(store, handle);
    if let Err(err) = store.close(handle) {
        log::warn!("Failed to close workbook {}: {}", handle, err);
    }
    result
}
