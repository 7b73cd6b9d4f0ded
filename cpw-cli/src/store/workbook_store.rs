//! [`TabularStore`] over the shared document model
//!
//! Backends only decide how a [`Document`] is loaded and persisted; handle
//! bookkeeping, protection rules and grid access live here once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::document::{Document, MAX_COLS, MAX_ROWS, Protection, ProtectionFlags, Sheet};
use super::{CellRef, CellValue, StoreError, TabularStore, WorkbookHandle};

/// How documents reach durable storage
pub trait Persistence {
    fn exists(&self, path: &Path) -> bool;
    fn load(&mut self, path: &Path) -> Result<Document, StoreError>;
    fn persist(&mut self, path: &Path, document: &Document) -> Result<(), StoreError>;
}

#[derive(Debug)]
struct OpenWorkbook {
    path: Option<PathBuf>,
    document: Document,
}

/// Handle table over a persistence backend
#[derive(Debug)]
pub struct WorkbookStore<P> {
    files: P,
    open: HashMap<WorkbookHandle, OpenWorkbook>,
    next_handle: u64,
}

impl<P: Persistence> WorkbookStore<P> {
    pub fn with_backend(files: P) -> Self {
        Self {
            files,
            open: HashMap::new(),
            next_handle: 1,
        }
    }

    pub fn files(&self) -> &P {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut P {
        &mut self.files
    }

    /// Number of handles not yet closed
    pub fn open_handles(&self) -> usize {
        self.open.len()
    }

    /// Direct access to an open document
    pub fn document(&self, handle: WorkbookHandle) -> Result<&Document, StoreError> {
        self.open
            .get(&handle)
            .map(|o| &o.document)
            .ok_or(StoreError::InvalidHandle(handle))
    }

    fn issue(&mut self, path: Option<PathBuf>, document: Document) -> WorkbookHandle {
        let handle = WorkbookHandle(self.next_handle);
        self.next_handle += 1;
        self.open.insert(handle, OpenWorkbook { path, document });
        handle
    }

    fn workbook_mut(&mut self, handle: WorkbookHandle) -> Result<&mut OpenWorkbook, StoreError> {
        self.open.get_mut(&handle).ok_or(StoreError::InvalidHandle(handle))
    }

    fn sheet(&self, handle: WorkbookHandle, sheet: &str) -> Result<&Sheet, StoreError> {
        self.document(handle)?
            .sheet(sheet)
            .ok_or_else(|| StoreError::sheet_not_found(sheet))
    }

    fn sheet_mut(&mut self, handle: WorkbookHandle, sheet: &str) -> Result<&mut Sheet, StoreError> {
        self.workbook_mut(handle)?
            .document
            .sheet_mut(sheet)
            .ok_or_else(|| StoreError::sheet_not_found(sheet))
    }
}

fn check_block(sheet: &str, top_left: CellRef, bottom_right: CellRef) -> Result<(), StoreError> {
    if top_left.row == 0 || top_left.col == 0 {
        return Err(StoreError::OutOfBounds {
            sheet: sheet.to_string(),
            message: format!(
                "coordinates are 1-based, got row {} col {}",
                top_left.row, top_left.col
            ),
        });
    }
    if bottom_right.row > MAX_ROWS || bottom_right.col > MAX_COLS {
        return Err(StoreError::OutOfBounds {
            sheet: sheet.to_string(),
            message: format!("{} is beyond the last addressable cell", bottom_right),
        });
    }
    Ok(())
}

/// Locked cells of a protected sheet reject edits
fn check_editable(sheet: &Sheet, first_col: u32, last_col: u32) -> Result<(), StoreError> {
    if sheet.is_protected() && (first_col..=last_col).any(|c| sheet.is_locked(c)) {
        return Err(StoreError::SheetProtected {
            sheet: sheet.name.clone(),
        });
    }
    Ok(())
}

impl<P: Persistence> TabularStore for WorkbookStore<P> {
    fn exists(&self, path: &Path) -> bool {
        self.files.exists(path)
    }

    fn open(&mut self, path: &Path) -> Result<WorkbookHandle, StoreError> {
        let document = self.files.load(path)?;
        log::debug!("Opened workbook {}", path.display());
        Ok(self.issue(Some(path.to_path_buf()), document))
    }

    fn create(&mut self) -> WorkbookHandle {
        self.issue(None, Document::new())
    }

    fn save(&mut self, handle: WorkbookHandle, path: Option<&Path>) -> Result<(), StoreError> {
        let workbook = self.open.get_mut(&handle).ok_or(StoreError::InvalidHandle(handle))?;
        let target = match path {
            Some(p) => p.to_path_buf(),
            None => workbook.path.clone().ok_or(StoreError::NoPath(handle))?,
        };
        self.files.persist(&target, &workbook.document)?;
        log::debug!("Saved workbook {} to {}", handle, target.display());
        workbook.path = Some(target);
        Ok(())
    }

    fn close(&mut self, handle: WorkbookHandle) -> Result<(), StoreError> {
        self.open
            .remove(&handle)
            .map(|_| ())
            .ok_or(StoreError::InvalidHandle(handle))
    }

    fn path_of(&self, handle: WorkbookHandle) -> Result<Option<PathBuf>, StoreError> {
        self.open
            .get(&handle)
            .map(|o| o.path.clone())
            .ok_or(StoreError::InvalidHandle(handle))
    }

    fn sheet_names(&self, handle: WorkbookHandle) -> Result<Vec<String>, StoreError> {
        Ok(self.document(handle)?.sheets.iter().map(|s| s.name.clone()).collect())
    }

    fn add_sheet(&mut self, handle: WorkbookHandle, name: &str) -> Result<(), StoreError> {
        let document = &mut self.workbook_mut(handle)?.document;
        if document.sheet(name).is_some() {
            return Err(StoreError::DuplicateSheet {
                sheet: name.to_string(),
            });
        }
        document.sheets.push(Sheet::new(name));
        Ok(())
    }

    fn rename_sheet(
        &mut self,
        handle: WorkbookHandle,
        from: &str,
        to: &str,
    ) -> Result<(), StoreError> {
        let document = &mut self.workbook_mut(handle)?.document;
        // Changing only the case of a name is not a clash
        if !from.eq_ignore_ascii_case(to) && document.sheet(to).is_some() {
            return Err(StoreError::DuplicateSheet {
                sheet: to.to_string(),
            });
        }
        let sheet = document
            .sheet_mut(from)
            .ok_or_else(|| StoreError::sheet_not_found(from))?;
        sheet.name = to.to_string();
        Ok(())
    }

    fn read_range(
        &self,
        handle: WorkbookHandle,
        sheet: &str,
        top_left: CellRef,
        bottom_right: CellRef,
    ) -> Result<Vec<Vec<CellValue>>, StoreError> {
        check_block(sheet, top_left, bottom_right)?;
        let sheet = self.sheet(handle, sheet)?;
        if bottom_right.row < top_left.row || bottom_right.col < top_left.col {
            return Ok(Vec::new());
        }
        Ok((top_left.row..=bottom_right.row)
            .map(|row| {
                (top_left.col..=bottom_right.col)
                    .map(|col| sheet.value(row, col).clone())
                    .collect()
            })
            .collect())
    }

    fn write_range(
        &mut self,
        handle: WorkbookHandle,
        sheet: &str,
        top_left: CellRef,
        values: &[Vec<CellValue>],
    ) -> Result<(), StoreError> {
        let width = values.iter().map(|r| r.len()).max().unwrap_or(0) as u32;
        if values.is_empty() || width == 0 {
            return Ok(());
        }
        let bottom_right = CellRef::new(
            top_left.row + values.len() as u32 - 1,
            top_left.col + width - 1,
        );
        check_block(sheet, top_left, bottom_right)?;

        let target = self.sheet_mut(handle, sheet)?;
        check_editable(target, top_left.col, bottom_right.col)?;
        for (r, row) in values.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                target.set_value(
                    top_left.row + r as u32,
                    top_left.col + c as u32,
                    value.clone(),
                );
            }
        }
        target.grow_tables(top_left, bottom_right);
        Ok(())
    }

    fn clear_range(
        &mut self,
        handle: WorkbookHandle,
        sheet: &str,
        top_left: CellRef,
        bottom_right: CellRef,
    ) -> Result<(), StoreError> {
        check_block(sheet, top_left, bottom_right)?;
        let target = self.sheet_mut(handle, sheet)?;
        check_editable(target, top_left.col, bottom_right.col)?;
        target.clear(top_left, bottom_right);
        Ok(())
    }

    fn last_used_row(
        &self,
        handle: WorkbookHandle,
        sheet: &str,
        col: u32,
    ) -> Result<u32, StoreError> {
        Ok(self.sheet(handle, sheet)?.last_row_in_col(col))
    }

    fn last_used_col(
        &self,
        handle: WorkbookHandle,
        sheet: &str,
        row: u32,
    ) -> Result<u32, StoreError> {
        Ok(self.sheet(handle, sheet)?.last_col_in_row(row))
    }

    fn used_extent(&self, handle: WorkbookHandle, sheet: &str) -> Result<(u32, u32), StoreError> {
        Ok(self.sheet(handle, sheet)?.extent())
    }

    fn find_header(
        &self,
        handle: WorkbookHandle,
        sheet: &str,
        header_row: u32,
        name: &str,
    ) -> Result<Option<u32>, StoreError> {
        let sheet = self.sheet(handle, sheet)?;
        let last_col = sheet.last_col_in_row(header_row);
        Ok((1..=last_col).find(|&col| sheet.value(header_row, col).to_string().trim() == name))
    }

    fn table_headers(
        &self,
        handle: WorkbookHandle,
        sheet: &str,
        table: &str,
    ) -> Result<Vec<(u32, String)>, StoreError> {
        let target = self.sheet(handle, sheet)?;
        let def = target.table(table).ok_or_else(|| StoreError::TableNotFound {
            sheet: sheet.to_string(),
            table: table.to_string(),
        })?;

        Ok(def
            .columns
            .iter()
            .enumerate()
            .map(|(i, caption)| {
                let col = def.first_col + i as u32;
                // The header cell is authoritative once someone edits it
                let cell = target.value(def.header_row, col);
                let header = if cell.is_blank() {
                    caption.clone()
                } else {
                    cell.to_string()
                };
                (col, header)
            })
            .collect())
    }

    fn set_column_hidden(
        &mut self,
        handle: WorkbookHandle,
        sheet: &str,
        col: u32,
        hidden: bool,
    ) -> Result<(), StoreError> {
        check_block(sheet, CellRef::new(1, col), CellRef::new(1, col))?;
        let target = self.sheet_mut(handle, sheet)?;
        if hidden {
            target.hidden_columns.insert(col);
        } else {
            target.hidden_columns.remove(&col);
        }
        Ok(())
    }

    fn is_column_hidden(
        &self,
        handle: WorkbookHandle,
        sheet: &str,
        col: u32,
    ) -> Result<bool, StoreError> {
        Ok(self.sheet(handle, sheet)?.hidden_columns.contains(&col))
    }

    fn protect(
        &mut self,
        handle: WorkbookHandle,
        sheet: &str,
        passphrase: &str,
        flags: ProtectionFlags,
    ) -> Result<(), StoreError> {
        let target = self.sheet_mut(handle, sheet)?;
        target.protection = Some(Protection::new(passphrase, flags));
        Ok(())
    }

    fn unprotect(
        &mut self,
        handle: WorkbookHandle,
        sheet: &str,
        passphrase: &str,
    ) -> Result<(), StoreError> {
        let target = self.sheet_mut(handle, sheet)?;
        if matches!(&target.protection, Some(p) if !p.key.matches(passphrase)) {
            return Err(StoreError::WrongPassphrase {
                sheet: sheet.to_string(),
            });
        }
        target.protection = None;
        Ok(())
    }

    fn is_protected(&self, handle: WorkbookHandle, sheet: &str) -> Result<bool, StoreError> {
        Ok(self.sheet(handle, sheet)?.is_protected())
    }

    fn set_locked_columns(
        &mut self,
        handle: WorkbookHandle,
        sheet: &str,
        first: u32,
        last: u32,
    ) -> Result<(), StoreError> {
        check_block(sheet, CellRef::new(1, first), CellRef::new(1, last))?;
        let target = self.sheet_mut(handle, sheet)?;
        if target.is_protected() {
            return Err(StoreError::SheetProtected {
                sheet: sheet.to_string(),
            });
        }
        target.locked_columns = Some((first.min(last), first.max(last)));
        Ok(())
    }
}
