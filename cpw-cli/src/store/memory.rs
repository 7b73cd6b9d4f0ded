//! Map-backed persistence for tests

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::document::Document;
use super::workbook_store::{Persistence, WorkbookStore};
use super::StoreError;

pub type MemoryStore = WorkbookStore<MemoryFiles>;

/// "Files" held in memory, keyed by path
#[derive(Debug, Default)]
pub struct MemoryFiles {
    documents: HashMap<PathBuf, Document>,
    failing_saves: HashSet<PathBuf>,
    failing_opens: HashSet<PathBuf>,
}

impl MemoryFiles {
    pub fn insert(&mut self, path: impl Into<PathBuf>, document: Document) {
        self.documents.insert(path.into(), document);
    }

    pub fn get(&self, path: &Path) -> Option<&Document> {
        self.documents.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.documents.keys()
    }

    /// Make every save to `path` fail with an I/O error
    pub fn fail_saves_to(&mut self, path: impl Into<PathBuf>) {
        self.failing_saves.insert(path.into());
    }

    /// Make every open of `path` fail with an I/O error
    pub fn fail_opens_of(&mut self, path: impl Into<PathBuf>) {
        self.failing_opens.insert(path.into());
    }
}

impl Persistence for MemoryFiles {
    fn exists(&self, path: &Path) -> bool {
        self.documents.contains_key(path)
    }

    fn load(&mut self, path: &Path) -> Result<Document, StoreError> {
        if self.failing_opens.contains(path) {
            return Err(StoreError::io(path, "simulated open failure"));
        }
        self.documents
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::io(path, "No such file"))
    }

    fn persist(&mut self, path: &Path, document: &Document) -> Result<(), StoreError> {
        if self.failing_saves.contains(path) {
            return Err(StoreError::io(path, "simulated save failure"));
        }
        self.documents.insert(path.to_path_buf(), document.clone());
        Ok(())
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        WorkbookStore::with_backend(MemoryFiles::default())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CellRef, CellValue, ProtectionFlags, TabularStore, with_open};

    fn store_with(path: &str, sheets: &[&str]) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.files_mut().insert(path, Document::with_sheets(sheets));
        store
    }

    #[test]
    fn test_open_write_save_roundtrip() {
        let mut store = store_with("/w/book.xlsm", &["Data"]);
        let path = Path::new("/w/book.xlsm");

        let handle = store.open(path).unwrap();
        store
            .write_range(
                handle,
                "Data",
                CellRef::new(2, 1),
                &[vec![CellValue::text("a"), CellValue::Number(1.0)]],
            )
            .unwrap();
        store.save(handle, None).unwrap();
        store.close(handle).unwrap();

        let saved = store.files().get(path).unwrap();
        assert_eq!(saved.sheet("Data").unwrap().value(2, 2), &CellValue::Number(1.0));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn test_save_as_retargets_handle_and_keeps_template() {
        let mut store = store_with("/t/template.xlsm", &["Data"]);
        let handle = store.open(Path::new("/t/template.xlsm")).unwrap();
        store
            .write_range(handle, "Data", CellRef::new(1, 1), &[vec![CellValue::text("x")]])
            .unwrap();
        store.save(handle, Some(Path::new("/t/copy.xlsm"))).unwrap();
        store.save(handle, None).unwrap();

        assert_eq!(
            store.path_of(handle).unwrap(),
            Some(PathBuf::from("/t/copy.xlsm"))
        );
        let template = store.files().get(Path::new("/t/template.xlsm")).unwrap();
        assert!(template.sheet("Data").unwrap().value(1, 1).is_empty());
    }

    #[test]
    fn test_protected_sheet_rejects_writes_to_locked_cells() {
        let mut store = store_with("/w/book.xlsm", &["Oracle"]);
        let handle = store.open(Path::new("/w/book.xlsm")).unwrap();
        store.set_locked_columns(handle, "Oracle", 1, 27).unwrap();
        store.protect(handle, "Oracle", "1234", ProtectionFlags::ALL).unwrap();

        let cell = [vec![CellValue::text("x")]];
        let locked = store.write_range(handle, "Oracle", CellRef::new(5, 2), &cell);
        assert!(matches!(locked, Err(StoreError::SheetProtected { .. })));

        let unlocked = store.write_range(handle, "Oracle", CellRef::new(5, 30), &cell);
        assert!(unlocked.is_ok());

        assert!(matches!(
            store.unprotect(handle, "Oracle", "wrong"),
            Err(StoreError::WrongPassphrase { .. })
        ));
        store.unprotect(handle, "Oracle", "1234").unwrap();
        assert!(!store.is_protected(handle, "Oracle").unwrap());
    }

    #[test]
    fn test_with_open_closes_on_error() {
        let mut store = store_with("/w/book.xlsm", &["Data"]);
        let handle = store.open(Path::new("/w/book.xlsm")).unwrap();

        let result: Result<(), StoreError> = with_open(&mut store, handle, |s, h| {
            s.read_range(h, "Missing", CellRef::new(1, 1), CellRef::new(1, 1))?;
            Ok(())
        });

        assert!(matches!(result, Err(StoreError::SheetNotFound { .. })));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn test_failing_save_is_reported() {
        let mut store = store_with("/w/book.xlsm", &["Data"]);
        store.files_mut().fail_saves_to("/w/book.xlsm");
        let handle = store.open(Path::new("/w/book.xlsm")).unwrap();
        assert!(matches!(store.save(handle, None), Err(StoreError::Io { .. })));
        store.close(handle).unwrap();
        assert!(matches!(store.close(handle), Err(StoreError::InvalidHandle(_))));
    }

    #[test]
    fn test_find_header_matches_trimmed_text() {
        let mut store = store_with("/w/book.xlsx", &["Sheet1"]);
        let handle = store.open(Path::new("/w/book.xlsx")).unwrap();
        store
            .write_range(
                handle,
                "Sheet1",
                CellRef::new(1, 1),
                &[vec![CellValue::text("Unique Code"), CellValue::text(" Project Number ")]],
            )
            .unwrap();

        assert_eq!(store.find_header(handle, "Sheet1", 1, "Project Number").unwrap(), Some(2));
        assert_eq!(store.find_header(handle, "Sheet1", 1, "Employee Name").unwrap(), None);
    }
}
