//! xlsx/xlsm persistence
//!
//! Cell values and formulas are read with calamine. The package structure
//! (worksheet parts, tables, styles, protection) is kept from the source zip
//! so that saving can patch only what changed: formatting, merged cells,
//! data validation, defined names and the VBA project all come through a
//! save untouched. Workbooks created in memory are written with
//! rust_xlsxwriter.

mod fresh;
mod package;
mod save;
mod sheet_xml;
mod styles;
mod xml;

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use calamine::{Reader, SheetType, Xlsx};

pub use package::Origin;

use super::document::{Document, Sheet};
use super::workbook_store::{Persistence, WorkbookStore};
use super::{CellValue, StoreError};

pub type XlsxStore = WorkbookStore<XlsxFiles>;

/// Workbooks on the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxFiles;

impl XlsxStore {
    pub fn new() -> Self {
        WorkbookStore::with_backend(XlsxFiles)
    }
}

impl Default for XlsxStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Persistence for XlsxFiles {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn load(&mut self, path: &Path) -> Result<Document, StoreError> {
        read_document(path)
    }

    fn persist(&mut self, path: &Path, document: &Document) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
            }
        }
        match &document.origin {
            Some(origin) => save::save_patched(path, origin, document),
            None => fresh::save_fresh(path, document),
        }
    }
}

fn read_document(path: &Path) -> Result<Document, StoreError> {
    if !path.is_file() {
        return Err(StoreError::io(path, "No such file"));
    }

    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    let mut origin = Origin::read(bytes).map_err(|e| StoreError::format(path, e))?;
    let sheets = load_cells(path, &origin)?;

    let mut loaded = Vec::with_capacity(sheets.len());
    for (index, mut sheet) in sheets {
        origin.sheets[index].baseline = sheet.clone();
        sheet.set_part(index);
        loaded.push(sheet);
    }
    log::debug!("Loaded {} sheets from {}", loaded.len(), path.display());

    Ok(Document {
        sheets: loaded,
        origin: Some(Arc::new(origin)),
    })
}

/// Worksheets with their cells, each paired with its part in `origin`
fn load_cells(path: &Path, origin: &Origin) -> Result<Vec<(usize, Sheet)>, StoreError> {
    let mut workbook =
        Xlsx::new(Cursor::new(origin.bytes())).map_err(|e| StoreError::format(path, e))?;
    let names: Vec<String> = workbook
        .sheets_metadata()
        .iter()
        .filter(|s| matches!(s.typ, SheetType::WorkSheet))
        .map(|s| s.name.clone())
        .collect();

    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let Some(index) = origin.sheets.iter().position(|s| s.baseline.name == name) else {
            return Err(StoreError::format(
                path,
                format!("sheet '{}' has no worksheet part", name),
            ));
        };
        let mut sheet = origin.sheets[index].baseline.clone();

        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| StoreError::format(path, format!("sheet '{}': {}", name, e)))?;
        if let Some((row0, col0)) = range.start() {
            for (r, c, data) in range.used_cells() {
                sheet.set_value(row0 + r as u32 + 1, col0 + c as u32 + 1, CellValue::from(data));
            }
        }

        // Formulas are optional; a workbook without them still loads
        if let Ok(formulas) = workbook.worksheet_formula(&name) {
            if let Some((row0, col0)) = formulas.start() {
                for (r, c, formula) in formulas.used_cells() {
                    if !formula.is_empty() {
                        sheet.set_formula(row0 + r as u32 + 1, col0 + c as u32 + 1, formula);
                    }
                }
            }
        }

        sheets.push((index, sheet));
    }
    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::{Read, Write};
    use std::path::PathBuf;

    use rust_xlsxwriter::{DataValidation, Format, Table, TableColumn, Workbook};

    use super::*;
    use crate::store::{CellRef, ProtectionFlags, TabularStore};

    fn part(path: &Path, name: &str) -> Vec<u8> {
        let mut archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut entry = archive.by_name(name).unwrap();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).unwrap();
        bytes
    }

    fn part_text(path: &Path, name: &str) -> String {
        String::from_utf8(part(path, name)).unwrap()
    }

    /// An Oracle sheet the way the team maintains it: bold header, a wide
    /// code column, a merged banner, a Yes/No list and a protected grid
    fn formatted_workbook(dir: &Path) -> PathBuf {
        let path = dir.join("Oracle.xlsx");
        let mut workbook = Workbook::new();
        let bold = Format::new().set_bold();
        let ws = workbook.add_worksheet();
        ws.set_name("Oracle").unwrap();
        ws.write_string_with_format(0, 0, "Unique Code", &bold).unwrap();
        ws.write_string(1, 0, "1234 - Alice").unwrap();
        ws.set_column_width(0, 30).unwrap();
        ws.merge_range(3, 0, 3, 2, "Quarter plan", &Format::new()).unwrap();
        let choices = DataValidation::new().allow_list_strings(&["Yes", "No"]).unwrap();
        ws.add_data_validation(1, 1, 10, 1, &choices).unwrap();
        ws.protect_with_password("1234");
        workbook.define_name("Codes", "=Oracle!$A$2:$A$10").unwrap();
        workbook.save(&path).unwrap();
        path
    }

    #[test]
    fn test_save_and_reload_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("snapshot.xlsx");

        let mut store = XlsxStore::new();
        let handle = store.create();
        store
            .write_range(
                handle,
                "Sheet1",
                CellRef::new(1, 1),
                &[
                    vec![CellValue::text("Unique Code"), CellValue::text("Project Number")],
                    vec![CellValue::text("1234 - Alice"), CellValue::Number(1234.0)],
                ],
            )
            .unwrap();
        store.add_sheet(handle, "Oracle").unwrap();
        store.set_column_hidden(handle, "Oracle", 3, true).unwrap();
        store.protect(handle, "Oracle", "1234", ProtectionFlags::ALL).unwrap();
        store.save(handle, Some(&path)).unwrap();
        store.close(handle).unwrap();

        assert!(store.exists(&path));
        let reopened = store.open(&path).unwrap();
        assert_eq!(
            store.sheet_names(reopened).unwrap(),
            vec!["Sheet1".to_string(), "Oracle".to_string()]
        );
        let block = store
            .read_range(reopened, "Sheet1", CellRef::new(2, 1), CellRef::new(2, 2))
            .unwrap();
        assert_eq!(block[0][0], CellValue::text("1234 - Alice"));
        assert_eq!(block[0][1], CellValue::Number(1234.0));
        assert!(store.is_protected(reopened, "Oracle").unwrap());
        assert!(store.is_column_hidden(reopened, "Oracle", 3).unwrap());
        assert!(!store.is_column_hidden(reopened, "Oracle", 2).unwrap());
        store.close(reopened).unwrap();
    }

    #[test]
    fn test_open_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = XlsxStore::new();
        let result = store.open(&dir.path().join("absent.xlsm"));
        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert_eq!(store.open_handles(), 0);
    }

    #[test]
    fn test_formatting_survives_edit_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = formatted_workbook(dir.path());

        let mut store = XlsxStore::new();
        let handle = store.open(&path).unwrap();
        assert!(store.is_protected(handle, "Oracle").unwrap());
        assert!(store.unprotect(handle, "Oracle", "4321").is_err());
        store.unprotect(handle, "Oracle", "1234").unwrap();
        store
            .write_range(handle, "Oracle", CellRef::new(2, 2), &[vec![CellValue::text("Yes")]])
            .unwrap();
        store.protect(handle, "Oracle", "1234", ProtectionFlags::ALL).unwrap();
        store.save(handle, None).unwrap();
        store.close(handle).unwrap();

        let sheet = part_text(&path, "xl/worksheets/sheet1.xml");
        assert!(sheet.contains("<mergeCell ref=\"A4:C4\""));
        assert!(sheet.contains("<dataValidation "));
        assert!(sheet.contains("customWidth=\"1\""));
        assert!(sheet.contains("<c r=\"A1\" s=\"1\""));
        assert!(sheet.contains("<sheetProtection password=\"CC3D\""));
        assert!(part_text(&path, "xl/workbook.xml").contains("<definedName name=\"Codes\""));

        let reopened = store.open(&path).unwrap();
        let block = store
            .read_range(reopened, "Oracle", CellRef::new(1, 1), CellRef::new(2, 2))
            .unwrap();
        assert_eq!(block[0][0], CellValue::text("Unique Code"));
        assert_eq!(block[1][0], CellValue::text("1234 - Alice"));
        assert_eq!(block[1][1], CellValue::text("Yes"));
        assert!(store.is_protected(reopened, "Oracle").unwrap());
        store.close(reopened).unwrap();
    }

    #[test]
    fn test_macro_project_is_copied_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("vbaProject.bin");
        let macro_bytes = b"\xd0\xcf\x11\xe0 compiled macro project".to_vec();
        File::create(&project).unwrap().write_all(&macro_bytes).unwrap();

        let path = dir.path().join("PFP.xlsm");
        let mut workbook = Workbook::new();
        workbook.add_worksheet().write_string(0, 0, "Unique Code").unwrap();
        workbook.add_vba_project(&project).unwrap();
        workbook.save(&path).unwrap();

        let mut store = XlsxStore::new();
        let handle = store.open(&path).unwrap();
        let row = [vec![CellValue::text("1234 - Alice")]];
        store.write_range(handle, "Sheet1", CellRef::new(2, 1), &row).unwrap();
        store.save(handle, None).unwrap();
        store.close(handle).unwrap();

        assert_eq!(part(&path, "xl/vbaProject.bin"), macro_bytes);
        assert!(part_text(&path, "[Content_Types].xml").contains("vbaProject"));
    }

    #[test]
    fn test_grown_table_range_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Project.xlsx");
        let mut workbook = Workbook::new();
        let ws = workbook.add_worksheet();
        let columns: Vec<TableColumn> = ["Index", "Code", "Name", "Week"]
            .iter()
            .map(|caption| TableColumn::new().set_header(*caption))
            .collect();
        let table = Table::new().set_name("ProjectRaw6").set_columns(&columns);
        ws.add_table(3, 1, 6, 4, &table).unwrap();
        workbook.save(&path).unwrap();

        let mut store = XlsxStore::new();
        let handle = store.open(&path).unwrap();
        let rows: Vec<Vec<CellValue>> = (1..=6u32)
            .map(|i| {
                vec![
                    CellValue::from(i),
                    CellValue::text(format!("{} - Alice", 1000 + i)),
                    CellValue::text("Alice"),
                    CellValue::Number(2.0),
                ]
            })
            .collect();
        store.write_range(handle, "Sheet1", CellRef::new(5, 2), &rows).unwrap();
        store.save(handle, None).unwrap();
        store.close(handle).unwrap();

        let reopened = store.open(&path).unwrap();
        let document = store.document(reopened).unwrap();
        let def = document.sheet("Sheet1").and_then(|s| s.table("ProjectRaw6")).unwrap();
        assert_eq!((def.header_row, def.first_col, def.last_row), (4, 2, 10));
        let headers = store.table_headers(reopened, "Sheet1", "ProjectRaw6").unwrap();
        assert_eq!(headers[3], (5, "Week".to_string()));
        store.close(reopened).unwrap();
    }

    #[test]
    fn test_sheet_added_to_loaded_workbook_is_saved() {
        let dir = tempfile::tempdir().unwrap();
        let path = formatted_workbook(dir.path());

        let mut store = XlsxStore::new();
        let handle = store.open(&path).unwrap();
        store.add_sheet(handle, "Team").unwrap();
        store
            .write_range(handle, "Team", CellRef::new(1, 1), &[vec![CellValue::text("Resource")]])
            .unwrap();
        store.save(handle, None).unwrap();
        store.close(handle).unwrap();

        let reopened = store.open(&path).unwrap();
        assert_eq!(
            store.sheet_names(reopened).unwrap(),
            vec!["Oracle".to_string(), "Team".to_string()]
        );
        let block = store
            .read_range(reopened, "Team", CellRef::new(1, 1), CellRef::new(1, 1))
            .unwrap();
        assert_eq!(block[0][0], CellValue::text("Resource"));
        assert!(store.is_protected(reopened, "Oracle").unwrap());
        store.close(reopened).unwrap();
    }
}
