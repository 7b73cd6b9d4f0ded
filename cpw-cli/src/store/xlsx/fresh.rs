//! Writing a workbook that was created in memory and never loaded from disk

use std::path::Path;

use rust_xlsxwriter::{
    Format, ProtectionOptions, Table, TableColumn, Workbook, Worksheet, XlsxError,
};

use crate::store::document::{Document, MAX_COLS, Sheet, TableDef};
use crate::store::protection::ProtectionKey;
use crate::store::{CellValue, StoreError};

const DATE_FORMAT: &str = "yyyy-mm-dd hh:mm:ss";

pub fn save_fresh(path: &Path, document: &Document) -> Result<(), StoreError> {
    let mut workbook = Workbook::new();
    for sheet in &document.sheets {
        let worksheet = workbook.add_worksheet();
        write_sheet(worksheet, sheet).map_err(|e| StoreError::format(path, e))?;
    }
    workbook.save(path).map_err(|e| StoreError::io(path, e))?;
    Ok(())
}

fn write_sheet(ws: &mut Worksheet, sheet: &Sheet) -> Result<(), XlsxError> {
    ws.set_name(&sheet.name)?;

    let locked = Format::new();
    let unlocked = Format::new().set_unlocked();
    let locked_date = Format::new().set_num_format(DATE_FORMAT);
    let unlocked_date = Format::new().set_num_format(DATE_FORMAT).set_unlocked();

    for (at, cell) in sheet.cells() {
        let row = at.row - 1;
        let col = (at.col - 1) as u16;
        let is_locked = sheet.is_locked(at.col);
        let format = if is_locked { &locked } else { &unlocked };

        if let Some(formula) = &cell.formula {
            ws.write_formula_with_format(row, col, formula.as_str(), format)?;
            continue;
        }
        match &cell.value {
            CellValue::Empty => {}
            CellValue::String(s) | CellValue::Error(s) => {
                ws.write_string_with_format(row, col, s, format)?;
            }
            CellValue::Number(n) => {
                ws.write_number_with_format(row, col, *n, format)?;
            }
            CellValue::Bool(b) => {
                ws.write_boolean_with_format(row, col, *b, format)?;
            }
            CellValue::DateTime(serial) => {
                let date = if is_locked { &locked_date } else { &unlocked_date };
                ws.write_number_with_format(row, col, *serial, date)?;
            }
        }
    }

    // Outside the locked span, empty cells of the used width are editable too
    if let Some((first, last)) = sheet.locked_columns {
        let (_, used_cols) = sheet.extent();
        for col in 1..=used_cols.max(last + 1).min(MAX_COLS) {
            if col < first || col > last {
                ws.set_column_format((col - 1) as u16, &unlocked)?;
            }
        }
    }

    for col in &sheet.hidden_columns {
        ws.set_column_hidden((*col - 1) as u16)?;
    }

    for def in &sheet.tables {
        write_table(ws, def)?;
    }

    if let Some(protection) = &sheet.protection {
        let mut options = ProtectionOptions::new();
        options.edit_objects = !protection.flags.drawing_objects;
        options.edit_scenarios = !protection.flags.scenarios;
        ws.protect_with_options(&options);
        match &protection.key {
            ProtectionKey::Passphrase(passphrase) => {
                ws.protect_with_password(passphrase);
            }
            ProtectionKey::Open => {}
            ProtectionKey::Legacy(_) | ProtectionKey::Hashed { .. } => {
                log::warn!(
                    "Sheet '{}' keeps its protection but loses its stored password",
                    sheet.name
                );
            }
        }
    }

    Ok(())
}

fn write_table(ws: &mut Worksheet, def: &TableDef) -> Result<(), XlsxError> {
    let columns: Vec<TableColumn> = def
        .columns
        .iter()
        .map(|caption| TableColumn::new().set_header(caption))
        .collect();
    let table = Table::new().set_name(&def.name).set_columns(&columns);

    // A table needs at least one data row under its header
    let last_row = def.last_row.max(def.header_row + 1);
    ws.add_table(
        def.header_row - 1,
        (def.first_col - 1) as u16,
        last_row - 1,
        (def.last_col() - 1) as u16,
        &table,
    )?;
    Ok(())
}
