//! In-memory workbook document model shared by every store backend

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use super::protection::ProtectionKey;
use super::value::{CellRef, CellValue};
use super::xlsx::Origin;

/// Largest row/column Excel can address
pub const MAX_ROWS: u32 = 1_048_576;
pub const MAX_COLS: u32 = 16_384;

static EMPTY: CellValue = CellValue::Empty;

/// A whole workbook
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub sheets: Vec<Sheet>,
    /// Package the document was loaded from. Saving rewrites only the parts
    /// that changed and copies everything else byte for byte, VBA included.
    pub origin: Option<Arc<Origin>>,
}

impl Document {
    /// A fresh workbook with a single `Sheet1`
    pub fn new() -> Self {
        Self {
            sheets: vec![Sheet::new("Sheet1")],
            origin: None,
        }
    }

    #[cfg(test)]
    pub fn with_sheets(names: &[&str]) -> Self {
        Self {
            sheets: names.iter().map(|n| Sheet::new(n)).collect(),
            origin: None,
        }
    }

    /// Sheet names compare case-insensitively, as in Excel
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets
            .iter_mut()
            .find(|s| s.name.eq_ignore_ascii_case(name))
    }
}

/// A cell: cached value plus the formula that produced it, if any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub formula: Option<String>,
}

/// Excel table (ListObject): a header row over a rectangular block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub header_row: u32,
    pub first_col: u32,
    pub last_row: u32,
    /// Header captions in column order
    pub columns: Vec<String>,
    /// Calculated column formulas keyed by sheet column
    pub calculated: BTreeMap<u32, String>,
}

impl TableDef {
    pub fn last_col(&self) -> u32 {
        self.first_col + self.columns.len().saturating_sub(1) as u32
    }

    fn spans_cols(&self, first: u32, last: u32) -> bool {
        first <= self.last_col() && last >= self.first_col
    }
}

/// Options mirroring Excel's `Protect(password, DrawingObjects, Contents, Scenarios)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionFlags {
    pub drawing_objects: bool,
    pub contents: bool,
    pub scenarios: bool,
}

impl ProtectionFlags {
    pub const ALL: ProtectionFlags = ProtectionFlags {
        drawing_objects: true,
        contents: true,
        scenarios: true,
    };
}

impl Default for ProtectionFlags {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Protection {
    pub key: ProtectionKey,
    pub flags: ProtectionFlags,
}

impl Protection {
    pub fn new(passphrase: &str, flags: ProtectionFlags) -> Self {
        Self {
            key: ProtectionKey::from_passphrase(passphrase),
            flags,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<CellRef, Cell>,
    pub hidden_columns: BTreeSet<u32>,
    pub tables: Vec<TableDef>,
    pub protection: Option<Protection>,
    /// Inclusive column span that stays locked; `None` keeps Excel's default
    /// of every cell locked
    pub locked_columns: Option<(u32, u32)>,
    /// Index of the worksheet part this sheet was loaded from
    part: Option<usize>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub(super) fn part(&self) -> Option<usize> {
        self.part
    }

    pub(super) fn set_part(&mut self, index: usize) {
        self.part = Some(index);
    }

    pub fn value(&self, row: u32, col: u32) -> &CellValue {
        self.cells
            .get(&CellRef::new(row, col))
            .map(|c| &c.value)
            .unwrap_or(&EMPTY)
    }

    pub fn cell(&self, row: u32, col: u32) -> Option<&Cell> {
        self.cells.get(&CellRef::new(row, col))
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellRef, &Cell)> {
        self.cells.iter()
    }

    /// Store a plain value; writing `Empty` clears the cell
    pub fn set_value(&mut self, row: u32, col: u32, value: CellValue) {
        let key = CellRef::new(row, col);
        if value.is_empty() {
            self.cells.remove(&key);
        } else {
            self.cells.insert(key, Cell { value, formula: None });
        }
    }

    pub fn set_formula(&mut self, row: u32, col: u32, formula: &str) {
        let cell = self.cells.entry(CellRef::new(row, col)).or_default();
        cell.formula = Some(formula.to_string());
    }

    pub fn clear(&mut self, top_left: CellRef, bottom_right: CellRef) {
        self.cells.retain(|at, _| {
            !(at.row >= top_left.row
                && at.row <= bottom_right.row
                && at.col >= top_left.col
                && at.col <= bottom_right.col)
        });
    }

    /// Extend every table the block continues downwards, the way Excel
    /// auto-expands a table when rows are entered directly below it.
    /// Calculated columns the block does not cover get their formula.
    pub fn grow_tables(&mut self, top_left: CellRef, bottom_right: CellRef) {
        let mut formulas = Vec::new();
        for table in &mut self.tables {
            let continues = top_left.row > table.header_row
                && top_left.row <= table.last_row + 1
                && bottom_right.row > table.last_row;
            if !continues || !table.spans_cols(top_left.col, bottom_right.col) {
                continue;
            }

            for (&col, formula) in &table.calculated {
                if col < top_left.col || col > bottom_right.col {
                    for row in table.last_row + 1..=bottom_right.row {
                        formulas.push((row, col, formula.clone()));
                    }
                }
            }
            log::debug!(
                "Table '{}' grows from row {} to row {}",
                table.name,
                table.last_row,
                bottom_right.row
            );
            table.last_row = bottom_right.row;
        }

        for (row, col, formula) in formulas {
            self.set_formula(row, col, &formula);
        }
    }

    /// Last non-empty row in `col`, or 1 when the column is empty
    /// (Excel's `End(xlUp)` from the bottom of the sheet)
    pub fn last_row_in_col(&self, col: u32) -> u32 {
        self.cells
            .iter()
            .filter(|(at, cell)| at.col == col && !cell.is_vacant())
            .map(|(at, _)| at.row)
            .max()
            .unwrap_or(1)
    }

    /// Last non-empty column in `row`, or 1 when the row is empty
    /// (Excel's `End(xlToLeft)`)
    pub fn last_col_in_row(&self, row: u32) -> u32 {
        self.cells
            .iter()
            .filter(|(at, cell)| at.row == row && !cell.is_vacant())
            .map(|(at, _)| at.col)
            .max()
            .unwrap_or(1)
    }

    /// (max row, max col) over every populated cell; (0, 0) for an empty sheet
    pub fn extent(&self) -> (u32, u32) {
        self.cells
            .iter()
            .filter(|(_, cell)| !cell.is_vacant())
            .fold((0, 0), |(r, c), (at, _)| (r.max(at.row), c.max(at.col)))
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn is_locked(&self, col: u32) -> bool {
        match self.locked_columns {
            Some((first, last)) => col >= first && col <= last,
            None => true,
        }
    }

    pub fn is_protected(&self) -> bool {
        self.protection.is_some()
    }
}

impl Cell {
    fn is_vacant(&self) -> bool {
        self.value.is_empty() && self.formula.is_none()
    }
}
