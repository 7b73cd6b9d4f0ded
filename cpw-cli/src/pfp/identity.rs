//! Record identity and canonical cleaning

use std::collections::HashSet;

use serde::Serialize;

use super::{Snapshot, SnapshotError, columns};
use crate::store::CellValue;

/// Employee placeholder carried by conversion/labor-cost lines of the extract
pub const LABOR_COST_SENTINEL: &str = "Labor Cost, Conversion Employee";

/// `"<project number> - <employee name>"`, both rendered as displayed text.
///
/// Whole numbers render without a fraction and a missing employee renders
/// empty: `"1234 - Alice"`, `"P2 - "`. Snapshots coded by the older
/// spreadsheet macros carry `"1234.0 - Alice"` and `"P2 - nan"`; compare
/// against those through [`canonical_code`].
pub fn unique_code(project_number: &CellValue, employee_name: &CellValue) -> String {
    format!("{} - {}", project_number, employee_name)
}

/// A code in the form [`unique_code`] produces, accepting the legacy
/// `.0` project suffix and `nan` employee
pub fn canonical_code(code: &str) -> String {
    let Some((project, employee)) = code.split_once(" - ") else {
        return code.to_string();
    };
    let project = match project.strip_suffix(".0") {
        Some(whole) if !whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit()) => whole,
        _ => project,
    };
    let employee = if employee == "nan" { "" } else { employee };
    format!("{} - {}", project, employee)
}

/// Prepend a `Unique Code` column computed from every raw record.
///
/// An existing `Unique Code` column is dropped first, so re-importing a
/// coded file yields the same layout.
pub fn assign_identity(raw: &Snapshot) -> Result<Snapshot, SnapshotError> {
    let project_col = raw.require_column(columns::PROJECT_NUMBER)?;
    let employee_col = raw.require_column(columns::EMPLOYEE_NAME)?;
    let existing_code = raw.column(columns::UNIQUE_CODE);

    let mut headers = Vec::with_capacity(raw.headers().len() + 1);
    headers.push(columns::UNIQUE_CODE.to_string());
    headers.extend(
        raw.headers()
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != existing_code)
            .map(|(_, h)| h.clone()),
    );

    let rows = raw
        .rows()
        .iter()
        .map(|row| {
            let code = unique_code(&row[project_col], &row[employee_col]);
            let mut out = Vec::with_capacity(headers.len());
            out.push(CellValue::String(code));
            out.extend(
                row.iter()
                    .enumerate()
                    .filter(|(i, _)| Some(*i) != existing_code)
                    .map(|(_, v)| v.clone()),
            );
            out
        })
        .collect();

    log::debug!("Assigned unique codes to {} records", raw.len());
    Ok(Snapshot::new(headers, rows))
}

/// Cleaning filters, applied in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleaningStage {
    /// Repeated unique code; the first occurrence survives
    Duplicate,
    /// Employee name is an empty cell or empty string
    BlankEmployee,
    /// Employee name is exactly [`LABOR_COST_SENTINEL`]
    LaborCost,
}

pub const CLEANING_STAGES: [CleaningStage; 3] = [
    CleaningStage::Duplicate,
    CleaningStage::BlankEmployee,
    CleaningStage::LaborCost,
];

impl std::fmt::Display for CleaningStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleaningStage::Duplicate => write!(f, "duplicate unique code"),
            CleaningStage::BlankEmployee => write!(f, "blank employee name"),
            CleaningStage::LaborCost => write!(f, "labor cost placeholder"),
        }
    }
}

impl CleaningStage {
    /// Surviving row indices after this stage, order preserved
    fn apply(
        self,
        snapshot: &Snapshot,
        code_col: usize,
        employee_col: usize,
        rows: Vec<usize>,
    ) -> Vec<usize> {
        match self {
            CleaningStage::Duplicate => {
                let mut seen = HashSet::new();
                rows.into_iter()
                    .filter(|&i| seen.insert(snapshot.value(i, code_col).to_string()))
                    .collect()
            }
            CleaningStage::BlankEmployee => rows
                .into_iter()
                .filter(|&i| !snapshot.value(i, employee_col).is_blank())
                .collect(),
            CleaningStage::LaborCost => rows
                .into_iter()
                .filter(|&i| snapshot.value(i, employee_col).as_str() != Some(LABOR_COST_SENTINEL))
                .collect(),
        }
    }
}

/// Audit counts of one cleaning pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleaningStats {
    pub original_count: usize,
    pub duplicates_removed: usize,
    pub blank_employees_removed: usize,
    pub labor_cost_removed: usize,
    pub final_count: usize,
}

impl CleaningStats {
    fn record(&mut self, stage: CleaningStage, removed: usize) {
        match stage {
            CleaningStage::Duplicate => self.duplicates_removed = removed,
            CleaningStage::BlankEmployee => self.blank_employees_removed = removed,
            CleaningStage::LaborCost => self.labor_cost_removed = removed,
        }
    }

    pub fn removed(&self, stage: CleaningStage) -> usize {
        match stage {
            CleaningStage::Duplicate => self.duplicates_removed,
            CleaningStage::BlankEmployee => self.blank_employees_removed,
            CleaningStage::LaborCost => self.labor_cost_removed,
        }
    }
}

/// Run every [`CleaningStage`] in order over a unique-coded snapshot
pub fn clean(snapshot: &Snapshot) -> Result<(Snapshot, CleaningStats), SnapshotError> {
    let code_col = snapshot.require_column(columns::UNIQUE_CODE)?;
    let employee_col = snapshot.require_column(columns::EMPLOYEE_NAME)?;

    let mut stats = CleaningStats {
        original_count: snapshot.len(),
        ..Default::default()
    };

    let mut survivors: Vec<usize> = (0..snapshot.len()).collect();
    for stage in CLEANING_STAGES {
        let before = survivors.len();
        survivors = stage.apply(snapshot, code_col, employee_col, survivors);
        let removed = before - survivors.len();
        if removed > 0 {
            log::debug!("Removed {} records: {}", removed, stage);
        }
        stats.record(stage, removed);
    }
    stats.final_count = survivors.len();

    log::info!(
        "Cleaned snapshot: {} -> {} records",
        stats.original_count,
        stats.final_count
    );
    Ok((snapshot.select(&survivors), stats))
}
