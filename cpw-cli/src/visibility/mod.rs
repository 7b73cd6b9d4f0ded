//! Rolling week window and sheet protection for team workbooks
//!
//! Week columns from `Week 01` up to (not including) the current ISO week
//! are hidden; later weeks are shown. The mask is rebuilt on every run, so
//! a workbook opened in a later week unhides nothing it should still hide
//! and hides the weeks that have since passed.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::config::VisibilityTarget;
use crate::store::{CellRef, ProtectionFlags, StoreError, TabularStore, WorkbookHandle};

pub const WEEK_MARKER: &str = "Week";
pub const FIRST_WEEK: &str = "Week 01";

/// `Week NN` label of the ISO week containing `date`
pub fn week_label(date: NaiveDate) -> String {
    format!("Week {:02}", date.iso_week().week())
}

/// Header rules, evaluated in order for each column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekRule {
    /// A week header naming the current week ends the hidden run
    ReachCurrentWeek,
    /// Any week header inside the hidden run is hidden
    HideWhileActive,
    /// `Week 01` starts the hidden run and is hidden itself
    StartAtFirstWeek,
}

pub const WEEK_RULES: [WeekRule; 3] = [
    WeekRule::ReachCurrentWeek,
    WeekRule::HideWhileActive,
    WeekRule::StartAtFirstWeek,
];

struct WeekScan<'a> {
    current: &'a str,
    hiding: bool,
}

impl WeekRule {
    /// Returns `true` when this rule hides the column
    fn apply(self, header: &str, scan: &mut WeekScan<'_>) -> bool {
        let is_week = header.contains(WEEK_MARKER);
        match self {
            WeekRule::ReachCurrentWeek => {
                if is_week && header.contains(scan.current) {
                    scan.hiding = false;
                }
                false
            }
            WeekRule::HideWhileActive => is_week && scan.hiding,
            WeekRule::StartAtFirstWeek => {
                if header.contains(FIRST_WEEK) {
                    scan.hiding = true;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// `(column, hidden)` for every week column, left to right.
/// Columns without a week header are left out and keep their state.
pub fn week_mask(headers: &[(u32, String)], current_label: &str) -> Vec<(u32, bool)> {
    let mut scan = WeekScan {
        current: current_label,
        hiding: false,
    };

    headers
        .iter()
        .filter_map(|(col, header)| {
            let mut hidden = false;
            for rule in WEEK_RULES {
                hidden |= rule.apply(header, &mut scan);
            }
            header.contains(WEEK_MARKER).then_some((*col, hidden))
        })
        .collect()
}

/// Outcome for one target sheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SheetVisibility {
    pub sheet: String,
    pub hidden: usize,
    pub shown: usize,
    /// Set when the table scope was missing and only protection ran
    pub mask_skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisibilityReport {
    pub week: String,
    pub sheets: Vec<SheetVisibility>,
}

impl VisibilityReport {
    pub fn failures(&self) -> impl Iterator<Item = &SheetVisibility> {
        self.sheets.iter().filter(|s| s.error.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Apply the week mask and protection to every target sheet of `handle`.
/// A failing sheet is recorded and the remaining targets still run.
pub fn apply_visibility<S>(
    store: &mut S,
    handle: WorkbookHandle,
    targets: &[VisibilityTarget],
    passphrase: &str,
    today: NaiveDate,
) -> VisibilityReport
where
    S: TabularStore + ?Sized,
{
    let week = week_label(today);
    let mut report = VisibilityReport {
        week: week.clone(),
        sheets: Vec::with_capacity(targets.len()),
    };

    for target in targets {
        let mut outcome = SheetVisibility {
            sheet: target.sheet.clone(),
            hidden: 0,
            shown: 0,
            mask_skipped: false,
            error: None,
        };

        if let Err(e) = apply_target(store, handle, target, passphrase, &week, &mut outcome) {
            log::warn!("Visibility pass failed on sheet '{}': {}", target.sheet, e);
            outcome.error = Some(e.to_string());
        } else {
            log::debug!(
                "Sheet '{}': {} week columns hidden, {} shown",
                target.sheet,
                outcome.hidden,
                outcome.shown
            );
        }
        report.sheets.push(outcome);
    }

    report
}

fn apply_target<S>(
    store: &mut S,
    handle: WorkbookHandle,
    target: &VisibilityTarget,
    passphrase: &str,
    week: &str,
    outcome: &mut SheetVisibility,
) -> Result<(), StoreError>
where
    S: TabularStore + ?Sized,
{
    let sheet = target.sheet.as_str();
    if !store.has_sheet(handle, sheet)? {
        return Err(StoreError::sheet_not_found(sheet));
    }

    match scoped_headers(store, handle, target)? {
        Some(headers) => {
            for (col, hidden) in week_mask(&headers, week) {
                if store.is_column_hidden(handle, sheet, col)? != hidden {
                    store.set_column_hidden(handle, sheet, col, hidden)?;
                }
                if hidden {
                    outcome.hidden += 1;
                } else {
                    outcome.shown += 1;
                }
            }
        }
        None => outcome.mask_skipped = true,
    }

    if store.is_protected(handle, sheet)? {
        store.unprotect(handle, sheet, passphrase)?;
    }
    if let Some((first, last)) = target.locked_columns {
        store.set_locked_columns(handle, sheet, first, last)?;
    }
    store.protect(handle, sheet, passphrase, ProtectionFlags::ALL)?;
    Ok(())
}

/// Headers of the target's table or header span; `None` if the table is gone
fn scoped_headers<S>(
    store: &S,
    handle: WorkbookHandle,
    target: &VisibilityTarget,
) -> Result<Option<Vec<(u32, String)>>, StoreError>
where
    S: TabularStore + ?Sized,
{
    if let Some(table) = &target.table {
        return match store.table_headers(handle, &target.sheet, table) {
            Ok(headers) => Ok(Some(headers)),
            Err(StoreError::TableNotFound { .. }) => {
                log::info!(
                    "Table '{}' not found on '{}', skipping week mask",
                    table,
                    target.sheet
                );
                Ok(None)
            }
            Err(e) => Err(e),
        };
    }

    let Some(span) = target.header_span else {
        return Ok(None);
    };
    let row = store
        .read_range(
            handle,
            &target.sheet,
            CellRef::new(span.row, span.first_col),
            CellRef::new(span.row, span.last_col),
        )?
        .into_iter()
        .next()
        .unwrap_or_default();

    Ok(Some(
        row.iter()
            .enumerate()
            .filter(|(_, v)| v.is_truthy())
            .map(|(i, v)| (span.first_col + i as u32, v.to_string()))
            .collect(),
    ))
}
