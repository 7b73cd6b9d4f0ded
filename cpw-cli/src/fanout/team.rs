//! Team fan-out: a GBA workbook's plan rows into `CPW Tool_<Team>_Team.xlsm`

use std::path::Path;

use chrono::NaiveDate;

use super::{
    ArtifactKind, BucketError, Buckets, ExportError, MergeObserver, MergeOutcome, MergeStage,
    OutcomeKind, RunReport, close_quietly, ensure_sheet, run_buckets,
};
use crate::classify::classify_team;
use crate::config::{CpwConfig, TeamConfig, VisibilityTarget};
use crate::paths::derive_from_anchor;
use crate::pfp::columns;
use crate::store::{
    CellRef, CellValue, ProtectionFlags, StoreError, TabularStore, WorkbookHandle, with_open,
};
use crate::visibility::apply_visibility;

/// Oracle date, index, unique code, project number, project name, resource
#[derive(Debug, Clone, PartialEq)]
pub struct TeamRecord(pub [CellValue; 6]);

const TEAM_FIELDS: [&str; 6] = [
    columns::ORACLE_DATE,
    columns::INDEX,
    columns::UNIQUE_CODE,
    columns::PROJECT_NUMBER,
    columns::PROJECT_NAME,
    columns::RESOURCE_NAME,
];

/// Group plan rows of the GBA workbook by department.
///
/// Rows run from `start_row` (anything at or below 1 means 2, the first
/// data row) to the last used row of column A. The plan sheet is required.
pub fn collect_team_buckets<S>(
    store: &mut S,
    gba_workbook: &Path,
    sheet: &str,
    start_row: u32,
) -> Result<Buckets<TeamRecord>, ExportError>
where
    S: TabularStore + ?Sized,
{
    let handle = store.open(gba_workbook)?;
    let (block, field_cols, team_col) =
        with_open(store, handle, |store, handle| -> Result<_, StoreError> {
            if !store.has_sheet(handle, sheet)? {
                return Err(StoreError::sheet_not_found(sheet));
            }
            let mut field_cols = [None; 6];
            for (slot, name) in field_cols.iter_mut().zip(TEAM_FIELDS) {
                *slot = store.find_header(handle, sheet, 1, name)?;
            }
            let team_col = store.find_header(handle, sheet, 1, columns::DEPARTMENT_NAME)?;

            let last_row = store.last_used_row(handle, sheet, 1)?;
            let last_col = store.last_used_col(handle, sheet, 1)?;
            let bottom_right = CellRef::new(last_row, last_col);
            let block = store.read_range(handle, sheet, CellRef::new(1, 1), bottom_right)?;
            Ok((block, field_cols, team_col))
        })?;

    if team_col.is_none() {
        log::warn!(
            "Column '{}' not found in {}",
            columns::DEPARTMENT_NAME,
            gba_workbook.display()
        );
    }

    let first = start_row.max(2) as usize - 1;
    let mut buckets = Buckets::default();
    for row in block.iter().skip(first) {
        let value = |col: Option<u32>| {
            col.and_then(|c| row.get(c as usize - 1))
                .cloned()
                .unwrap_or_default()
        };
        let Some(team) = classify_team(&value(team_col)) else {
            continue;
        };
        buckets.push(&team, TeamRecord(field_cols.map(value)));
    }

    log::debug!("Grouped rows into {} team buckets", buckets.len());
    Ok(buckets)
}

/// Export the GBA workbook's plan rows to every team workbook they touch
pub fn export_team<S>(
    store: &mut S,
    gba_workbook: &Path,
    start_row: u32,
    config: &CpwConfig,
    today: NaiveDate,
    observer: &mut dyn MergeObserver,
) -> Result<RunReport, ExportError>
where
    S: TabularStore + ?Sized,
{
    let anchor = &config.folders.gba_workbooks;
    let root = derive_from_anchor(gba_workbook, &anchor.name, anchor.trim)?;
    let target_dir = root.join(&config.folders.department_workbooks);

    let buckets = collect_team_buckets(store, gba_workbook, &config.team.source_sheet, start_row)?;
    if buckets.is_empty() {
        return Err(ExportError::NoMatchingRecords);
    }

    let finish = Finish {
        passphrase: &config.passphrase,
        targets: &config.visibility.targets,
        today,
    };
    let mut report = RunReport::new(ArtifactKind::TeamMain, target_dir.clone());
    run_buckets(&buckets, &mut report, observer, |bucket, records| {
        merge_team_bucket(&mut *store, &target_dir, &config.team, &finish, bucket, records)
    });
    Ok(report)
}

/// Protection and visibility settings applied after rows are written
#[derive(Debug, Clone, Copy)]
pub struct Finish<'a> {
    pub passphrase: &'a str,
    pub targets: &'a [VisibilityTarget],
    pub today: NaiveDate,
}

/// Append `records` to the team workbook, creating it from the template
pub fn merge_team_bucket<S>(
    store: &mut S,
    dir: &Path,
    config: &TeamConfig,
    finish: &Finish<'_>,
    bucket: &str,
    records: &[TeamRecord],
) -> Result<MergeOutcome, BucketError>
where
    S: TabularStore + ?Sized,
{
    let target = dir.join(ArtifactKind::TeamMain.file_name(bucket));
    let fail = |stage: MergeStage| {
        let target = target.clone();
        move |e: StoreError| BucketError::new(bucket, &target, stage, e)
    };

    let (handle, kind) = if store.exists(&target) {
        let handle = store.open(&target).map_err(fail(MergeStage::OpenTarget))?;
        (handle, OutcomeKind::Updated)
    } else {
        let template = dir.join(&config.template);
        let handle = store
            .open(&template)
            .map_err(|e| BucketError::new(bucket, &template, MergeStage::OpenTemplate, e))?;
        // Claim the target path before touching anything
        if let Err(e) = store.save(handle, Some(&target)) {
            close_quietly(store, handle);
            return Err(fail(MergeStage::Save)(e));
        }
        (handle, OutcomeKind::Created)
    };

    with_open(store, handle, |store, handle| -> Result<MergeOutcome, BucketError> {
        let sheet = config.sheet.as_str();
        ensure_sheet(store, handle, sheet).map_err(fail(MergeStage::Prepare))?;

        let start_row = match kind {
            OutcomeKind::Created => config.first_row,
            OutcomeKind::Updated => {
                first_empty_row(store, handle, sheet, config).map_err(fail(MergeStage::Prepare))?
            }
        };

        let rows: Vec<Vec<CellValue>> = records.iter().map(|r| r.0.to_vec()).collect();
        let at = CellRef::new(start_row, config.first_col);
        write_unprotected(store, handle, sheet, finish.passphrase, at, &rows)
            .map_err(fail(MergeStage::Write))?;

        let visibility =
            apply_visibility(store, handle, finish.targets, finish.passphrase, finish.today);
        for failed in visibility.failures() {
            log::warn!(
                "{}: sheet '{}' not finalised: {}",
                bucket,
                failed.sheet,
                failed.error.as_deref().unwrap_or_default()
            );
        }

        store.save(handle, None).map_err(fail(MergeStage::Save))?;
        let path = store.path_of(handle).map_err(fail(MergeStage::Save))?;

        Ok(MergeOutcome {
            bucket: bucket.to_string(),
            artifact: ArtifactKind::TeamMain,
            kind,
            path: path.unwrap_or_else(|| target.clone()),
            start_row,
            rows_written: rows.len(),
            visibility: Some(visibility),
        })
    })
}

/// Write the block with the sheet unprotected, then protect it again
fn write_unprotected<S>(
    store: &mut S,
    handle: WorkbookHandle,
    sheet: &str,
    passphrase: &str,
    at: CellRef,
    rows: &[Vec<CellValue>],
) -> Result<(), StoreError>
where
    S: TabularStore + ?Sized,
{
    if store.is_protected(handle, sheet)? {
        store.unprotect(handle, sheet, passphrase)?;
    }
    if !rows.is_empty() {
        store.write_range(handle, sheet, at, rows)?;
    }
    store.protect(handle, sheet, passphrase, ProtectionFlags::ALL)
}

/// First blank cell of the anchor column within the search window, else
/// the row after its last used cell (never above the first data row)
fn first_empty_row<S>(
    store: &S,
    handle: WorkbookHandle,
    sheet: &str,
    config: &TeamConfig,
) -> Result<u32, StoreError>
where
    S: TabularStore + ?Sized,
{
    let col = config.anchor_column;
    if config.search_limit >= config.first_row {
        let window = store.read_range(
            handle,
            sheet,
            CellRef::new(config.first_row, col),
            CellRef::new(config.search_limit, col),
        )?;
        let blank = window
            .iter()
            .position(|row| row.first().is_none_or(CellValue::is_blank_trimmed));
        if let Some(offset) = blank {
            return Ok(config.first_row + offset as u32);
        }
    }

    let last = store.last_used_row(handle, sheet, col)?;
    Ok(config.first_row.max(last + 1))
}
