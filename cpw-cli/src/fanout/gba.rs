//! GBA fan-out: cleaned PFP records into `CPW Tool_<GBA>_Main.xlsm`

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;

use super::{
    ArtifactKind, BucketError, Buckets, ExportError, MergeObserver, MergeOutcome, MergeStage,
    OutcomeKind, RunReport, ensure_sheet, run_buckets,
};
use crate::classify::{classify_gba, format_project_number};
use crate::config::{CpwConfig, GbaConfig};
use crate::paths::derive_from_anchor;
use crate::pfp::columns;
use crate::store::{CellRef, CellValue, StoreError, TabularStore, WorkbookHandle, with_open};

/// One PFP row bound for a GBA workbook
#[derive(Debug, Clone, PartialEq)]
pub struct GbaRecord {
    /// Already passed through [`format_project_number`]
    pub project_number: String,
    pub project_name: CellValue,
    pub resource_name: CellValue,
    pub organization: CellValue,
}

/// Resource attributes keyed by trimmed resource name
type ResourceLookup = HashMap<String, [CellValue; 3]>;

/// Read the first sheet of `source` and group its rows by GBA.
///
/// The block spans the last used row of column A and the last used column
/// of row 1. A missing header leaves that field empty for every row.
pub fn collect_gba_buckets<S>(
    store: &mut S,
    source: &Path,
) -> Result<Buckets<GbaRecord>, ExportError>
where
    S: TabularStore + ?Sized,
{
    const FIELDS: [&str; 4] = [
        columns::PROJECT_NUMBER,
        columns::PROJECT_NAME,
        columns::EMPLOYEE_NAME,
        columns::ORGANIZATION_NAME,
    ];

    let handle = store.open(source)?;
    let (block, cols) = with_open(store, handle, |store, handle| -> Result<_, StoreError> {
        let sheet = store
            .sheet_names(handle)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::sheet_not_found("<first sheet>"))?;
        let mut cols = [None; 4];
        for (slot, name) in cols.iter_mut().zip(FIELDS) {
            *slot = store.find_header(handle, &sheet, 1, name)?;
            if slot.is_none() {
                log::warn!("Column '{}' not found in {}", name, source.display());
            }
        }

        let last_row = store.last_used_row(handle, &sheet, 1)?;
        let last_col = store.last_used_col(handle, &sheet, 1)?;
        let bottom_right = CellRef::new(last_row, last_col);
        let block = store.read_range(handle, &sheet, CellRef::new(1, 1), bottom_right)?;
        Ok((block, cols))
    })?;
    let [project_col, name_col, employee_col, org_col] = cols;

    let mut buckets = Buckets::default();
    for row in block.iter().skip(1) {
        let organization = field(row, org_col);
        let Some(gba) = classify_gba(&organization.to_string()) else {
            continue;
        };
        buckets.push(
            gba.name(),
            GbaRecord {
                project_number: format_project_number(&field(row, project_col)),
                project_name: field(row, name_col),
                resource_name: field(row, employee_col),
                organization,
            },
        );
    }

    log::debug!("Classified rows into {} GBA buckets", buckets.len());
    Ok(buckets)
}

/// Cell of a 1-based sheet column within a row read from column A
fn field(row: &[CellValue], col: Option<u32>) -> CellValue {
    col.and_then(|c| row.get(c as usize - 1))
        .cloned()
        .unwrap_or_default()
}

/// Export a cleaned snapshot or delta file to every GBA workbook it touches
pub fn export_gba<S>(
    store: &mut S,
    source: &Path,
    config: &CpwConfig,
    today: NaiveDate,
    observer: &mut dyn MergeObserver,
) -> Result<RunReport, ExportError>
where
    S: TabularStore + ?Sized,
{
    let anchor = &config.folders.data_processing;
    let root = derive_from_anchor(source, &anchor.name, anchor.trim)?;
    let target_dir = root.join(&config.folders.gba_workbooks.name);

    let buckets = collect_gba_buckets(store, source)?;
    if buckets.is_empty() {
        return Err(ExportError::NoMatchingRecords);
    }

    let mut report = RunReport::new(ArtifactKind::GbaMain, target_dir.clone());
    run_buckets(&buckets, &mut report, observer, |bucket, records| {
        merge_gba_bucket(&mut *store, &target_dir, &config.gba, bucket, records, today)
    });
    Ok(report)
}

/// Append `records` to the bucket's workbook, creating it from the template
pub fn merge_gba_bucket<S>(
    store: &mut S,
    dir: &Path,
    config: &GbaConfig,
    bucket: &str,
    records: &[GbaRecord],
    today: NaiveDate,
) -> Result<MergeOutcome, BucketError>
where
    S: TabularStore + ?Sized,
{
    let target = dir.join(ArtifactKind::GbaMain.file_name(bucket));
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
        (handle, OutcomeKind::Created)
    };

    with_open(store, handle, |store, handle| -> Result<MergeOutcome, BucketError> {
        let start_row =
            prepare_target(store, handle, config, kind).map_err(fail(MergeStage::Prepare))?;
        let lookup = resource_lookup(store, handle, &config.resource_sheet)
            .map_err(fail(MergeStage::Prepare))?;

        let date = today.format(&config.date_format).to_string();
        let rows = build_rows(records, &lookup, start_row, &date);
        store
            .write_range(handle, &config.sheet, CellRef::new(start_row, 1), &rows)
            .map_err(fail(MergeStage::Write))?;

        let save_as = match kind {
            OutcomeKind::Created => Some(target.as_path()),
            OutcomeKind::Updated => None,
        };
        store.save(handle, save_as).map_err(fail(MergeStage::Save))?;
        let path = store.path_of(handle).map_err(fail(MergeStage::Save))?;

        Ok(MergeOutcome {
            bucket: bucket.to_string(),
            artifact: ArtifactKind::GbaMain,
            kind,
            path: path.unwrap_or_else(|| target.clone()),
            start_row,
            rows_written: rows.len(),
            visibility: None,
        })
    })
}

/// Make sure the data sheet exists and return the first row to write.
/// A fresh copy of the template is cleared below its header rows first.
fn prepare_target<S>(
    store: &mut S,
    handle: WorkbookHandle,
    config: &GbaConfig,
    kind: OutcomeKind,
) -> Result<u32, StoreError>
where
    S: TabularStore + ?Sized,
{
    let sheet = config.sheet.as_str();
    ensure_sheet(store, handle, sheet)?;

    match kind {
        OutcomeKind::Updated => Ok(store.last_used_row(handle, sheet, 1)? + 1),
        OutcomeKind::Created => {
            let first = config.clear_from_row;
            let last_row = store.last_used_row(handle, sheet, 1)?;
            let last_col = store.last_used_col(handle, sheet, 1)?;
            if last_row >= first {
                let bottom_right = CellRef::new(last_row, last_col);
                store.clear_range(handle, sheet, CellRef::new(first, 1), bottom_right)?;
            }
            if config.clear_rows >= first && config.clear_cols >= 1 {
                store.clear_range(
                    handle,
                    sheet,
                    CellRef::new(first, 1),
                    CellRef::new(config.clear_rows, config.clear_cols),
                )?;
            }
            Ok(first - 1)
        }
    }
}

/// Columns B -> key, A/C/D -> attributes. Blank keys are skipped, a later
/// row replaces an earlier one with the same key and a missing sheet
/// yields an empty lookup.
fn resource_lookup<S>(
    store: &S,
    handle: WorkbookHandle,
    sheet: &str,
) -> Result<ResourceLookup, StoreError>
where
    S: TabularStore + ?Sized,
{
    if !store.has_sheet(handle, sheet)? {
        log::debug!("No '{}' sheet, resource attributes left blank", sheet);
        return Ok(ResourceLookup::new());
    }

    let last_row = store.last_used_row(handle, sheet, 1)?;
    let block = store.read_range(handle, sheet, CellRef::new(1, 1), CellRef::new(last_row, 4))?;

    let mut lookup = ResourceLookup::new();
    for row in block {
        if let [a, b, c, d] = row.as_slice() {
            if b.is_truthy() {
                let key = b.to_string().trim().to_string();
                lookup.insert(key, [a.clone(), c.clone(), d.clone()]);
            }
        }
    }
    Ok(lookup)
}

/// Ten fields per record: date, serial, label, project number, project
/// name, resource, organization and three resource attributes
fn build_rows(
    records: &[GbaRecord],
    lookup: &ResourceLookup,
    start_row: u32,
    date: &str,
) -> Vec<Vec<CellValue>> {
    records
        .iter()
        .enumerate()
        .map(|(i, rec)| {
            let serial = start_row as usize + i - 1;
            let label = format!("{} - {}", rec.project_number, rec.resource_name);
            let attributes = lookup
                .get(rec.resource_name.to_string().trim())
                .cloned()
                .unwrap_or_else(|| std::array::from_fn(|_| CellValue::text("")));

            let mut row = vec![
                CellValue::text(date),
                CellValue::Number(serial as f64),
                CellValue::text(label),
                CellValue::text(rec.project_number.as_str()),
                rec.project_name.clone(),
                rec.resource_name.clone(),
                rec.organization.clone(),
            ];
            row.extend(attributes);
            row
        })
        .collect()
}
