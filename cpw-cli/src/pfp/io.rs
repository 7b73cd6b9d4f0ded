//! Snapshot persistence through a [`TabularStore`]

use std::path::Path;

use super::{Snapshot, SnapshotError};
use crate::store::{CellRef, CellValue, TabularStore, with_open};

/// Sheet name given to snapshots written by this tool
pub const SNAPSHOT_SHEET: &str = "Sheet1";

/// Read the first sheet of `path`: header in row 1, fully empty rows skipped
pub fn read_snapshot<S>(store: &mut S, path: &Path) -> Result<Snapshot, SnapshotError>
where
    S: TabularStore + ?Sized,
{
    let handle = store.open(path)?;
    with_open(store, handle, |store, handle| -> Result<Snapshot, SnapshotError> {
        let sheet = store
            .sheet_names(handle)?
            .into_iter()
            .next()
            .ok_or(SnapshotError::NoSheets)?;

        let (rows, cols) = store.used_extent(handle, &sheet)?;
        if rows == 0 || cols == 0 {
            return Ok(Snapshot::default());
        }

        let mut block = store
            .read_range(handle, &sheet, CellRef::new(1, 1), CellRef::new(rows, cols))?
            .into_iter();

        let headers: Vec<String> = block
            .next()
            .unwrap_or_default()
            .iter()
            .map(CellValue::to_string)
            .collect();
        let body: Vec<Vec<CellValue>> = block
            .filter(|row| row.iter().any(|v| !v.is_empty()))
            .collect();

        log::debug!(
            "Read {} rows x {} columns from {} ({})",
            body.len(),
            headers.len(),
            path.display(),
            sheet
        );
        Ok(Snapshot::new(headers, body))
    })
}

/// Write `snapshot` to a fresh workbook at `path`, replacing any file there
pub fn write_snapshot<S>(
    store: &mut S,
    snapshot: &Snapshot,
    path: &Path,
) -> Result<(), SnapshotError>
where
    S: TabularStore + ?Sized,
{
    let handle = store.create();
    with_open(store, handle, |store, handle| -> Result<(), SnapshotError> {
        let mut block = Vec::with_capacity(snapshot.len() + 1);
        block.push(
            snapshot
                .headers()
                .iter()
                .map(|h| CellValue::text(h.as_str()))
                .collect::<Vec<_>>(),
        );
        block.extend(snapshot.rows().iter().cloned());

        store.write_range(handle, SNAPSHOT_SHEET, CellRef::new(1, 1), &block)?;
        store.save(handle, Some(path))?;
        log::info!("Saved {} records to {}", snapshot.len(), path.display());
        Ok(())
    })
}
