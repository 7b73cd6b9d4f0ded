//! Workflow steps over one operator session
//!
//! A [`Session`] owns everything a run needs (config, store, run date), so
//! steps hand their outputs to each other explicitly instead of through
//! shared state.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use crate::config::CpwConfig;
use crate::fanout::{self, ExportError, MergeObserver, RunReport};
use crate::paths::{PfpLayout, delta_snapshot};
use crate::pfp::{self, CleaningStats, DiffStats};
use crate::store::TabularStore;

pub struct Session<S> {
    pub config: CpwConfig,
    pub store: S,
    pub today: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityOutcome {
    pub path: PathBuf,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanOutcome {
    pub path: PathBuf,
    pub stats: CleaningStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekOutcome {
    pub identity: IdentityOutcome,
    pub cleaned: CleanOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeltaOutcome {
    pub stats: DiffStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<PathBuf>,
}

impl<S: TabularStore> Session<S> {
    pub fn new(config: CpwConfig, store: S, today: NaiveDate) -> Self {
        Self { config, store, today }
    }

    /// Code the raw extract and save it as the continuous snapshot next to
    /// its `Raw Data` folder
    pub fn add_unique_code(&mut self, raw: &Path) -> Result<IdentityOutcome> {
        let snapshot = pfp::read_snapshot(&mut self.store, raw)
            .with_context(|| format!("Failed to read raw PFP file: {}", raw.display()))?;
        let coded = pfp::assign_identity(&snapshot).context("Failed to assign unique codes")?;

        let path = PfpLayout::from_raw_file(raw).continuous_snapshot();
        pfp::write_snapshot(&mut self.store, &coded, &path)
            .with_context(|| format!("Failed to save {}", path.display()))?;

        Ok(IdentityOutcome {
            path,
            records: coded.len(),
        })
    }

    /// Clean a unique-coded file and save the dated copy to OLD PFP
    pub fn clean_file(&mut self, coded_path: &Path) -> Result<CleanOutcome> {
        let coded = pfp::read_snapshot(&mut self.store, coded_path)
            .with_context(|| format!("Failed to read {}", coded_path.display()))?;
        let pfp_folder = coded_path.parent().unwrap_or(Path::new(""));
        self.save_cleaned(&coded, &PfpLayout::from_pfp_folder(pfp_folder))
    }

    /// Both first steps on a fresh weekly extract
    pub fn process_week(&mut self, raw: &Path) -> Result<WeekOutcome> {
        let identity = self.add_unique_code(raw)?;
        let coded = pfp::read_snapshot(&mut self.store, &identity.path)
            .with_context(|| format!("Failed to re-read {}", identity.path.display()))?;
        let cleaned = self.save_cleaned(&coded, &PfpLayout::from_raw_file(raw))?;
        Ok(WeekOutcome { identity, cleaned })
    }

    fn save_cleaned(&mut self, coded: &pfp::Snapshot, layout: &PfpLayout) -> Result<CleanOutcome> {
        let (cleaned, stats) = pfp::clean(coded).context("Failed to clean snapshot")?;
        let path = layout.cleaned_snapshot(&self.config.folders.old_pfp, self.today);
        pfp::write_snapshot(&mut self.store, &cleaned, &path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        Ok(CleanOutcome { path, stats })
    }

    /// Records of `current` not present in `previous`; optionally saved to
    /// NEW PFP beside the previous snapshot's folder
    pub fn delta(&mut self, previous: &Path, current: &Path, save: bool) -> Result<DeltaOutcome> {
        let prev = pfp::read_snapshot(&mut self.store, previous)
            .with_context(|| format!("Failed to read previous snapshot: {}", previous.display()))?;
        let curr = pfp::read_snapshot(&mut self.store, current)
            .with_context(|| format!("Failed to read current snapshot: {}", current.display()))?;

        let delta = pfp::diff_new(&prev, &curr).context("Failed to compare snapshots")?;

        let saved = if save {
            let path = delta_snapshot(previous, &self.config.folders.new_pfp, self.today);
            pfp::write_snapshot(&mut self.store, &delta.records, &path)
                .with_context(|| format!("Failed to save {}", path.display()))?;
            Some(path)
        } else {
            None
        };

        Ok(DeltaOutcome {
            stats: delta.stats,
            saved,
        })
    }

    /// Fan `source` out to GBA workbooks; `None` when no row classified
    pub fn gba_export(
        &mut self,
        source: &Path,
        observer: &mut dyn MergeObserver,
    ) -> Result<Option<RunReport>> {
        let result =
            fanout::export_gba(&mut self.store, source, &self.config, self.today, observer);
        no_match_as_none(result)
            .with_context(|| format!("GBA export failed for {}", source.display()))
    }

    /// Fan a GBA workbook out to team workbooks; `None` when no row has a team
    pub fn team_export(
        &mut self,
        gba_workbook: &Path,
        start_row: u32,
        observer: &mut dyn MergeObserver,
    ) -> Result<Option<RunReport>> {
        let result = fanout::export_team(
            &mut self.store,
            gba_workbook,
            start_row,
            &self.config,
            self.today,
            observer,
        );
        no_match_as_none(result)
            .with_context(|| format!("Team export failed for {}", gba_workbook.display()))
    }
}

fn no_match_as_none(
    result: Result<RunReport, ExportError>,
) -> Result<Option<RunReport>, ExportError> {
    match result {
        Ok(report) => Ok(Some(report)),
        Err(ExportError::NoMatchingRecords) => {
            log::warn!("No matching records found, nothing written");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pfp::{Snapshot, columns};
    use crate::store::{CellValue, MemoryStore};

    const PFP: &str = "/pkg/CPW/01 Data Processing/Project Financial Plan (PFP)";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    fn raw(rows: &[(&str, &str, &str)]) -> Snapshot {
        Snapshot::new(
            vec![
                columns::PROJECT_NUMBER.to_string(),
                columns::PROJECT_NAME.to_string(),
                columns::EMPLOYEE_NAME.to_string(),
                columns::ORGANIZATION_NAME.to_string(),
            ],
            rows.iter()
                .map(|(project, employee, org)| {
                    vec![
                        CellValue::text(*project),
                        CellValue::text("Project"),
                        CellValue::text(*employee),
                        CellValue::text(*org),
                    ]
                })
                .collect(),
        )
    }

    fn session_with_raw(path: &str, snapshot: &Snapshot) -> Session<MemoryStore> {
        let mut store = MemoryStore::new();
        pfp::write_snapshot(&mut store, snapshot, Path::new(path)).unwrap();
        Session::new(CpwConfig::default(), store, today())
    }

    #[test]
    fn test_process_week_writes_both_files() {
        let raw_path = format!("{}/Raw Data/raw.xlsx", PFP);
        let mut session = session_with_raw(
            &raw_path,
            &raw(&[
                ("1", "Alice", "MOB: Rail"),
                ("1", "Alice", "MOB: Rail"),
                ("2", "", "PLA: Water"),
            ]),
        );

        let outcome = session.process_week(Path::new(&raw_path)).unwrap();

        assert_eq!(
            outcome.identity.path,
            PathBuf::from(format!("{}/Project Plan Analysis-continuous.xlsx", PFP))
        );
        assert_eq!(outcome.identity.records, 3);
        assert_eq!(
            outcome.cleaned.path,
            PathBuf::from(format!(
                "{}/OLD PFP/Project Plan Analysis-continuous-2025-03-07.xlsx",
                PFP
            ))
        );
        assert_eq!(outcome.cleaned.stats.final_count, 1);

        let cleaned = pfp::read_snapshot(&mut session.store, &outcome.cleaned.path).unwrap();
        assert_eq!(cleaned.headers()[0], columns::UNIQUE_CODE);
        assert_eq!(cleaned.value(0, 0), &CellValue::text("1 - Alice"));
    }

    #[test]
    fn test_clean_file_uses_coded_file_folder() {
        let coded_path = format!("{}/Project Plan Analysis-continuous.xlsx", PFP);
        let coded = pfp::assign_identity(&raw(&[("1", "Alice", "x")])).unwrap();
        let mut session = session_with_raw(&coded_path, &coded);

        let outcome = session.clean_file(Path::new(&coded_path)).unwrap();
        assert!(outcome.path.starts_with(format!("{}/OLD PFP", PFP)));
        assert_eq!(outcome.stats.original_count, 1);
    }

    #[test]
    fn test_delta_saves_to_new_pfp() {
        let previous = format!("{}/OLD PFP/Project Plan Analysis-continuous-2025-02-28.xlsx", PFP);
        let current = format!("{}/OLD PFP/Project Plan Analysis-continuous-2025-03-07.xlsx", PFP);
        let mut session = session_with_raw(
            &previous,
            &pfp::assign_identity(&raw(&[("1", "Alice", "x")])).unwrap(),
        );
        pfp::write_snapshot(
            &mut session.store,
            &pfp::assign_identity(&raw(&[("1", "Alice", "x"), ("2", "Bob", "x")])).unwrap(),
            Path::new(&current),
        )
        .unwrap();

        let outcome = session
            .delta(Path::new(&previous), Path::new(&current), true)
            .unwrap();

        assert_eq!(outcome.stats.new_count, 1);
        let saved = outcome.saved.unwrap();
        assert_eq!(saved, PathBuf::from(format!("{}/NEW PFP/New_PFP_2025-03-07.xlsx", PFP)));
        let delta = pfp::read_snapshot(&mut session.store, &saved).unwrap();
        assert_eq!(delta.value(0, 0), &CellValue::text("2 - Bob"));
    }

    #[test]
    fn test_gba_export_without_matches_is_none() {
        let path = format!("{}/OLD PFP/clean.xlsx", PFP);
        let mut session = session_with_raw(&path, &raw(&[("1", "Alice", "Corporate")]));
        assert_eq!(session.gba_export(Path::new(&path), &mut ()).unwrap(), None);
    }

    #[test]
    fn test_missing_column_is_an_error() {
        let raw_path = format!("{}/Raw Data/raw.xlsx", PFP);
        let snapshot = Snapshot::new(
            vec!["Something".to_string()],
            vec![vec![CellValue::text("x")]],
        );
        let mut session = session_with_raw(&raw_path, &snapshot);

        let err = session.add_unique_code(Path::new(&raw_path)).unwrap_err();
        assert!(format!("{:#}", err).contains("Project Number"));
    }
}
