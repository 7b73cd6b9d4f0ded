//! Operator-facing output

use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;

use crate::fanout::{BucketError, MergeObserver, MergeOutcome, OutcomeKind, RunReport};
use crate::pfp::{CLEANING_STAGES, CleaningStats};

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", text);
    Ok(())
}

pub fn print_cleaning_stats(stats: &CleaningStats) {
    println!("{}", "Data Cleaning Summary".bold());
    println!("  {:<36}{}", "Original rows:", stats.original_count);
    for stage in CLEANING_STAGES {
        let label = format!("Removed as {}:", stage);
        println!("  {:<36}{}", label, stats.removed(stage).to_string().yellow());
    }
    let remaining = stats.final_count.to_string().green().bold();
    println!("  {:<36}{}", "Final clean rows:", remaining);
}

/// Progress lines while buckets are merged; silent in JSON mode
pub struct ConsoleProgress {
    pub label: &'static str,
    pub quiet: bool,
}

impl MergeObserver for ConsoleProgress {
    fn bucket_started(&mut self, bucket: &str, index: usize, total: usize) {
        if !self.quiet {
            println!("Processing {}: {} ({}/{})...", self.label, bucket.cyan(), index, total);
        }
    }

    fn bucket_finished(&mut self, result: &Result<MergeOutcome, BucketError>) {
        if self.quiet {
            return;
        }
        match result {
            Ok(outcome) => {
                let status = match outcome.kind {
                    OutcomeKind::Created => "Created".bright_green(),
                    OutcomeKind::Updated => "Updated".green(),
                };
                println!(
                    "  {} {} ({} rows from row {})",
                    status,
                    outcome.path.display(),
                    outcome.rows_written,
                    outcome.start_row
                );
            }
            Err(e) => println!("  {} {}", "Error:".red().bold(), e),
        }
    }
}

pub fn print_run_report(report: &RunReport) {
    println!();
    let created: Vec<_> = report.created().map(file_name).collect();
    let updated: Vec<_> = report.updated().map(file_name).collect();

    if !created.is_empty() {
        println!("{} {}", "New files created:".bold(), created.join(", "));
    }
    if !updated.is_empty() {
        println!("{} {}", "Files updated:".bold(), updated.join(", "));
    }
    for outcome in &report.outcomes {
        if let Some(visibility) = &outcome.visibility {
            for failed in visibility.failures() {
                println!(
                    "{} {}: sheet '{}' skipped ({})",
                    "Warning:".yellow().bold(),
                    outcome.bucket,
                    failed.sheet,
                    failed.error.as_deref().unwrap_or_default()
                );
            }
        }
    }

    if report.is_success() {
        println!(
            "{} {} rows written to {} workbooks",
            "Done:".green().bold(),
            report.rows_written(),
            report.outcomes.len()
        );
    } else {
        println!(
            "{} {} of {} workbooks failed",
            "Finished with errors:".red().bold(),
            report.failed().len(),
            report.outcomes.len() + report.failed().len()
        );
    }
}

fn file_name(outcome: &MergeOutcome) -> String {
    outcome
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| outcome.path.display().to_string())
}
