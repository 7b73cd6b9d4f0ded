use anyhow::Result;
use colored::*;

use super::{GbaExportArgs, TeamExportArgs};
use crate::cli::Context;
use crate::cli::commands::operator_path;
use crate::cli::output::{ConsoleProgress, print_json, print_run_report};
use crate::fanout::RunReport;

pub fn handle_gba_export_command(args: GbaExportArgs, ctx: &mut Context) -> Result<()> {
    let source = operator_path(&args.snapshot)?;
    let mut progress = ConsoleProgress {
        label: "GBA",
        quiet: ctx.json,
    };
    let report = ctx.session.gba_export(&source, &mut progress)?;
    finish(report, ctx.json, "GBA-wise project data processing completed")
}

pub fn handle_team_export_command(args: TeamExportArgs, ctx: &mut Context) -> Result<()> {
    let workbook = operator_path(&args.workbook)?;
    let mut progress = ConsoleProgress {
        label: "Team",
        quiet: ctx.json,
    };
    let report = ctx.session.team_export(&workbook, args.start_row, &mut progress)?;
    finish(report, ctx.json, "Team-wise project data processing completed")
}

fn finish(report: Option<RunReport>, json: bool, done: &str) -> Result<()> {
    let Some(report) = report else {
        if json {
            return print_json(&serde_json::json!({ "outcomes": [], "failures": [] }));
        }
        println!("{}", "No data found! Nothing was written.".yellow().bold());
        return Ok(());
    };

    if json {
        print_json(&report)?;
    } else {
        println!("{}", done.green().bold());
        print_run_report(&report);
    }

    if !report.is_success() {
        anyhow::bail!("{} workbook(s) could not be written", report.failed().len());
    }
    Ok(())
}
