//! Command-line surface: one subcommand per workflow step

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::config::CpwConfig;
use crate::store::XlsxStore;
use crate::workflow::Session;

use commands::delta::DeltaArgs;
use commands::export::{GbaExportArgs, TeamExportArgs};
use commands::pfp::PfpFileArgs;

#[derive(Parser, Debug)]
#[command(name = "cpw", version, about = "Capacity-planning workbook tool for the CPW package")]
pub struct Cli {
    /// Config file (defaults to $CPW_CONFIG, then ~/.config/cpw-tool/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print a JSON report instead of the summary
    #[arg(long, global = true)]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Run date used for file names, write dates and the current week
    #[arg(long, global = true, env = "CPW_RUN_DATE", value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// First run, step 1: add unique codes to a raw PFP extract
    AddUniqueCode(PfpFileArgs),
    /// First run, step 2: clean a unique-coded file and save it to OLD PFP
    Clean(PfpFileArgs),
    /// Weekly run, step 1: add unique codes and clean in one go
    ProcessWeek(PfpFileArgs),
    /// Weekly run, step 2: records new since the previous week
    Delta(DeltaArgs),
    /// Fan a cleaned snapshot or delta out to the GBA workbooks
    GbaExport(GbaExportArgs),
    /// Fan a GBA workbook out to the team workbooks
    TeamExport(TeamExportArgs),
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

/// Per-invocation state shared by the handlers
pub struct Context {
    pub session: Session<XlsxStore>,
    pub json: bool,
}

pub fn run(cli: Cli) -> Result<()> {
    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = CpwConfig::load(cli.config.as_deref())?;
    let today = cli
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    log::debug!("Run date {}", today);

    let mut ctx = Context {
        session: Session::new(config, XlsxStore::new(), today),
        json: cli.json,
    };

    match cli.command {
        Commands::AddUniqueCode(args) => {
            commands::pfp::handle_add_unique_code_command(args, &mut ctx)
        }
        Commands::Clean(args) => commands::pfp::handle_clean_command(args, &mut ctx),
        Commands::ProcessWeek(args) => commands::pfp::handle_process_week_command(args, &mut ctx),
        Commands::Delta(args) => commands::delta::handle_delta_command(args, &mut ctx),
        Commands::GbaExport(args) => commands::export::handle_gba_export_command(args, &mut ctx),
        Commands::TeamExport(args) => commands::export::handle_team_export_command(args, &mut ctx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_team_export() {
        let cli = Cli::try_parse_from([
            "cpw",
            "team-export",
            "C:\\CPW\\02 GBA Workbooks\\CPW Tool_Mobility_Main.xlsm",
            "--start-row",
            "40",
            "--date",
            "2025-03-07",
        ])
        .unwrap();

        assert_eq!(cli.date, NaiveDate::from_ymd_opt(2025, 3, 7));
        match cli.command {
            Commands::TeamExport(args) => assert_eq!(args.start_row, 40),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_date() {
        assert!(Cli::try_parse_from(["cpw", "--date", "07/03/2025", "clean", "x.xlsx"]).is_err());
    }
}
