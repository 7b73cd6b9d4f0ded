//! Fan-out commands

mod handler;

pub use handler::{handle_gba_export_command, handle_team_export_command};

use clap::Args;

#[derive(Args, Debug)]
pub struct GbaExportArgs {
    /// Cleaned snapshot or New_PFP delta file inside the CPW package
    pub snapshot: String,
}

#[derive(Args, Debug)]
pub struct TeamExportArgs {
    /// GBA workbook (CPW Tool_<GBA>_Main.xlsm)
    pub workbook: String,

    /// First row of the plan sheet to export; 1 or less means 2
    #[arg(long, default_value_t = 2)]
    pub start_row: u32,
}
