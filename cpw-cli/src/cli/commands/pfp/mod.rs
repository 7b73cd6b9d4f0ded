//! PFP preparation commands: unique codes and cleaning

mod handler;

pub use handler::{
    handle_add_unique_code_command, handle_clean_command, handle_process_week_command,
};

use clap::Args;

#[derive(Args, Debug)]
pub struct PfpFileArgs {
    /// Workbook path; surrounding quotes are ignored
    pub file: String,
}
