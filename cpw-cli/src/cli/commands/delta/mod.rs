//! Week-over-week delta command

mod handler;

pub use handler::handle_delta_command;

use clap::Args;

#[derive(Args, Debug)]
pub struct DeltaArgs {
    /// Latest cleaned snapshot from the previous week (OLD PFP)
    pub previous: String,

    /// This week's cleaned snapshot
    pub current: String,

    /// Save the new records as NEW PFP/New_PFP_<date>.xlsx
    #[arg(long)]
    pub save: bool,
}
