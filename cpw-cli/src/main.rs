//! `cpw`: Capacity Planning Workbook tool

mod classify;
mod cli;
mod config;
mod fanout;
mod paths;
mod pfp;
mod store;
mod visibility;
mod workflow;

use clap::Parser;
use env_logger::Env;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("cpw=info")).init();

    cli::run(cli::Cli::parse())
}
