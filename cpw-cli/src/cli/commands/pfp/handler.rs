use anyhow::Result;
use colored::*;

use super::PfpFileArgs;
use crate::cli::Context;
use crate::cli::commands::operator_path;
use crate::cli::output::{print_cleaning_stats, print_json};

pub fn handle_add_unique_code_command(args: PfpFileArgs, ctx: &mut Context) -> Result<()> {
    let raw = operator_path(&args.file)?;
    let outcome = ctx.session.add_unique_code(&raw)?;

    if ctx.json {
        return print_json(&outcome);
    }
    println!(
        "{} {} records with unique codes saved to {}",
        "Project Plan Analysis created:".green().bold(),
        outcome.records,
        outcome.path.display().to_string().cyan()
    );
    Ok(())
}

pub fn handle_clean_command(args: PfpFileArgs, ctx: &mut Context) -> Result<()> {
    let coded = operator_path(&args.file)?;
    let outcome = ctx.session.clean_file(&coded)?;

    if ctx.json {
        return print_json(&outcome);
    }
    println!(
        "{} {}",
        "Cleaned data saved to OLD PFP:".green().bold(),
        outcome.path.display().to_string().cyan()
    );
    print_cleaning_stats(&outcome.stats);
    Ok(())
}

pub fn handle_process_week_command(args: PfpFileArgs, ctx: &mut Context) -> Result<()> {
    let raw = operator_path(&args.file)?;
    let outcome = ctx.session.process_week(&raw)?;

    if ctx.json {
        return print_json(&outcome);
    }
    println!(
        "{} {}",
        "Unique codes saved to".green(),
        outcome.identity.path.display().to_string().cyan()
    );
    println!(
        "{} {}",
        "Cleaned data saved to".green(),
        outcome.cleaned.path.display().to_string().cyan()
    );
    print_cleaning_stats(&outcome.cleaned.stats);
    println!();
    println!(
        "Use {} as the current week file for {}",
        outcome.cleaned.path.display().to_string().bold(),
        "cpw delta".bold()
    );
    Ok(())
}
