use anyhow::Result;
use colored::*;

use super::DeltaArgs;
use crate::cli::Context;
use crate::cli::commands::operator_path;
use crate::cli::output::print_json;

pub fn handle_delta_command(args: DeltaArgs, ctx: &mut Context) -> Result<()> {
    let previous = operator_path(&args.previous)?;
    let current = operator_path(&args.current)?;
    let outcome = ctx.session.delta(&previous, &current, args.save)?;

    if ctx.json {
        return print_json(&outcome);
    }

    let stats = &outcome.stats;
    println!("{}", "Delta Summary".bold());
    println!("  Previous week unique codes:  {}", stats.previous_codes);
    println!("  Current week unique codes:   {}", stats.current_codes);
    println!("  New records:                 {}", stats.new_count.to_string().green().bold());
    println!("  Already existed:             {}", stats.already_existed);

    match &outcome.saved {
        Some(path) => println!(
            "{} {}",
            "New PFP saved to".green(),
            path.display().to_string().cyan()
        ),
        None if stats.new_count > 0 => {
            println!("Run again with {} to write the delta file", "--save".bold())
        }
        None => println!("{}", "No new records this week".yellow()),
    }
    Ok(())
}
