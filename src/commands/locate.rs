use anyhow::Result;
use colored::Colorize;

use super::sync::output_locator;
use crate::cli::context::RunContext;
use crate::output::format::OutputMode;

/// Find the output folder the next run would use. Creates nothing.
pub fn run(ctx: &RunContext) -> Result<()> {
    let resolution = output_locator(ctx).plan()?;
    let exists = resolution.output_dir.is_dir();

    match ctx.output_mode {
        OutputMode::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "project": ctx.settings.project,
                    "project_dir": resolution.project_dir,
                    "output_dir": resolution.output_dir,
                    "source": resolution.source,
                    "exists": exists,
                })
            );
        }
        OutputMode::Tty => {
            println!("  Project folder:  {}", resolution.project_dir.display());
            println!("  Output folder:   {}", resolution.output_dir.display().to_string().green());
            if !exists {
                println!("                   {}", "(created on first run)".dimmed());
            }
            println!("  Found via:       {}", resolution.source);
        }
    }

    Ok(())
}
