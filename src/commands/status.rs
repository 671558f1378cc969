use anyhow::Result;
use chrono::Utc;
use colored::Colorize;

use crate::cli::context::RunContext;
use crate::output::format::{format_time, OutputMode};
use crate::sync::config::read_hint;
use crate::sync::lock::fresh_holder;
use crate::sync::state::{RunState, SyncRecord};

const RECENT_LIMIT: usize = 5;

/// Show what has been synced so far. Reads local files only.
pub fn run(ctx: &RunContext) -> Result<()> {
    let state = RunState::load(&ctx.paths.state())?;
    let running_since = fresh_holder(&ctx.paths.lock(), Utc::now());
    let cached_output = read_hint(&ctx.paths.output_hint());

    let mut recent: Vec<&SyncRecord> = state.synced.values().filter(|r| r.is_delivered()).collect();
    recent.sort_by(|a, b| b.at.cmp(&a.at));
    recent.truncate(RECENT_LIMIT);

    match ctx.output_mode {
        OutputMode::Json => {
            let recent_json: Vec<_> = recent
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "title": r.title,
                        "file": r.file,
                        "at": r.at.to_rfc3339(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": ctx.paths.root(),
                    "project": ctx.settings.project,
                    "keywords": ctx.settings.scope_keywords(),
                    "delivered": state.delivered_count(),
                    "skipped": state.skipped_count(),
                    "last_sync": state.last_sync.map(|t| t.to_rfc3339()),
                    "running": running_since.is_some(),
                    "running_since": running_since.map(|t| t.to_rfc3339()),
                    "cached_output_path": cached_output,
                    "recent": recent_json,
                })
            );
        }
        OutputMode::Tty => {
            println!("{}", "Sync status".bold());
            println!("  Project:      {}", ctx.settings.project);
            println!("  Keywords:     {}", ctx.settings.scope_keywords().join(", "));
            println!("  Data dir:     {}", ctx.paths.root().display());
            if let Some(path) = &cached_output {
                println!("  Output path:  {}", path);
            }
            println!("  Delivered:    {}", state.delivered_count().to_string().green());
            println!("  Skipped:      {}", state.skipped_count());
            match state.last_sync {
                Some(t) => println!("  Last sync:    {}", format_time(&t, &ctx.tz)),
                None => println!("  Last sync:    {}", "never".dimmed()),
            }
            match running_since {
                Some(t) => println!(
                    "  Running:      {}",
                    format!("yes, since {}", format_time(&t, &ctx.tz)).yellow()
                ),
                None => println!("  Running:      no"),
            }

            if !recent.is_empty() {
                println!();
                println!("{}", "Recently delivered:".bold());
                for record in &recent {
                    println!(
                        "  {}  {} -> {}",
                        format_time(&record.at, &ctx.tz),
                        record.title,
                        record.file.as_deref().unwrap_or_default()
                    );
                }
            }
        }
    }

    Ok(())
}
