//! `gransync run`: one sync pass.
//!
//! Takes the run lock, reads the credential, finds the output folder, then
//! hands the listing to the engine. A fresh lock held by another run is a
//! normal outcome and exits successfully.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use log::{debug, warn};

use crate::api::{self, ApiClient};
use crate::cli::context::RunContext;
use crate::output::format::{format_time, plural, OutputMode};
use crate::output::progress::create_spinner;
use crate::sync::config::operator_name;
use crate::sync::engine::{self, Listing, RunSummary, SyncContext};
use crate::sync::filename::{FileNaming, OutputDir};
use crate::sync::filter::ProjectScope;
use crate::sync::location::{OutputLocator, Resolution};
use crate::sync::lock::{LockAttempt, RunLock};
use crate::sync::render::RenderProfile;
use crate::sync::state::RunState;

/// Run the sync command
pub fn run(ctx: &RunContext, token: Option<&str>, dry_run: bool) -> Result<()> {
    ctx.paths
        .ensure_root()
        .with_context(|| format!("Failed to create {}", ctx.paths.root().display()))?;

    let lock = match RunLock::acquire(&ctx.paths.lock(), Utc::now())? {
        LockAttempt::Acquired(lock) => lock,
        LockAttempt::Busy { held_since } => {
            print_busy(held_since, ctx);
            return Ok(());
        }
    };

    let result = if dry_run {
        dry_run_pass(ctx, token)
    } else {
        sync_pass(ctx, token)
    };

    if let Err(e) = lock.release() {
        warn!("Failed to remove lock file: {}", e);
    }
    result
}

/// The locator configured for this machine.
pub fn output_locator(ctx: &RunContext) -> OutputLocator {
    OutputLocator::new(&ctx.settings.project, &ctx.settings.output_subfolder)
        .with_hint(ctx.paths.output_hint())
        .with_cloud_root(ctx.settings.cloud_storage_root())
}

fn sync_context(ctx: &RunContext) -> SyncContext {
    let settings = &ctx.settings;
    let operator = operator_name(&ctx.paths);
    debug!("Operator: {}", operator);

    SyncContext {
        scope: ProjectScope::new(&settings.scope_keywords()),
        naming: FileNaming::new(settings.include_user_in_filename, &operator),
        profile: RenderProfile {
            operator,
            own_domain: settings.own_domain.clone(),
            tz: ctx.tz,
        },
        state_path: ctx.paths.state(),
        document_delay_ms: settings.document_delay_ms,
    }
}

fn connect(ctx: &RunContext, token: Option<&str>) -> Result<ApiClient> {
    let settings = &ctx.settings;
    let token = api::resolve_token(token, settings.credentials_path.as_deref(), Utc::now())?;
    let client = ApiClient::new(token, &settings.api_base_url, settings.timeout())?
        .with_page_delay(Duration::from_millis(settings.page_delay_ms));
    Ok(client)
}

fn fetch_listing(client: &ApiClient) -> Result<Listing> {
    let spinner = create_spinner("Listing documents from Granola...");
    let listing = engine::fetch_listing(client);
    spinner.finish_and_clear();
    Ok(listing?)
}

fn sync_pass(ctx: &RunContext, token: Option<&str>) -> Result<()> {
    let client = connect(ctx, token)?;
    let resolution = output_locator(ctx).resolve()?;
    eprintln!(
        "[gransync] Writing to {} (found via {})",
        resolution.output_dir.display(),
        resolution.source
    );

    let sync_ctx = sync_context(ctx);
    let mut state = RunState::load(&sync_ctx.state_path)?;
    let listing = fetch_listing(&client)?;
    let summary = engine::reconcile(&client, listing, &sync_ctx, &mut state, &resolution.output_dir)?;

    print_summary(&summary, &resolution, ctx.output_mode);
    Ok(())
}

fn dry_run_pass(ctx: &RunContext, token: Option<&str>) -> Result<()> {
    let client = connect(ctx, token)?;
    let resolution = output_locator(ctx).plan()?;

    let sync_ctx = sync_context(ctx);
    let state = RunState::load(&sync_ctx.state_path)?;
    let listing = fetch_listing(&client)?;
    let (listed, set) = engine::plan(listing, &state, &sync_ctx);

    let mut out = OutputDir::snapshot_or_empty(&resolution.output_dir)?;
    let planned: Vec<(&str, String)> = set
        .pending
        .iter()
        .map(|doc| (doc.title_or_untitled(), out.claim(&sync_ctx.naming.stem(doc))))
        .collect();

    match ctx.output_mode {
        OutputMode::Json => {
            let documents: Vec<_> = set
                .pending
                .iter()
                .zip(&planned)
                .map(|(doc, (title, file))| {
                    serde_json::json!({
                        "id": doc.id,
                        "title": title,
                        "file": file,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "action": "sync",
                    "dry_run": true,
                    "output_dir": out.path(),
                    "source": resolution.source,
                    "listed": listed,
                    "already_synced": set.already_synced,
                    "out_of_scope": set.out_of_scope,
                    "pending": documents,
                })
            );
        }
        OutputMode::Tty => {
            println!();
            println!(
                "[dry-run] {} would be delivered to {}:",
                plural(planned.len(), "document"),
                out.path().display()
            );
            for (title, file) in &planned {
                println!("  {} -> {}", title, file.cyan());
            }
            println!(
                "  ({} already synced, {} out of scope)",
                set.already_synced, set.out_of_scope
            );
        }
    }

    Ok(())
}

fn print_busy(held_since: DateTime<Utc>, ctx: &RunContext) {
    match ctx.output_mode {
        OutputMode::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "action": "sync",
                    "status": "busy",
                    "held_since": held_since.to_rfc3339(),
                })
            );
        }
        OutputMode::Tty => {
            eprintln!(
                "[gransync] Another sync is already running (started {}); exiting.",
                format_time(&held_since, &ctx.tz)
            );
        }
    }
}

fn print_summary(summary: &RunSummary, resolution: &Resolution, mode: OutputMode) {
    match mode {
        OutputMode::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "action": "sync",
                    "dry_run": false,
                    "output_dir": resolution.output_dir,
                    "source": resolution.source,
                    "listed": summary.listed,
                    "delivered": summary.delivered,
                    "skipped": summary.skipped,
                    "failed": summary.failed,
                    "already_synced": summary.already_synced,
                    "out_of_scope": summary.out_of_scope,
                })
            );
        }
        OutputMode::Tty => {
            let failed = if summary.failed > 0 {
                summary.failed.to_string().red().to_string()
            } else {
                summary.failed.to_string()
            };

            println!();
            println!("{}", "Sync complete:".bold());
            println!("  Delivered:       {}", summary.delivered.to_string().green());
            println!("  Skipped:         {}", summary.skipped);
            println!("  Failed:          {}", failed);
            println!("  Already synced:  {}", summary.already_synced);
            println!("  Out of scope:    {}", summary.out_of_scope);
            println!("  Output:          {}", resolution.output_dir.display());
            if summary.failed > 0 {
                println!(
                    "{}",
                    "Failed documents will be retried on the next run.".yellow()
                );
            }
        }
    }
}
