mod api;
mod cli;
mod commands;
mod models;
mod output;
mod platform;
mod sync;

use anyhow::Result;
use clap::Parser;

use cli::args::{Cli, Commands};
use cli::context::RunContext;

fn main() -> Result<()> {
    setup_broken_pipe_handling();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = RunContext::from_args(cli.json, cli.no_color, cli.utc, cli.data_dir.as_deref())?;

    match cli.command() {
        Commands::Run { dry_run } => commands::sync::run(&ctx, cli.token.as_deref(), dry_run)?,
        Commands::Status => commands::status::run(&ctx)?,
        Commands::Locate => commands::locate::run(&ctx)?,
    }

    Ok(())
}

/// Initialize logging based on the `--verbose` flag or `GRANSYNC_LOG` env var.
///
/// - `GRANSYNC_LOG` env var: full filter control (e.g. `GRANSYNC_LOG=gransync::api=trace`)
/// - `--verbose`: sets `gransync` crate to `Debug` level
/// - Otherwise: `Warn` level only
fn init_logging(verbose: bool) {
    let env_var = std::env::var("GRANSYNC_LOG").ok();

    let mut builder = env_logger::Builder::new();
    builder.format_target(true);
    builder.format_module_path(false);

    if let Some(ref filter) = env_var {
        builder.parse_filters(filter);
    } else if verbose {
        builder.filter_module("gransync", log::LevelFilter::Debug);
    } else {
        builder.filter_level(log::LevelFilter::Warn);
    }

    builder.init();
}

/// Exit quietly when stdout is closed early (`gransync status --json | head -1`).
///
/// On Unix SIGPIPE is reset to its default so the OS ends the process. The
/// panic hook covers the remaining case where `println!` hits a closed pipe.
fn setup_broken_pipe_handling() {
    #[cfg(unix)]
    unsafe {
        // SIGPIPE = 13, SIG_DFL = 0
        unsafe extern "C" {
            fn signal(sig: i32, handler: usize) -> usize;
        }
        signal(13, 0);
    }

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info
            .payload()
            .downcast_ref::<String>()
            .map(|s| s.as_str())
            .or_else(|| info.payload().downcast_ref::<&str>().copied())
            .unwrap_or("");

        if msg.contains("failed printing to stdout") {
            std::process::exit(0);
        }

        default_hook(info);
    }));
}
