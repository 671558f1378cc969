use std::path::Path;

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};

use crate::output::format::{detect_output_mode, OutputMode};
use crate::platform;
use crate::sync::config::{DataPaths, Settings};

/// Everything a command needs that comes from flags, the environment, or
/// `config.toml`.
pub struct RunContext {
    pub output_mode: OutputMode,
    pub tz: FixedOffset,
    pub paths: DataPaths,
    pub settings: Settings,
}

impl RunContext {
    /// Create context from CLI arguments
    pub fn from_args(json: bool, no_color: bool, utc: bool, data_dir: Option<&Path>) -> Result<Self> {
        if no_color {
            colored::control::set_override(false);
        }

        let output_mode = detect_output_mode(json);
        let tz = display_offset(utc);

        let root = match data_dir {
            Some(dir) => dir.to_path_buf(),
            None => platform::data_dir()?,
        };
        let paths = DataPaths::new(root);
        let settings = Settings::load(&paths.config())
            .with_context(|| format!("Failed to load {}", paths.config().display()))?;

        Ok(RunContext {
            output_mode,
            tz,
            paths,
            settings,
        })
    }
}

fn display_offset(utc: bool) -> FixedOffset {
    if utc {
        Utc.fix()
    } else {
        *chrono::Local::now().offset()
    }
}
