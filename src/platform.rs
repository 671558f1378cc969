use std::env;
use std::path::PathBuf;

use anyhow::{bail, Result};

pub fn home_dir() -> Option<PathBuf> {
    env::var("HOME")
        .ok()
        .filter(|h| !h.is_empty())
        .map(PathBuf::from)
        .or_else(|| env::var("USERPROFILE").ok().map(PathBuf::from))
}

/// Get the data directory for gransync (state, lock, config, provisioning hints)
pub fn data_dir() -> Result<PathBuf> {
    let dir = if let Ok(xdg) = env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg).join("gransync")
    } else if let Some(home) = home_dir() {
        if cfg!(target_os = "macos") {
            home.join("Library").join("Application Support").join("gransync")
        } else {
            home.join(".local").join("share").join("gransync")
        }
    } else {
        bail!("Cannot determine data directory");
    };

    Ok(dir)
}

/// Where cloud-storage providers mount their drives.
pub fn default_cloud_storage_root() -> Option<PathBuf> {
    home_dir().map(|home| home.join("Library").join("CloudStorage"))
}

/// The OS account name, used when no operator name was provisioned.
pub fn os_user_name() -> Option<String> {
    ["USER", "USERNAME", "LOGNAME"]
        .iter()
        .filter_map(|var| env::var(var).ok())
        .map(|name| name.trim().to_string())
        .find(|name| !name.is_empty())
}
