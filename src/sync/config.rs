//! Settings and on-disk locations.
//!
//! Settings live in `config.toml` inside the data directory, next to the run
//! state, the run lock, and the two hint files the provisioning step writes
//! (`output-path` and `user-name`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{SyncError, SyncResult};
use crate::api::client::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use crate::platform::{default_cloud_storage_root, os_user_name};

/// User-tunable settings. Every field has a default so a missing or partial
/// `config.toml` is fine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Project folder name searched for in the cloud drive
    pub project: String,

    /// Case-insensitive keywords matched against folder names and titles.
    /// Empty means "the project name".
    pub keywords: Vec<String>,

    /// Email domain that is not annotated in attendee lists
    pub own_domain: Option<String>,

    /// Subfolder of the project folder that artifacts are written to
    pub output_subfolder: String,

    /// Name files `<date>_<user>_<slug>.md` instead of `<date>_<slug>.md`
    pub include_user_in_filename: bool,

    /// Directory holding cloud-storage mounts (default `~/Library/CloudStorage`)
    pub cloud_storage_root: Option<PathBuf>,

    /// Explicit supabase.json location, tried before the platform defaults
    pub credentials_path: Option<PathBuf>,

    pub api_base_url: String,

    /// Pause between document list pages
    pub page_delay_ms: u64,

    /// Base pause between transcript fetches (jitter is added)
    pub document_delay_ms: u64,

    /// Per-request network timeout
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project: "Loblaw".to_string(),
            keywords: Vec::new(),
            own_domain: None,
            output_subfolder: "Granola Transcripts".to_string(),
            include_user_in_filename: false,
            cloud_storage_root: None,
            credentials_path: None,
            api_base_url: DEFAULT_BASE_URL.to_string(),
            page_delay_ms: 1000,
            document_delay_ms: 500,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Load settings from `path`, returning defaults if the file doesn't exist.
    pub fn load(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content =
            fs::read_to_string(path).map_err(|e| SyncError::Config(format!("read: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SyncError::Config(format!("parse {}: {}", path.display(), e)))
    }

    /// Lowercased scope keywords, defaulting to the project name.
    pub fn scope_keywords(&self) -> Vec<String> {
        let keywords: Vec<String> = self
            .keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if keywords.is_empty() {
            vec![self.project.to_lowercase()]
        } else {
            keywords
        }
    }

    pub fn cloud_storage_root(&self) -> Option<PathBuf> {
        self.cloud_storage_root.clone().or_else(default_cloud_storage_root)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Files gransync keeps in its data directory.
#[derive(Debug, Clone)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn state(&self) -> PathBuf {
        self.root.join("state.json")
    }

    pub fn lock(&self) -> PathBuf {
        self.root.join("sync.lock")
    }

    /// Cached output directory written by provisioning
    pub fn output_hint(&self) -> PathBuf {
        self.root.join("output-path")
    }

    /// Operator display name written by provisioning
    pub fn operator_name(&self) -> PathBuf {
        self.root.join("user-name")
    }

    pub fn ensure_root(&self) -> SyncResult<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }
}

/// First non-empty line of a single-line hint file.
pub fn read_hint(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Operator name from the provisioned file, else the OS account, else "unknown".
pub fn operator_name(paths: &DataPaths) -> String {
    read_hint(&paths.operator_name())
        .or_else(os_user_name)
        .unwrap_or_else(|| "unknown".to_string())
}
