//! Persisted run state: which document ids have been processed, and how.
//!
//! Stored as `{"synced": {id: record}, "lastSync": timestamp|null}` and
//! rewritten wholesale (temp file + rename) on every save. Records are only
//! ever added: an id with a record is never processed again.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use super::{SyncError, SyncResult};

/// One processed document.
///
/// Exactly one of `file` (delivered) or `skipped` (reason) is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    pub at: DateTime<Utc>,
}

impl SyncRecord {
    pub fn delivered(title: &str, file: &str, at: DateTime<Utc>) -> Self {
        Self {
            title: title.to_string(),
            file: Some(file.to_string()),
            skipped: None,
            at,
        }
    }

    pub fn skipped(title: &str, reason: &str, at: DateTime<Utc>) -> Self {
        Self {
            title: title.to_string(),
            file: None,
            skipped: Some(reason.to_string()),
            at,
        }
    }

    pub fn is_delivered(&self) -> bool {
        self.file.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub synced: BTreeMap<String, SyncRecord>,
    #[serde(default, rename = "lastSync")]
    pub last_sync: Option<DateTime<Utc>>,
}

impl RunState {
    /// Load state from `path`; a missing file is a fresh, empty state.
    pub fn load(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            debug!("No state file at {}, starting empty", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let state: RunState = serde_json::from_str(&content)
            .map_err(|e| SyncError::State(format!("parse {}: {}", path.display(), e)))?;
        debug!("Loaded state with {} records from {}", state.synced.len(), path.display());
        Ok(state)
    }

    /// Write the whole state atomically.
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SyncError::State(format!("serialize: {}", e)))?;

        // Write to temp file first for atomic operation
        let temp_path = path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;

        debug!("Saved state with {} records to {}", self.synced.len(), path.display());
        Ok(())
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.synced.contains_key(document_id)
    }

    /// Add a record for a document that has none yet. Returns false (and
    /// leaves the existing record alone) if the id was already processed.
    pub fn record(&mut self, document_id: &str, record: SyncRecord) -> bool {
        if self.synced.contains_key(document_id) {
            return false;
        }
        self.synced.insert(document_id.to_string(), record);
        true
    }

    pub fn delivered_count(&self) -> usize {
        self.synced.values().filter(|r| r.is_delivered()).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.synced.len() - self.delivered_count()
    }
}
