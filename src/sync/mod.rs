//! The reconciliation engine: which documents go where, exactly once.

pub mod config;
pub mod engine;
pub mod filename;
pub mod filter;
pub mod location;
pub mod lock;
pub mod render;
pub mod state;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No Granola credentials found. Searched:\n{}\n\nPlease ensure Granola is installed and you are logged in.", format_paths(.searched))]
    CredentialsMissing { searched: Vec<PathBuf> },

    #[error("Granola credentials expired at {expires_at}. Open Granola to refresh the login, then run again.")]
    CredentialsExpired { expires_at: DateTime<Utc> },

    #[error("Granola credentials are unreadable: {0}")]
    CredentialsInvalid(String),

    #[error("No output folder for project '{project}' found in any cloud-storage mount. {detail}")]
    OutputLocationNotFound { project: String, detail: String },

    #[error(transparent)]
    RemoteApi(#[from] ApiError),

    #[error("Failed to sync '{title}': {message}")]
    TransientDocument { title: String, message: String },

    #[error("State file error: {0}")]
    State(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

fn format_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_missing_lists_paths() {
        let err = SyncError::CredentialsMissing {
            searched: vec![PathBuf::from("/a/supabase.json"), PathBuf::from("/b/supabase.json")],
        };
        let msg = err.to_string();
        assert!(msg.contains("  - /a/supabase.json"));
        assert!(msg.contains("  - /b/supabase.json"));
    }

    #[test]
    fn test_remote_api_is_transparent() {
        let err = SyncError::from(ApiError::Status {
            status: 502,
            excerpt: "bad gateway".to_string(),
        });
        assert_eq!(err.to_string(), "Granola API returned 502: bad gateway");
    }
}
