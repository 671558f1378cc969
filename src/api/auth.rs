use std::env;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, TimeZone, Utc};
use log::debug;
use serde::Deserialize;

use crate::platform::home_dir;
use crate::sync::{SyncError, SyncResult};

/// The relevant parts of Granola's supabase.json
#[derive(Debug, Deserialize)]
struct SupabaseConfig {
    #[serde(default, deserialize_with = "deserialize_double_encoded_workos_tokens")]
    workos_tokens: Option<WorkosTokens>,
}

#[derive(Debug, Deserialize)]
struct WorkosTokens {
    #[serde(default)]
    access_token: Option<String>,
    /// Epoch milliseconds
    #[serde(default)]
    obtained_at: Option<f64>,
    /// Seconds
    #[serde(default)]
    expires_in: Option<f64>,
}

/// Deserialize workos_tokens which may be either:
/// - A JSON object (WorkosTokens directly)
/// - A double-encoded JSON string containing WorkosTokens
fn deserialize_double_encoded_workos_tokens<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<WorkosTokens>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrObject {
        String(String),
        Object(WorkosTokens),
    }

    match Option::<StringOrObject>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrObject::Object(tokens)) => Ok(Some(tokens)),
        Some(StringOrObject::String(s)) => serde_json::from_str(&s).map(Some).map_err(D::Error::custom),
    }
}

/// An access token together with its expiry, if the file recorded one.
#[derive(Debug, Clone)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Return the bearer token, or `CredentialsExpired` if `now` is past expiry.
    pub fn into_token(self, now: DateTime<Utc>) -> SyncResult<String> {
        match self.expires_at {
            Some(expires_at) if now > expires_at => Err(SyncError::CredentialsExpired { expires_at }),
            _ => Ok(self.access_token),
        }
    }
}

impl WorkosTokens {
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        let obtained = Utc.timestamp_millis_opt(self.obtained_at? as i64).single()?;
        Some(obtained + Duration::milliseconds((self.expires_in? * 1000.0) as i64))
    }
}

/// Parse a credential file's contents.
fn parse_credential(content: &str, path: &Path) -> SyncResult<Credential> {
    let config: SupabaseConfig = serde_json::from_str(content)
        .map_err(|e| SyncError::CredentialsInvalid(format!("{}: {}", path.display(), e)))?;

    let tokens = config.workos_tokens.ok_or_else(|| SyncError::CredentialsMissing {
        searched: vec![path.to_path_buf()],
    })?;
    let expires_at = tokens.expires_at();

    match tokens.access_token {
        Some(access_token) if !access_token.is_empty() => Ok(Credential {
            access_token,
            expires_at,
        }),
        _ => Err(SyncError::CredentialsMissing {
            searched: vec![path.to_path_buf()],
        }),
    }
}

/// Load the credential from the first candidate file that exists.
pub fn load_credential(candidates: &[PathBuf]) -> SyncResult<Credential> {
    debug!("Searching for supabase.json in {} locations", candidates.len());

    let path = candidates
        .iter()
        .inspect(|c| debug!("  checking: {}", c.display()))
        .find(|c| c.is_file())
        .ok_or_else(|| SyncError::CredentialsMissing {
            searched: candidates.to_vec(),
        })?;

    let content = std::fs::read_to_string(path)?;
    let credential = parse_credential(&content, path)?;
    debug!(
        "Loaded auth token from {} ({} chars, expires {:?})",
        path.display(),
        credential.access_token.len(),
        credential.expires_at
    );
    Ok(credential)
}

/// Resolve the bearer token: use the provided override as-is, or read and
/// validate the local credential file.
pub fn resolve_token(
    override_token: Option<&str>,
    configured_path: Option<&Path>,
    now: DateTime<Utc>,
) -> SyncResult<String> {
    match override_token {
        Some("") => Err(SyncError::CredentialsInvalid(
            "provided --token value is empty".to_string(),
        )),
        Some(token) => {
            debug!("Using provided --token override ({} chars)", token.len());
            Ok(token.to_string())
        }
        None => load_credential(&credential_candidates(configured_path))?.into_token(now),
    }
}

/// Platform-specific supabase.json locations, configured path first.
pub fn credential_candidates(configured_path: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(path) = configured_path {
        candidates.push(path.to_path_buf());
    }

    if let Some(home) = home_dir() {
        // macOS
        candidates.push(home.join("Library/Application Support/Granola/supabase.json"));
        // Linux
        candidates.push(home.join(".config/Granola/supabase.json"));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        candidates.push(PathBuf::from(xdg).join("Granola/supabase.json"));
    }

    // Windows (native)
    if let Ok(appdata) = env::var("APPDATA") {
        candidates.push(PathBuf::from(appdata).join("Granola/supabase.json"));
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_parse_object_tokens() {
        let json = r#"{"workos_tokens": {"access_token": "tok", "obtained_at": 1000, "expires_in": 60}}"#;
        let cred = parse_credential(json, Path::new("s.json")).unwrap();
        assert_eq!(cred.access_token, "tok");
        assert_eq!(cred.expires_at, Some(at(61_000)));
    }

    #[test]
    fn test_parse_double_encoded_tokens() {
        let json = r#"{"workos_tokens": "{\"access_token\":\"double-encoded-token\",\"obtained_at\":1700000000000,\"expires_in\":21599}"}"#;
        let cred = parse_credential(json, Path::new("s.json")).unwrap();
        assert_eq!(cred.access_token, "double-encoded-token");
        assert_eq!(cred.expires_at, Some(at(1_700_000_000_000 + 21_599_000)));
    }

    #[test]
    fn test_missing_tokens_is_credentials_missing() {
        let err = parse_credential("{}", Path::new("s.json")).unwrap_err();
        assert!(matches!(err, SyncError::CredentialsMissing { .. }));

        let err = parse_credential(r#"{"workos_tokens": {"access_token": ""}}"#, Path::new("s.json"))
            .unwrap_err();
        assert!(matches!(err, SyncError::CredentialsMissing { .. }));
    }

    #[test]
    fn test_garbage_is_credentials_invalid() {
        let err = parse_credential("not json", Path::new("s.json")).unwrap_err();
        assert!(matches!(err, SyncError::CredentialsInvalid(_)));
    }

    #[test]
    fn test_expiry_check() {
        let cred = Credential {
            access_token: "tok".to_string(),
            expires_at: Some(at(61_000)),
        };
        assert_eq!(cred.clone().into_token(at(60_000)).unwrap(), "tok");
        let err = cred.into_token(at(62_000)).unwrap_err();
        assert!(matches!(err, SyncError::CredentialsExpired { .. }));
    }

    #[test]
    fn test_unknown_expiry_is_accepted() {
        let json = r#"{"workos_tokens": {"access_token": "tok"}}"#;
        let cred = parse_credential(json, Path::new("s.json")).unwrap();
        assert!(cred.expires_at.is_none());
        assert_eq!(cred.into_token(Utc::now()).unwrap(), "tok");
    }

    #[test]
    fn test_load_credential_first_existing_wins() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing.json");
        let present = dir.path().join("supabase.json");
        std::fs::write(&present, r#"{"workos_tokens": {"access_token": "from-file"}}"#).unwrap();

        let cred = load_credential(&[missing, present]).unwrap();
        assert_eq!(cred.access_token, "from-file");
    }

    #[test]
    fn test_load_credential_none_found() {
        let dir = TempDir::new().unwrap();
        let err = load_credential(&[dir.path().join("nope.json")]).unwrap_err();
        match err {
            SyncError::CredentialsMissing { searched } => assert_eq!(searched.len(), 1),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_token_uses_override() {
        let token = resolve_token(Some("my-override-token"), None, Utc::now()).unwrap();
        assert_eq!(token, "my-override-token");
    }

    #[test]
    fn test_resolve_token_rejects_empty_override() {
        let err = resolve_token(Some(""), None, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_resolve_token_expired_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("supabase.json");
        std::fs::write(
            &path,
            r#"{"workos_tokens": {"access_token": "old", "obtained_at": 1000, "expires_in": 1}}"#,
        )
        .unwrap();

        let err = resolve_token(None, Some(&path), Utc::now()).unwrap_err();
        assert!(matches!(err, SyncError::CredentialsExpired { .. }));
    }

    #[test]
    fn test_configured_path_is_first_candidate() {
        let candidates = credential_candidates(Some(Path::new("/tmp/custom.json")));
        assert_eq!(candidates[0], PathBuf::from("/tmp/custom.json"));
    }
}
