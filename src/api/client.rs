use std::io::Read;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use flate2::read::GzDecoder;
use log::debug;
use rand::Rng;
use serde::de::DeserializeOwned;
use thiserror::Error;

use super::types::{
    GetDocumentListsRequest, GetDocumentListsResponse, GetDocumentsRequest, GetDocumentsResponse,
    GetTranscriptRequest,
};
use crate::models::{Document, FolderMembership, TranscriptUtterance};

pub const DEFAULT_BASE_URL: &str = "https://api.granola.ai";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const CLIENT_VERSION: &str = "6.518.0";
const EXCERPT_LEN: usize = 200;
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Safely slice a string at UTF-8 character boundaries.
/// Returns a substring from `start` to `end` byte positions, adjusted to valid char boundaries.
fn safe_slice(s: &str, start: usize, end: usize) -> &str {
    let start = s.floor_char_boundary(start);
    let end = s.ceil_char_boundary(end.min(s.len()));
    &s[start..end]
}

/// Truncate a string for log output, appending "..." if truncated.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", safe_slice(s, 0, max_len))
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Resource not found (404).")]
    NotFound,

    #[error("Granola API returned {status}: {excerpt}")]
    Status { status: u16, excerpt: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Map an HTTP status to a domain outcome. 404 is its own variant so callers
/// can treat it as an ordinary absence.
pub(crate) fn check_status(status: u16, body: &[u8]) -> Result<(), ApiError> {
    match status {
        404 => Err(ApiError::NotFound),
        s if s >= 400 => {
            let text = String::from_utf8_lossy(body);
            Err(ApiError::Status {
                status: s,
                excerpt: truncate_for_log(text.trim(), EXCERPT_LEN),
            })
        }
        _ => Ok(()),
    }
}

/// Inflate a body that is still gzip-framed after transport decoding.
/// Anything that is not gzip, or fails to inflate, is returned untouched.
pub(crate) fn decode_body(raw: Vec<u8>) -> Vec<u8> {
    if !raw.starts_with(&GZIP_MAGIC) {
        return raw;
    }
    let mut inflated = Vec::new();
    match GzDecoder::new(raw.as_slice()).read_to_end(&mut inflated) {
        Ok(_) => {
            debug!("  inflated gzip body: {} -> {} bytes", raw.len(), inflated.len());
            inflated
        }
        Err(e) => {
            debug!("  gzip magic present but inflate failed ({}), using raw body", e);
            raw
        }
    }
}

/// The remote operations the sync needs. `ApiClient` talks HTTP; tests
/// substitute an in-memory implementation.
pub trait NotesApi {
    fn list_folders(&self) -> Result<Vec<FolderMembership>, ApiError>;

    /// One page of documents starting at `offset`.
    fn documents_page(&self, limit: usize, offset: usize) -> Result<Vec<Document>, ApiError>;

    /// `Ok(None)` when the server has no transcript for the document.
    fn get_transcript(
        &self,
        document_id: &str,
    ) -> Result<Option<Vec<TranscriptUtterance>>, ApiError>;

    /// Delay between consecutive page requests.
    fn page_delay(&self) -> Duration {
        Duration::ZERO
    }
}

pub struct ApiClient {
    token: String,
    base_url: String,
    page_delay: Duration,
    client: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn new(token: String, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_delay: Duration::ZERO,
            client,
        })
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// POST and return the decoded body, with status already checked.
    fn send(&self, endpoint: &str, body: &impl serde::Serialize) -> Result<Vec<u8>, ApiError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let body_json = serde_json::to_string(body).unwrap_or_default();
        debug!("POST {} (body: {})", url, truncate_for_log(&body_json, 200));

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .header("X-Client-Version", CLIENT_VERSION)
            .json(body)
            .send()
            .map_err(|e| {
                debug!("  network error after {:?}: {}", start.elapsed(), e);
                ApiError::NetworkError(e.to_string())
            })?;

        let status = response.status().as_u16();
        let raw = response
            .bytes()
            .map_err(|e| ApiError::NetworkError(format!("failed to read body: {}", e)))?
            .to_vec();
        debug!("  response: {} in {:?} ({} bytes)", status, start.elapsed(), raw.len());

        let body = decode_body(raw);
        check_status(status, &body)?;
        Ok(body)
    }

    fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &impl serde::Serialize,
    ) -> Result<T, ApiError> {
        let bytes = self.send(endpoint, body)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            let preview = String::from_utf8_lossy(&bytes);
            debug!("  deserialization error: {}", e);
            ApiError::InvalidResponse(format!("{} (body: {})", e, truncate_for_log(&preview, 500)))
        })
    }
}

impl NotesApi for ApiClient {
    fn list_folders(&self) -> Result<Vec<FolderMembership>, ApiError> {
        let response: GetDocumentListsResponse =
            self.post("v1/get-document-lists", &GetDocumentListsRequest::default())?;
        let folders = response.into_folders();
        debug!("  got {} folders", folders.len());
        Ok(folders)
    }

    fn documents_page(&self, limit: usize, offset: usize) -> Result<Vec<Document>, ApiError> {
        let response: GetDocumentsResponse =
            self.post("v2/get-documents", &GetDocumentsRequest::page(limit, offset))?;
        debug!("  got {} documents at offset {}", response.docs.len(), offset);
        Ok(response.docs)
    }

    fn get_transcript(
        &self,
        document_id: &str,
    ) -> Result<Option<Vec<TranscriptUtterance>>, ApiError> {
        let request = GetTranscriptRequest {
            document_id: document_id.to_string(),
        };
        // API returns array directly, not wrapped in {"transcript": [...]}
        match self.post::<Vec<TranscriptUtterance>>("v1/get-document-transcript", &request) {
            Ok(utterances) => {
                debug!("  got {} utterances", utterances.len());
                Ok(Some(utterances))
            }
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn page_delay(&self) -> Duration {
        self.page_delay
    }
}

/// Sleep for the specified duration plus random jitter (0-500ms).
/// A zero base disables the pause entirely.
pub fn sleep_with_jitter(base_ms: u64) {
    if base_ms == 0 {
        return;
    }
    let jitter: u64 = rand::thread_rng().gen_range(0..500);
    thread::sleep(Duration::from_millis(base_ms + jitter));
}
