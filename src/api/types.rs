use serde::{Deserialize, Serialize};

use crate::models::{Document, FolderMembership};

// ============================================================================
// Transcript Request
// ============================================================================

/// Request body for fetching a transcript
#[derive(Debug, Serialize)]
pub struct GetTranscriptRequest {
    pub document_id: String,
}

// ============================================================================
// Document Request/Response
// ============================================================================

/// Request body for one page of documents
#[derive(Debug, Serialize)]
pub struct GetDocumentsRequest {
    pub limit: usize,
    pub offset: usize,
    pub include_last_viewed_panel: bool,
}

impl GetDocumentsRequest {
    pub fn page(limit: usize, offset: usize) -> Self {
        Self {
            limit,
            offset,
            include_last_viewed_panel: false,
        }
    }
}

/// Response from get-documents
#[derive(Debug, Deserialize)]
pub struct GetDocumentsResponse {
    #[serde(default)]
    pub docs: Vec<Document>,
}

// ============================================================================
// Document List (folder) Request/Response
// ============================================================================

/// Request body for fetching document lists (empty object)
#[derive(Debug, Serialize, Default)]
pub struct GetDocumentListsRequest {}

/// get-document-lists has been seen both as a bare array and wrapped in `lists`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum GetDocumentListsResponse {
    Bare(Vec<ApiDocumentList>),
    Wrapped { lists: Vec<ApiDocumentList> },
}

impl GetDocumentListsResponse {
    pub fn into_folders(self) -> Vec<FolderMembership> {
        let lists = match self {
            GetDocumentListsResponse::Bare(lists) => lists,
            GetDocumentListsResponse::Wrapped { lists } => lists,
        };
        lists.into_iter().map(ApiDocumentList::into_folder).collect()
    }
}

/// A document list as returned by the API
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ApiDocumentList {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub document_ids: Option<Vec<String>>,
    #[serde(default)]
    pub documents: Option<Vec<ApiDocumentRef>>,
}

/// A document reference inside a list; only the id matters here
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ApiDocumentRef {
    #[serde(default)]
    pub id: Option<String>,
}

impl ApiDocumentList {
    pub fn into_folder(self) -> FolderMembership {
        let name = self.title.or(self.name).unwrap_or_default();
        let mut document_ids = self.document_ids.unwrap_or_default();
        if let Some(docs) = self.documents {
            document_ids.extend(docs.into_iter().filter_map(|d| d.id));
        }
        FolderMembership { name, document_ids }
    }
}
