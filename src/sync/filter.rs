//! Which listed documents belong to the project and still need delivering.

use std::collections::HashSet;

use crate::models::{Document, FolderMembership};

use super::state::RunState;

/// Case-insensitive keyword scope over folder names and document titles.
#[derive(Debug, Clone)]
pub struct ProjectScope {
    keywords: Vec<String>,
}

impl ProjectScope {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    /// Ids of every document in a folder whose name matches a keyword.
    pub fn folder_members<'a>(&self, folders: &'a [FolderMembership]) -> HashSet<&'a str> {
        folders
            .iter()
            .filter(|f| self.matches(&f.name))
            .flat_map(|f| f.document_ids.iter().map(String::as_str))
            .collect()
    }
}

/// The result of filtering one listing.
#[derive(Debug, Default)]
pub struct SyncSet {
    /// In scope and never processed, in listing order
    pub pending: Vec<Document>,
    pub already_synced: usize,
    pub out_of_scope: usize,
}

/// Split a listing into what to deliver now, preserving listing order.
///
/// A document is in scope if a matching folder contains it or its title
/// matches. In-scope ids with any record in `state` are never returned.
/// Deleted documents and documents without an id are out of scope.
pub fn compute_sync_set(
    documents: Vec<Document>,
    folders: &[FolderMembership],
    state: &RunState,
    scope: &ProjectScope,
) -> SyncSet {
    let members = scope.folder_members(folders);
    let mut set = SyncSet::default();
    let mut seen: HashSet<String> = HashSet::new();

    for doc in documents {
        let Some(id) = doc.id.as_deref().filter(|id| !id.is_empty()) else {
            set.out_of_scope += 1;
            continue;
        };

        let in_scope = doc.deleted_at.is_none()
            && (members.contains(id) || doc.title.as_deref().is_some_and(|t| scope.matches(t)));

        if !in_scope {
            set.out_of_scope += 1;
        } else if state.contains(id) || !seen.insert(id.to_string()) {
            set.already_synced += 1;
        } else {
            set.pending.push(doc);
        }
    }

    set
}
