//! The per-run reconciliation: list, filter, deliver, record.
//!
//! Each pending document ends in exactly one [`DocumentOutcome`]. Delivered
//! and skipped documents get a permanent record; failed ones get none, so
//! the next run picks them up again.

use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info, warn};

use super::filename::{FileNaming, OutputDir};
use super::filter::{compute_sync_set, ProjectScope, SyncSet};
use super::render::{render_document, RenderProfile};
use super::state::{RunState, SyncRecord};
use super::{SyncError, SyncResult};
use crate::api::pages::DocumentPages;
use crate::api::{sleep_with_jitter, NotesApi};
use crate::models::{Document, FolderMembership};
use crate::output::progress::SyncProgress;

/// Save state early after this many deliveries.
pub const CHECKPOINT_EVERY: usize = 10;

pub const SKIP_NO_TRANSCRIPT: &str = "no transcript";

/// Everything a run needs besides the API and the state.
#[derive(Debug, Clone)]
pub struct SyncContext {
    pub scope: ProjectScope,
    pub naming: FileNaming,
    pub profile: RenderProfile,
    pub state_path: PathBuf,
    pub document_delay_ms: u64,
}

#[derive(Debug)]
pub enum DocumentOutcome {
    Delivered { file: String },
    Skipped { reason: String },
    Failed(SyncError),
}

/// The full remote listing for one run.
#[derive(Debug, Default)]
pub struct Listing {
    pub folders: Vec<FolderMembership>,
    pub documents: Vec<Document>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub listed: usize,
    pub out_of_scope: usize,
    pub already_synced: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn from_set(listed: usize, set: &SyncSet) -> Self {
        Self {
            listed,
            out_of_scope: set.out_of_scope,
            already_synced: set.already_synced,
            ..Default::default()
        }
    }
}

/// Fetch folders and every document page. Any error here aborts the run.
pub fn fetch_listing<A: NotesApi + ?Sized>(api: &A) -> SyncResult<Listing> {
    let folders = api.list_folders()?;
    let mut pages = DocumentPages::new(api);
    let documents = pages.by_ref().collect::<Result<Vec<_>, _>>()?;
    debug!(
        "Listed {} folders and {} documents in {} pages",
        folders.len(),
        documents.len(),
        pages.pages_fetched()
    );
    Ok(Listing { folders, documents })
}

/// Split a listing against the current state without side effects.
pub fn plan(listing: Listing, state: &RunState, ctx: &SyncContext) -> (usize, SyncSet) {
    let listed = listing.documents.len();
    let set = compute_sync_set(listing.documents, &listing.folders, state, &ctx.scope);
    (listed, set)
}

/// Fetch, render and write one document.
pub fn process_document<A: NotesApi + ?Sized>(
    api: &A,
    doc: &Document,
    ctx: &SyncContext,
    out: &mut OutputDir,
) -> DocumentOutcome {
    let id = doc.id.as_deref().unwrap_or_default();
    let title = doc.title_or_untitled();
    let failed = |message: String| {
        DocumentOutcome::Failed(SyncError::TransientDocument {
            title: title.to_string(),
            message,
        })
    };

    let transcript = match api.get_transcript(id) {
        Ok(Some(transcript)) => transcript,
        Ok(None) => {
            return DocumentOutcome::Skipped {
                reason: SKIP_NO_TRANSCRIPT.to_string(),
            };
        }
        Err(e) => return failed(e.to_string()),
    };

    let text = render_document(doc, Some(&transcript), &ctx.profile);
    match out.write_new(&ctx.naming.stem(doc), &text) {
        Ok(file) => DocumentOutcome::Delivered { file },
        Err(e) => failed(e.to_string()),
    }
}

/// Deliver every pending document of a listing, then finalize the state.
///
/// State is saved after every [`CHECKPOINT_EVERY`]th delivery and once more
/// at the end, whatever happened to individual documents.
pub fn reconcile<A: NotesApi + ?Sized>(
    api: &A,
    listing: Listing,
    ctx: &SyncContext,
    state: &mut RunState,
    output_dir: &Path,
) -> SyncResult<RunSummary> {
    let (listed, set) = plan(listing, state, ctx);
    let mut summary = RunSummary::from_set(listed, &set);
    info!(
        "{} listed, {} pending, {} already synced, {} out of scope",
        listed,
        set.pending.len(),
        set.already_synced,
        set.out_of_scope
    );

    let mut out = OutputDir::snapshot(output_dir)?;
    let total = set.pending.len();
    let progress = SyncProgress::new(total as u64);

    for (i, doc) in set.pending.iter().enumerate() {
        let id = doc.id.as_deref().unwrap_or_default();
        let title = doc.title_or_untitled();
        progress.begin(title);

        match process_document(api, doc, ctx, &mut out) {
            DocumentOutcome::Delivered { file } => {
                progress.println(&format!("[{}/{}] {} -> {}", i + 1, total, title, file));
                state.record(id, SyncRecord::delivered(title, &file, Utc::now()));
                summary.delivered += 1;

                if summary.delivered % CHECKPOINT_EVERY == 0 {
                    debug!("Checkpoint after {} deliveries", summary.delivered);
                    if let Err(e) = state.save(&ctx.state_path) {
                        warn!("Checkpoint save failed (will retry at end of run): {}", e);
                    }
                }
            }
            DocumentOutcome::Skipped { reason } => {
                progress.println(&format!("[{}/{}] {} skipped: {}", i + 1, total, title, reason));
                state.record(id, SyncRecord::skipped(title, &reason, Utc::now()));
                summary.skipped += 1;
            }
            DocumentOutcome::Failed(e) => {
                warn!("{}", e);
                progress.println(&format!("[{}/{}] {} failed: {}", i + 1, total, title, e));
                summary.failed += 1;
            }
        }

        progress.inc();

        if i + 1 < total {
            sleep_with_jitter(ctx.document_delay_ms);
        }
    }

    progress.finish();

    state.last_sync = Some(Utc::now());
    state.save(&ctx.state_path)?;

    Ok(summary)
}
