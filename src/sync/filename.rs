//! Artifact file names: `<date>_<slug>.md`, optionally `<date>_<user>_<slug>.md`,
//! with `-2`, `-3`, ... appended on collision.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::SyncResult;
use crate::models::Document;

const SLUG_MAX_LEN: usize = 60;
const EXTENSION: &str = "md";

/// Lowercase, keep alphanumerics, collapse whitespace and hyphen runs to
/// single hyphens, truncate. Empty input gives "untitled".
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' {
            pending_hyphen = true;
        }
    }

    let truncated: String = slug.chars().take(SLUG_MAX_LEN).collect();
    let truncated = truncated.trim_matches('-');
    if truncated.is_empty() {
        "untitled".to_string()
    } else {
        truncated.to_string()
    }
}

/// The date part of a file name: the calendar date of `created_at` as written
/// by the server (UTC), or "undated". File names use this on every machine;
/// the rendered heading shows the date in the display zone instead.
pub fn document_date(doc: &Document) -> String {
    doc.created_at
        .as_deref()
        .and_then(|s| s.get(..10))
        .filter(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").is_ok())
        .unwrap_or("undated")
        .to_string()
}

/// How artifact names are built.
#[derive(Debug, Clone, Default)]
pub struct FileNaming {
    /// Slugged operator name, present when names carry the user
    pub user_slug: Option<String>,
}

impl FileNaming {
    pub fn new(include_user: bool, operator: &str) -> Self {
        Self {
            user_slug: include_user.then(|| slugify(operator)),
        }
    }

    /// Name stem before any disambiguation suffix.
    pub fn stem(&self, doc: &Document) -> String {
        let date = document_date(doc);
        let slug = slugify(doc.title_or_untitled());
        match &self.user_slug {
            Some(user) => format!("{}_{}_{}", date, user, slug),
            None => format!("{}_{}", date, slug),
        }
    }
}

/// The set of names already present in the output directory, snapshotted once
/// per run and extended as files are written.
#[derive(Debug)]
pub struct OutputDir {
    dir: PathBuf,
    taken: HashSet<String>,
}

impl OutputDir {
    /// A directory that does not exist yet holds nothing.
    pub fn snapshot_or_empty(dir: &Path) -> SyncResult<Self> {
        if dir.is_dir() {
            Self::snapshot(dir)
        } else {
            Ok(Self {
                dir: dir.to_path_buf(),
                taken: HashSet::new(),
            })
        }
    }

    pub fn snapshot(dir: &Path) -> SyncResult<Self> {
        let taken: HashSet<String> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        debug!("Output dir {} holds {} entries", dir.display(), taken.len());
        Ok(Self {
            dir: dir.to_path_buf(),
            taken,
        })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// First free name for `stem`: `stem.md`, then `stem-2.md`, `stem-3.md`, ...
    pub fn unique_name(&self, stem: &str) -> String {
        (1..)
            .map(|n| candidate(stem, n))
            .find(|name| !self.taken.contains(name))
            .unwrap_or_else(|| candidate(stem, 1))
    }

    /// Reserve the first free name for `stem` without writing anything.
    pub fn claim(&mut self, stem: &str) -> String {
        let name = self.unique_name(stem);
        self.taken.insert(name.clone());
        name
    }

    /// Write `contents` under the first free name for `stem` and return that
    /// name. Never overwrites: a name that appeared on disk since the snapshot
    /// is marked taken and the next suffix is tried.
    pub fn write_new(&mut self, stem: &str, contents: &str) -> SyncResult<String> {
        loop {
            let name = self.unique_name(stem);
            let path = self.dir.join(&name);
            match create_new(&path) {
                Ok(file) => {
                    discard_on_error(&path, fill(file, contents))?;
                    self.taken.insert(name.clone());
                    return Ok(name);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{} appeared since snapshot, trying next suffix", name);
                    self.taken.insert(name);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn candidate(stem: &str, n: usize) -> String {
    if n == 1 {
        format!("{}.{}", stem, EXTENSION)
    } else {
        format!("{}-{}.{}", stem, n, EXTENSION)
    }
}

fn create_new(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Takes the file by value so it is closed before any cleanup.
fn fill(mut file: File, contents: &str) -> io::Result<()> {
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}

/// Remove `path` if writing it failed. The document has no record yet, so the
/// next run retries it and must not find a partial artifact in the way.
fn discard_on_error(path: &Path, written: io::Result<()>) -> SyncResult<()> {
    if let Err(e) = written {
        warn!("Writing {} failed ({}), removing it", path.display(), e);
        if let Err(remove_err) = fs::remove_file(path) {
            warn!("Could not remove {}: {}", path.display(), remove_err);
        }
        return Err(e.into());
    }
    Ok(())
}
