//! Finding the project folder inside a synced cloud drive.
//!
//! Google Drive for desktop mounts each account under the cloud-storage root
//! as `GoogleDrive-<account>`, with `My Drive` and `Shared drives/<name>`
//! beneath it. Teams keep project folders in a few conventional places; each
//! convention is one [`LocationStrategy`], tried in priority order across
//! every mount. A cached hint from provisioning short-circuits the search.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use super::{SyncError, SyncResult};

const MOUNT_PREFIX: &str = "GoogleDrive";
const PERSONAL_DRIVE: &str = "My Drive";
const SHARED_DRIVES: &str = "Shared drives";
const CLIENT_CONTEXT: &str = "client-context";
pub const SEARCH_MAX_DEPTH: usize = 4;

/// One detected cloud-storage mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudMount {
    pub root: PathBuf,
}

impl CloudMount {
    pub fn personal_root(&self) -> Option<PathBuf> {
        let path = self.root.join(PERSONAL_DRIVE);
        path.is_dir().then_some(path)
    }

    /// Shared drive roots, sorted by name.
    pub fn shared_roots(&self) -> Vec<PathBuf> {
        sorted_subdirs(&self.root.join(SHARED_DRIVES))
    }
}

fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// Google Drive mounts under `cloud_root`, sorted by name.
pub fn detect_mounts(cloud_root: &Path) -> Vec<CloudMount> {
    sorted_subdirs(cloud_root)
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(MOUNT_PREFIX))
        })
        .map(|root| CloudMount { root })
        .collect()
}

fn existing_dir(path: PathBuf) -> Option<PathBuf> {
    path.is_dir().then_some(path)
}

/// A rule for where a project folder might live inside one mount.
pub trait LocationStrategy {
    fn name(&self) -> &'static str;
    fn locate(&self, mount: &CloudMount, project: &str) -> Option<PathBuf>;
}

/// `My Drive/client-context/<project>`
pub struct PersonalNested;

impl LocationStrategy for PersonalNested {
    fn name(&self) -> &'static str {
        "personal drive, client-context"
    }

    fn locate(&self, mount: &CloudMount, project: &str) -> Option<PathBuf> {
        existing_dir(mount.personal_root()?.join(CLIENT_CONTEXT).join(project))
    }
}

/// `Shared drives/<any>/client-context/<project>`, then `Shared drives/<any>/<project>`
pub struct SharedDrive;

impl LocationStrategy for SharedDrive {
    fn name(&self) -> &'static str {
        "shared drive"
    }

    fn locate(&self, mount: &CloudMount, project: &str) -> Option<PathBuf> {
        mount.shared_roots().into_iter().find_map(|shared| {
            existing_dir(shared.join(CLIENT_CONTEXT).join(project))
                .or_else(|| existing_dir(shared.join(project)))
        })
    }
}

/// `My Drive/<project>`
pub struct PersonalDirect;

impl LocationStrategy for PersonalDirect {
    fn name(&self) -> &'static str {
        "personal drive"
    }

    fn locate(&self, mount: &CloudMount, project: &str) -> Option<PathBuf> {
        existing_dir(mount.personal_root()?.join(project))
    }
}

/// Case-insensitive directory-name search under `My Drive`, shallowest match wins.
pub struct PersonalSearch {
    pub max_depth: usize,
}

impl LocationStrategy for PersonalSearch {
    fn name(&self) -> &'static str {
        "personal drive search"
    }

    fn locate(&self, mount: &CloudMount, project: &str) -> Option<PathBuf> {
        let wanted = project.to_lowercase();
        WalkDir::new(mount.personal_root()?)
            .min_depth(1)
            .max_depth(self.max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.file_type().is_dir() && !e.file_name().to_string_lossy().starts_with('.')
            })
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().to_lowercase() == wanted)
            .min_by_key(|e| e.depth())
            .map(|e| e.into_path())
    }
}

pub fn default_strategies() -> Vec<Box<dyn LocationStrategy>> {
    vec![
        Box::new(PersonalNested),
        Box::new(SharedDrive),
        Box::new(PersonalDirect),
        Box::new(PersonalSearch {
            max_depth: SEARCH_MAX_DEPTH,
        }),
    ]
}

/// Where artifacts go, and how that was decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub project_dir: PathBuf,
    pub output_dir: PathBuf,
    pub source: &'static str,
}

pub struct OutputLocator {
    pub project: String,
    pub subfolder: String,
    pub hint_path: Option<PathBuf>,
    pub cloud_root: Option<PathBuf>,
    pub strategies: Vec<Box<dyn LocationStrategy>>,
}

impl OutputLocator {
    pub fn new(project: &str, subfolder: &str) -> Self {
        Self {
            project: project.to_string(),
            subfolder: subfolder.to_string(),
            hint_path: None,
            cloud_root: None,
            strategies: default_strategies(),
        }
    }

    pub fn with_hint(mut self, hint_path: PathBuf) -> Self {
        self.hint_path = Some(hint_path);
        self
    }

    pub fn with_cloud_root(mut self, cloud_root: Option<PathBuf>) -> Self {
        self.cloud_root = cloud_root;
        self
    }

    /// Find the project folder without touching the filesystem.
    pub fn find(&self) -> SyncResult<(PathBuf, &'static str)> {
        if let Some(dir) = self.cached_dir() {
            return Ok((dir, "cached path"));
        }

        let mounts = self
            .cloud_root
            .as_deref()
            .map(detect_mounts)
            .unwrap_or_default();
        debug!("Detected {} cloud-storage mounts", mounts.len());
        if mounts.is_empty() {
            return Err(self.not_found(match &self.cloud_root {
                Some(root) => format!("No Google Drive mounts under {}.", root.display()),
                None => "Cloud-storage root is unknown.".to_string(),
            }));
        }

        for strategy in &self.strategies {
            for mount in &mounts {
                if let Some(dir) = strategy.locate(mount, &self.project) {
                    debug!("  {} matched {}", strategy.name(), dir.display());
                    return Ok((dir, strategy.name()));
                }
                debug!("  {}: no match in {}", strategy.name(), mount.root.display());
            }
        }

        Err(self.not_found(format!(
            "Checked {} mount(s); create a '{}' folder in Google Drive.",
            mounts.len(),
            self.project
        )))
    }

    /// Where artifacts would go, without creating anything.
    pub fn plan(&self) -> SyncResult<Resolution> {
        let (project_dir, source) = self.find()?;
        let output_dir = if project_dir.file_name().and_then(|n| n.to_str()) == Some(self.subfolder.as_str()) {
            project_dir.clone()
        } else {
            project_dir.join(&self.subfolder)
        };

        Ok(Resolution {
            project_dir,
            output_dir,
            source,
        })
    }

    /// Find the project folder and make sure the write subfolder exists.
    pub fn resolve(&self) -> SyncResult<Resolution> {
        let resolution = self.plan()?;
        fs::create_dir_all(&resolution.output_dir)?;
        Ok(resolution)
    }

    fn cached_dir(&self) -> Option<PathBuf> {
        let hint = super::config::read_hint(self.hint_path.as_deref()?)?;
        let path = PathBuf::from(hint);
        if path.is_dir() {
            Some(path)
        } else {
            debug!("Cached output path {} no longer exists", path.display());
            None
        }
    }

    fn not_found(&self, detail: String) -> SyncError {
        SyncError::OutputLocationNotFound {
            project: self.project.clone(),
            detail,
        }
    }
}
