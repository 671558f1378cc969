//! Cross-run mutual exclusion.
//!
//! The lock file holds the epoch-millisecond time it was taken. A lock younger
//! than the staleness threshold means another run is in progress; an older one
//! is treated as abandoned and overwritten. A lock whose stamp cannot be read
//! is aged by its modification time instead, so a lock created a moment ago
//! but not yet stamped still counts as held. The guard removes the file when
//! dropped, but only while it still carries this run's stamp.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Duration, TimeZone, Utc};
use log::{debug, warn};

use super::SyncResult;

pub const STALE_AFTER_MINUTES: i64 = 30;

/// Outcome of trying to take the lock.
#[derive(Debug)]
pub enum LockAttempt {
    Acquired(RunLock),
    /// Another run holds a fresh lock taken at this time.
    Busy { held_since: DateTime<Utc> },
}

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
    stamp: String,
    released: bool,
}

/// Parse a lock file's timestamp.
fn read_lock_time(path: &Path) -> Option<DateTime<Utc>> {
    let content = fs::read_to_string(path).ok()?;
    let millis: i64 = content.trim().parse().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    let modified: SystemTime = fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// When the lock at `path` was taken: its stamp, else its modification time.
fn lock_time(path: &Path) -> Option<DateTime<Utc>> {
    read_lock_time(path).or_else(|| modified_time(path))
}

pub fn is_stale(held_since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(held_since) > Duration::minutes(STALE_AFTER_MINUTES)
}

/// Current holder of the lock at `path`, if the lock is fresh.
pub fn fresh_holder(path: &Path, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    lock_time(path).filter(|held_since| !is_stale(*held_since, now))
}

impl RunLock {
    pub fn acquire(path: &Path, now: DateTime<Utc>) -> SyncResult<LockAttempt> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let stamp = now.timestamp_millis().to_string();

        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(stamp.as_bytes())?;
                file.sync_all()?;
                debug!("Acquired run lock {}", path.display());
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => match lock_time(path) {
                Some(held_since) if !is_stale(held_since, now) => {
                    debug!("Run lock {} is held since {}", path.display(), held_since);
                    return Ok(LockAttempt::Busy { held_since });
                }
                held_since => {
                    warn!(
                        "Overwriting abandoned run lock {} (taken {:?})",
                        path.display(),
                        held_since
                    );
                    fs::write(path, stamp.as_bytes())?;
                }
            },
            Err(e) => return Err(e.into()),
        }

        Ok(LockAttempt::Acquired(RunLock {
            path: path.to_path_buf(),
            stamp,
            released: false,
        }))
    }

    pub fn release(mut self) -> SyncResult<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> SyncResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim() != self.stamp => {
                warn!(
                    "Run lock {} was taken over by another run, leaving it in place",
                    self.path.display()
                );
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            _ => {}
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Released run lock {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!("Failed to release run lock {}: {}", self.path.display(), e);
        }
    }
}
