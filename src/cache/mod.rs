//! Local artifact cache handle and best-effort cleanup.
//!
//! The cache is an injected collaborator: every cleanup call takes an
//! [`ArtifactStore`] and a coordinate prefix. There is no internal locking;
//! scenarios coordinate by using unique group namespaces.
//!
//! Lock tolerance depends on the execution mode. An embedded invocation can
//! keep a handle on an artifact after it returns, so a locked entry is
//! logged and skipped. Isolated processes never outlive their invocation,
//! so the same failure there is reported as an I/O error.

use crate::error::{HarnessError, Result};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Windows `ERROR_SHARING_VIOLATION`.
const SHARING_VIOLATION: i32 = 32;
/// Windows `ERROR_LOCK_VIOLATION`.
const LOCK_VIOLATION: i32 = 33;

/// Artifact coordinate (group, artifact, version).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Coordinate {
    pub group: String,
    pub artifact: String,
    pub version: String,
}

impl Coordinate {
    #[must_use]
    pub fn new(
        group: impl Into<String>,
        artifact: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            artifact: artifact.into(),
            version: version.into(),
        }
    }

    /// Parse `group:artifact:version`.
    ///
    /// # Errors
    ///
    /// Returns a config error unless there are exactly three non-empty parts.
    pub fn parse(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.split(':').map(str::trim).collect();
        match parts.as_slice() {
            [g, a, v] if !g.is_empty() && !a.is_empty() && !v.is_empty() => {
                Ok(Self::new(*g, *a, *v))
            }
            _ => Err(HarnessError::Config(format!(
                "expected group:artifact:version, got '{text}'"
            ))),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.artifact, self.version)
    }
}

/// The part of the coordinate space a cleanup call targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoordinatePrefix {
    /// Everything under a group id.
    Group(String),
    /// One artifact version.
    Artifact(Coordinate),
}

impl CoordinatePrefix {
    /// Path segments of this prefix in the repository layout.
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        let group_path = |group: &str| group.split('.').collect::<PathBuf>();
        match self {
            Self::Group(group) => group_path(group),
            Self::Artifact(coord) => group_path(&coord.group)
                .join(&coord.artifact)
                .join(&coord.version),
        }
    }
}

impl fmt::Display for CoordinatePrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(group) => f.write_str(group),
            Self::Artifact(coord) => write!(f, "{coord}"),
        }
    }
}

/// One removable cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Storage behind the local artifact cache.
pub trait ArtifactStore: Send + Sync {
    /// Root directory of the store.
    fn root(&self) -> &Path;

    /// Entries under `prefix`, children before their parents.
    fn entries(&self, prefix: &CoordinatePrefix) -> io::Result<Vec<CacheEntry>>;

    /// Remove a single entry. Directories are only removed when empty.
    fn remove(&self, entry: &CacheEntry) -> io::Result<()>;
}

/// Directory-backed cache using the `group/as/path/artifact/version` layout.
#[derive(Debug, Clone)]
pub struct LocalArtifactCache {
    root: PathBuf,
}

impl LocalArtifactCache {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of an artifact version directory.
    #[must_use]
    pub fn artifact_dir(&self, coord: &Coordinate) -> PathBuf {
        self.root
            .join(CoordinatePrefix::Artifact(coord.clone()).relative_path())
    }

    /// Whether anything is cached under `prefix`.
    #[must_use]
    pub fn contains(&self, prefix: &CoordinatePrefix) -> bool {
        self.root.join(prefix.relative_path()).exists()
    }
}

impl ArtifactStore for LocalArtifactCache {
    fn root(&self) -> &Path {
        &self.root
    }

    fn entries(&self, prefix: &CoordinatePrefix) -> io::Result<Vec<CacheEntry>> {
        let base = self.root.join(prefix.relative_path());
        if !base.exists() {
            return Ok(Vec::new());
        }
        WalkDir::new(&base)
            .contents_first(true)
            .into_iter()
            .map(|entry| {
                let entry = entry.map_err(io::Error::other)?;
                Ok(CacheEntry {
                    path: entry.path().to_path_buf(),
                    is_dir: entry.file_type().is_dir(),
                })
            })
            .collect()
    }

    fn remove(&self, entry: &CacheEntry) -> io::Result<()> {
        if entry.is_dir {
            std::fs::remove_dir(&entry.path)
        } else {
            std::fs::remove_file(&entry.path)
        }
    }
}

/// Result of a cleanup call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Every matching entry is gone.
    Removed { entries: usize },
    /// Some entries were locked and left behind.
    Skipped {
        reason: String,
        locked: Vec<PathBuf>,
        removed: usize,
    },
}

impl CleanupOutcome {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Removed { .. })
    }
}

/// Whether an I/O error means "someone still holds this file".
#[must_use]
pub fn is_lock_error(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy
    ) || (cfg!(windows)
        && matches!(err.raw_os_error(), Some(SHARING_VIOLATION | LOCK_VIOLATION)))
}

/// Removes cached artifacts before a run so the tool re-resolves them.
pub struct ArtifactStoreCleaner<'a> {
    store: &'a dyn ArtifactStore,
    tolerate_locks: bool,
}

impl<'a> ArtifactStoreCleaner<'a> {
    #[must_use]
    pub fn new(store: &'a dyn ArtifactStore, tolerate_locks: bool) -> Self {
        Self {
            store,
            tolerate_locks,
        }
    }

    /// Delete everything cached under `group`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error for non-lock failures, and for lock failures
    /// when locks are not tolerated.
    pub fn delete_artifacts(&self, group: &str) -> Result<CleanupOutcome> {
        self.clean(&CoordinatePrefix::Group(group.to_string()))
    }

    /// Delete one cached artifact version.
    ///
    /// # Errors
    ///
    /// Same as [`Self::delete_artifacts`].
    pub fn delete_artifact(&self, coord: &Coordinate) -> Result<CleanupOutcome> {
        self.clean(&CoordinatePrefix::Artifact(coord.clone()))
    }

    /// Delete every entry under `prefix`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::delete_artifacts`].
    pub fn clean(&self, prefix: &CoordinatePrefix) -> Result<CleanupOutcome> {
        let entries = self.store.entries(prefix).map_err(|err| {
            HarnessError::with_context(format!("listing cache entries for {prefix}"), err)
        })?;

        let mut removed = 0usize;
        let mut locked: Vec<PathBuf> = Vec::new();

        for entry in &entries {
            // A directory above a locked file cannot be emptied.
            if entry.is_dir && locked.iter().any(|p| p.starts_with(&entry.path)) {
                continue;
            }
            match self.store.remove(entry) {
                Ok(()) => {
                    removed += 1;
                    debug!(path = %entry.path.display(), "Removed cache entry");
                }
                Err(err) if is_lock_error(&err) && self.tolerate_locks => {
                    warn!(
                        path = %entry.path.display(),
                        error = %err,
                        "Cache entry is locked, leaving it in place"
                    );
                    locked.push(entry.path.clone());
                }
                Err(err) => {
                    return Err(HarnessError::with_context(
                        format!("removing cache entry {}", entry.path.display()),
                        err,
                    ));
                }
            }
        }

        if locked.is_empty() {
            info!(prefix = %prefix, entries = removed, "Cleaned artifact cache");
            Ok(CleanupOutcome::Removed { entries: removed })
        } else {
            warn!(
                prefix = %prefix,
                locked = locked.len(),
                removed,
                "Partial cache cleanup"
            );
            Ok(CleanupOutcome::Skipped {
                reason: format!(
                    "{} entr{} under {prefix} held by an in-process invocation",
                    locked.len(),
                    if locked.len() == 1 { "y" } else { "ies" }
                ),
                locked,
                removed,
            })
        }
    }
}
