//! Per-scenario workspaces built from fixture directories.

use crate::error::{HarnessError, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// A directory owned by one scenario.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Use an existing directory as-is.
    #[must_use]
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Copy `fixture` into a fresh `work_root/name`, replacing any previous
    /// copy.
    ///
    /// # Errors
    ///
    /// `FixtureNotFound` if `fixture` is not a directory, I/O errors while
    /// copying.
    pub fn from_fixture(fixture: &Path, work_root: &Path, name: &str) -> Result<Self> {
        if !fixture.is_dir() {
            return Err(HarnessError::FixtureNotFound {
                path: fixture.to_path_buf(),
            });
        }
        let root = work_root.join(sanitize(name));
        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        copy_tree(fixture, &root)?;
        debug!(
            fixture = %fixture.display(),
            workspace = %root.display(),
            "Extracted fixture"
        );
        Ok(Self { root })
    }

    /// Empty workspace at `work_root/name`.
    ///
    /// # Errors
    ///
    /// I/O errors while creating the directory.
    pub fn empty(work_root: &Path, name: &str) -> Result<Self> {
        let root = work_root.join(sanitize(name));
        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path against the workspace root.
    #[must_use]
    pub fn path(&self, rel: impl AsRef<Path>) -> PathBuf {
        let rel = rel.as_ref();
        if rel.is_absolute() {
            rel.to_path_buf()
        } else {
            self.root.join(rel)
        }
    }

    /// Sub-directory of the fixture, for multi-project fixtures.
    ///
    /// # Errors
    ///
    /// `FixtureNotFound` if the directory does not exist.
    pub fn subdir(&self, rel: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = self.path(rel);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(HarnessError::FixtureNotFound { path: dir })
        }
    }

    /// Remove a directory under the workspace if it exists.
    ///
    /// # Errors
    ///
    /// I/O errors other than "not found".
    pub fn delete_directory(&self, rel: impl AsRef<Path>) -> Result<()> {
        delete_directory(&self.path(rel))
    }
}

/// Remove `dir` recursively; a missing directory is fine.
///
/// # Errors
///
/// I/O errors other than "not found".
pub fn delete_directory(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            debug!(dir = %dir.display(), "Deleted directory");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(HarnessError::with_context(
            format!("deleting {}", dir.display()),
            err,
        )),
    }
}

/// Copy a directory tree. Symlinks are followed.
///
/// # Errors
///
/// I/O errors while reading or writing.
pub fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry.map_err(|err| {
            HarnessError::with_context(format!("walking {}", from.display()), err)
        })?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(|err| HarnessError::with_context("relativizing fixture path", err))?;
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Hex digits of the name hash appended to rewritten names.
const NAME_HASH_LEN: usize = 8;

/// Keep scenario names usable as a single path component.
///
/// Names that had to be rewritten get a suffix derived from the original
/// name, so `a b` and `a_b` never share a directory.
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let single = Path::new(&cleaned).components().count() == 1
        && matches!(Path::new(&cleaned).components().next(), Some(Component::Normal(_)));
    let base = if cleaned.is_empty() || !single {
        "scenario"
    } else {
        cleaned.as_str()
    };
    if base == name {
        return cleaned;
    }
    let digest = format!("{:x}", Sha256::digest(name.as_bytes()));
    format!("{base}-{}", &digest[..NAME_HASH_LEN])
}
