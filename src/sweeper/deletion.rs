//! Deletion executor: per-match removal with dry-run support.
//!
//! Pre-flight before each removal:
//! 1. Every directory between the root and the leaf is still a real directory
//!    (a home owner may have swapped one for a symlink since resolution)
//! 2. Path still exists without following symlinks (may be gone already)
//! 3. Path is still not a directory (may have been swapped since resolution)
//!
//! On unix the leaf is then unlinked relative to a handle on its parent that
//! was opened without following symlinks and checked to sit inside the root,
//! so a swap after the pre-flight cannot redirect the unlink.
//!
//! A file that vanished between resolution and removal counts as already gone,
//! not as a failure. Every other IO error is handed back to the caller as a
//! failed outcome; nothing here aborts a sweep.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path};

use crate::core::errors::{HswError, Result};
use crate::sweeper::resolve::Match;

/// Configuration for the deletion executor.
#[derive(Debug, Clone, Default)]
pub struct DeletionConfig {
    /// Report what would be removed without touching the filesystem.
    pub dry_run: bool,
}

/// What happened to one match.
#[derive(Debug)]
pub enum DeletionOutcome {
    /// Dry-run: the match was reported only.
    WouldRemove,
    /// The file was unlinked.
    Removed,
    /// The file no longer existed at removal time.
    AlreadyGone,
    /// The path turned into a directory after resolution; left alone.
    SkippedDirectory,
    /// Removal failed; the sweep continues.
    Failed(HswError),
}

impl DeletionOutcome {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::WouldRemove => "would remove",
            Self::Removed => "removed",
            Self::AlreadyGone => "already gone",
            Self::SkippedDirectory => "skipped (now a directory)",
            Self::Failed(_) => "failed",
        }
    }
}

/// Removes (or, in dry-run, reports) one match at a time.
#[derive(Debug, Clone)]
pub struct DeletionExecutor {
    config: DeletionConfig,
}

impl DeletionExecutor {
    pub fn new(config: DeletionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.config.dry_run
    }

    /// Act on a single match.
    pub fn execute(&self, found: &Match) -> DeletionOutcome {
        if self.config.dry_run {
            return DeletionOutcome::WouldRemove;
        }

        match check_ancestors(&found.root, &found.path) {
            Ok(true) => {}
            Ok(false) => return DeletionOutcome::AlreadyGone,
            Err(err) => return DeletionOutcome::Failed(err),
        }

        match fs::symlink_metadata(&found.path) {
            Ok(meta) if meta.is_dir() => return DeletionOutcome::SkippedDirectory,
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => return DeletionOutcome::AlreadyGone,
            Err(err) => return DeletionOutcome::Failed(HswError::io(&found.path, err)),
        }

        match remove(&found.root, &found.path) {
            Ok(true) => DeletionOutcome::Removed,
            Ok(false) => DeletionOutcome::AlreadyGone,
            Err(err) => DeletionOutcome::Failed(err),
        }
    }
}

fn path_escape(root: &Path, path: &Path) -> HswError {
    HswError::PathEscape {
        path: path.to_path_buf(),
        root: root.to_path_buf(),
    }
}

/// Walk from `root` to the parent of `path`, requiring real directories.
///
/// `Ok(false)` means part of the chain no longer exists.
fn check_ancestors(root: &Path, path: &Path) -> Result<bool> {
    let Ok(relative) = path.strip_prefix(root) else {
        return Err(path_escape(root, path));
    };

    let mut current = root.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        let Component::Normal(name) = component else {
            return Err(path_escape(root, path));
        };
        if components.peek().is_none() {
            break;
        }
        current.push(name);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(path_escape(root, path)),
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(HswError::io(&current, err)),
        }
    }
    Ok(true)
}

/// Unlink `path` through a no-follow handle on its parent. Returns
/// `Ok(false)` if it was already gone.
#[cfg(unix)]
fn remove(root: &Path, path: &Path) -> Result<bool> {
    use std::os::fd::AsRawFd;
    use std::os::unix::fs::OpenOptionsExt;

    use nix::errno::Errno;
    use nix::fcntl::OFlag;
    use nix::unistd::{UnlinkatFlags, unlinkat};

    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(path_escape(root, path));
    };

    let dir = match fs::OpenOptions::new()
        .read(true)
        .custom_flags((OFlag::O_DIRECTORY | OFlag::O_NOFOLLOW).bits())
        .open(parent)
    {
        Ok(dir) => dir,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err)
            if matches!(
                err.raw_os_error(),
                Some(code) if code == Errno::ELOOP as i32 || code == Errno::ENOTDIR as i32
            ) =>
        {
            return Err(path_escape(root, path));
        }
        Err(err) => return Err(HswError::io(parent, err)),
    };
    ensure_opened_within_root(root, parent, &dir, path)?;

    match unlinkat(Some(dir.as_raw_fd()), name, UnlinkatFlags::NoRemoveDir) {
        Ok(()) => Ok(true),
        Err(Errno::ENOENT) => Ok(false),
        Err(errno) => Err(HswError::io(path, std::io::Error::from(errno))),
    }
}

/// The opened parent must be the directory that canonically lives under `root`.
#[cfg(unix)]
fn ensure_opened_within_root(
    root: &Path,
    parent: &Path,
    dir: &fs::File,
    path: &Path,
) -> Result<()> {
    use std::os::unix::fs::MetadataExt;

    use crate::core::paths::is_within;

    let root_canon = fs::canonicalize(root).map_err(|err| HswError::io(root, err))?;
    let parent_canon = fs::canonicalize(parent).map_err(|err| HswError::io(parent, err))?;
    if parent_canon != root_canon && !is_within(&root_canon, &parent_canon) {
        return Err(path_escape(root, path));
    }

    let opened = dir.metadata().map_err(|err| HswError::io(parent, err))?;
    let named = fs::metadata(&parent_canon).map_err(|err| HswError::io(parent, err))?;
    if (opened.dev(), opened.ino()) != (named.dev(), named.ino()) {
        return Err(path_escape(root, path));
    }
    Ok(())
}

/// Unlink `path`. Returns `Ok(false)` if it was already gone.
#[cfg(not(unix))]
fn remove(_root: &Path, path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(HswError::io(path, err)),
    }

    // Post-deletion verification: path should be gone.
    if fs::symlink_metadata(path).is_ok() {
        return Err(HswError::Runtime {
            details: format!("path still exists after removal: {}", path.display()),
        });
    }
    Ok(true)
}
