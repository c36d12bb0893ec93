//! Best-effort discovery of live `HISTFILE` settings from process environments.
//!
//! This is an optional extra, off unless requested. Reading `/proc/<pid>/environ`
//! races with process exit and is limited by permission boundaries, so the
//! result is whatever could be read at that instant and nothing more. Only
//! Linux exposes the data; other platforms yield an empty list.

#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Environment variable naming a shell's history file.
pub const HISTFILE_VAR: &str = "HISTFILE";

/// A `HISTFILE` value together with the uid owning the process that set it.
///
/// The value is user-controlled; callers only act on it when the owner lines
/// up with the file and the root it sits in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LiveHistfile {
    pub path: PathBuf,
    pub uid: u32,
}

/// Collect every distinct absolute `HISTFILE` value visible under `/proc`.
pub fn live_histfiles() -> Vec<LiveHistfile> {
    #[cfg(target_os = "linux")]
    {
        live_histfiles_in(Path::new("/proc"))
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

/// Scan a procfs-shaped directory: numeric entries with an `environ` file.
pub fn live_histfiles_in(proc_root: &Path) -> Vec<LiveHistfile> {
    let Ok(entries) = std::fs::read_dir(proc_root) else {
        return Vec::new();
    };

    let mut found = BTreeSet::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        // Only numeric directories (PIDs).
        if name_str.is_empty() || !name_str.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let Some(uid) = owner_uid(&entry.path()) else {
            continue;
        };
        let Ok(raw) = std::fs::read(entry.path().join("environ")) else {
            continue;
        };
        if let Some(path) = histfile_from_environ(&raw) {
            found.insert(LiveHistfile { path, uid });
        }
    }
    found.into_iter().collect()
}

/// Uid owning a path, without following a final symlink.
#[must_use]
pub fn owner_uid(path: &Path) -> Option<u32> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        std::fs::symlink_metadata(path).ok().map(|meta| meta.uid())
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        None
    }
}

/// Extract an absolute `HISTFILE` from NUL-separated `KEY=VALUE` pairs.
pub fn histfile_from_environ(raw: &[u8]) -> Option<PathBuf> {
    let prefix = format!("{HISTFILE_VAR}=");
    raw.split(|b| *b == 0)
        .filter_map(|pair| pair.strip_prefix(prefix.as_bytes()))
        .filter(|value| value.first() == Some(&b'/'))
        .map(bytes_to_path)
        .next_back()
}

fn bytes_to_path(bytes: &[u8]) -> PathBuf {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        PathBuf::from(std::ffi::OsStr::from_bytes(bytes))
    }
    #[cfg(not(unix))]
    {
        PathBuf::from(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_absolute_histfile() {
        let raw = b"PATH=/usr/bin\0HISTFILE=/home/alice/.custom_hist\0TERM=xterm\0";
        assert_eq!(
            histfile_from_environ(raw),
            Some(PathBuf::from("/home/alice/.custom_hist"))
        );
    }

    #[test]
    fn ignores_relative_and_empty_histfile() {
        assert_eq!(histfile_from_environ(b"HISTFILE=relative\0"), None);
        assert_eq!(histfile_from_environ(b"HISTFILE=\0"), None);
        assert_eq!(histfile_from_environ(b"NOTHISTFILE=/x\0"), None);
        assert_eq!(histfile_from_environ(b""), None);
    }

    #[test]
    fn scans_fake_proc_tree() {
        let proc_dir = tempfile::tempdir().unwrap();
        let p1 = proc_dir.path().join("101");
        let p2 = proc_dir.path().join("202");
        let self_dir = proc_dir.path().join("self");
        for dir in [&p1, &p2, &self_dir] {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(p1.join("environ"), b"HISTFILE=/home/a/.h1\0").unwrap();
        std::fs::write(p2.join("environ"), b"HISTFILE=/home/a/.h1\0X=1\0").unwrap();
        std::fs::write(self_dir.join("environ"), b"HISTFILE=/home/z/.skip\0").unwrap();

        let found = live_histfiles_in(proc_dir.path());
        let paths: Vec<&Path> = found.iter().map(|live| live.path.as_path()).collect();
        assert_eq!(paths, vec![Path::new("/home/a/.h1")]);
    }

    #[cfg(unix)]
    #[test]
    fn records_owner_of_process_entry() {
        let proc_dir = tempfile::tempdir().unwrap();
        let pid = proc_dir.path().join("42");
        std::fs::create_dir_all(&pid).unwrap();
        std::fs::write(pid.join("environ"), b"HISTFILE=/home/a/.h\0").unwrap();

        let found = live_histfiles_in(proc_dir.path());
        assert_eq!(found.len(), 1);
        assert_eq!(Some(found[0].uid), owner_uid(&pid));
        assert_eq!(found[0].uid, nix::unistd::geteuid().as_raw());
    }

    #[test]
    fn missing_proc_root_yields_nothing() {
        assert!(live_histfiles_in(Path::new("/nonexistent/proc")).is_empty());
    }
}
