//! Pattern resolution: (target root, file pattern) -> concrete matches.
//!
//! Resolution walks the pattern one segment at a time. Intermediate segments
//! only descend into real directories (`symlink_metadata`), so a symlink inside
//! a home directory can never carry the walk outside it. The last segment
//! accepts any non-directory entry.

#![allow(missing_docs)]

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::HswError;
use crate::sweeper::patterns::{FilePattern, HistoryCategory, PatternKind, Segment};

/// File type of a match, as seen without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Symlink,
    Other,
}

/// A concrete path produced by resolving one pattern against one root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Match {
    pub path: PathBuf,
    pub root: PathBuf,
    pub pattern: String,
    pub kind: PatternKind,
    pub category: HistoryCategory,
    pub entry: EntryKind,
    pub size_bytes: u64,
}

/// A directory or entry that could not be inspected during resolution.
#[derive(Debug)]
pub struct ResolveError {
    pub path: PathBuf,
    pub error: HswError,
}

/// Output of resolving one pattern.
#[derive(Debug, Default)]
pub struct Resolution {
    pub matches: Vec<Match>,
    pub errors: Vec<ResolveError>,
}

/// Resolve `pattern` against `root`.
///
/// A missing path at any depth simply yields no matches. Other IO failures
/// are collected rather than returned so the caller can keep sweeping.
pub fn resolve(root: &Path, pattern: &FilePattern) -> Resolution {
    let mut resolution = Resolution::default();
    let segments = pattern.segments();
    let mut frontier = vec![root.to_path_buf()];

    for (index, segment) in segments.iter().enumerate() {
        let is_last = index + 1 == segments.len();
        let mut next = Vec::new();

        for dir in &frontier {
            for candidate in expand_segment(dir, segment, &mut resolution.errors) {
                let meta = match fs::symlink_metadata(&candidate) {
                    Ok(meta) => meta,
                    Err(err) if err.kind() == ErrorKind::NotFound => continue,
                    Err(err) => {
                        resolution.errors.push(ResolveError {
                            error: HswError::io(&candidate, err),
                            path: candidate,
                        });
                        continue;
                    }
                };

                if is_last {
                    if meta.is_dir() {
                        continue;
                    }
                    let entry = if meta.file_type().is_symlink() {
                        EntryKind::Symlink
                    } else if meta.is_file() {
                        EntryKind::File
                    } else {
                        EntryKind::Other
                    };
                    resolution.matches.push(Match {
                        path: candidate,
                        root: root.to_path_buf(),
                        pattern: pattern.as_str().to_string(),
                        kind: pattern.kind(),
                        category: pattern.category(),
                        entry,
                        size_bytes: if entry == EntryKind::File { meta.len() } else { 0 },
                    });
                } else if meta.is_dir() {
                    next.push(candidate);
                }
            }
        }

        frontier = next;
        if frontier.is_empty() && !is_last {
            break;
        }
    }

    resolution
}

/// Candidate paths for one segment inside `dir`, in file-name order.
fn expand_segment(dir: &Path, segment: &Segment, errors: &mut Vec<ResolveError>) -> Vec<PathBuf> {
    match segment {
        Segment::Literal(name) => vec![dir.join(name)],
        Segment::Wildcard(_) => {
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => return Vec::new(),
                Err(err) => {
                    errors.push(ResolveError {
                        path: dir.to_path_buf(),
                        error: HswError::io(dir, err),
                    });
                    return Vec::new();
                }
            };

            let mut names = Vec::new();
            for entry in entries {
                match entry {
                    Ok(entry) => {
                        let name = entry.file_name();
                        if segment.matches(&name) {
                            names.push(name);
                        }
                    }
                    Err(err) => errors.push(ResolveError {
                        path: dir.to_path_buf(),
                        error: HswError::io(dir, err),
                    }),
                }
            }
            names.sort();
            names.into_iter().map(|name| dir.join(name)).collect()
        }
    }
}
