//! Built-in history file patterns: one tagged type for exact paths and globs.
//!
//! Every pattern is a root-relative path split into segments. A segment is
//! either a literal name or a compiled wildcard (`*` and `?`, never crossing
//! `/`). Exact patterns are simply all-literal, so both kinds flow through the
//! same resolver.

#![allow(missing_docs)]

use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Component, Path};

use regex::bytes::Regex;
use serde::Serialize;

use crate::core::errors::{HswError, Result};

/// What kind of history a pattern targets; used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryCategory {
    Shell,
    Repl,
    DatabaseClient,
    Editor,
    Pager,
    Network,
    /// Discovered from a running process environment.
    LiveHistfile,
}

impl fmt::Display for HistoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Shell => "shell",
            Self::Repl => "repl",
            Self::DatabaseClient => "database-client",
            Self::Editor => "editor",
            Self::Pager => "pager",
            Self::Network => "network",
            Self::LiveHistfile => "live-histfile",
        };
        f.write_str(label)
    }
}

/// Pattern kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Exact,
    Glob,
}

/// One path component of a pattern.
///
/// Names are compared as raw bytes so entries that are not valid UTF-8 still
/// match.
#[derive(Debug, Clone)]
pub enum Segment {
    Literal(OsString),
    Wildcard(Regex),
}

impl Segment {
    /// Whether a directory entry name satisfies this segment.
    #[must_use]
    pub fn matches(&self, name: impl AsRef<OsStr>) -> bool {
        let name = name.as_ref();
        match self {
            Self::Literal(literal) => literal == name,
            Self::Wildcard(re) => re.is_match(name.as_encoded_bytes()),
        }
    }
}

/// A static rule describing files of interest, relative to a target root.
#[derive(Debug, Clone)]
pub struct FilePattern {
    raw: Cow<'static, str>,
    kind: PatternKind,
    category: HistoryCategory,
    segments: Vec<Segment>,
}

impl FilePattern {
    /// Compile an exact relative path. Wildcard characters are rejected.
    pub fn exact(raw: impl Into<Cow<'static, str>>, category: HistoryCategory) -> Result<Self> {
        Self::compile(raw.into(), PatternKind::Exact, category)
    }

    /// Compile a glob pattern relative to the root.
    pub fn glob(raw: impl Into<Cow<'static, str>>, category: HistoryCategory) -> Result<Self> {
        Self::compile(raw.into(), PatternKind::Glob, category)
    }

    /// An exact pattern for a `HISTFILE` path found under a root.
    ///
    /// Built from path components rather than text, so any byte sequence the
    /// filesystem allows is kept as-is.
    pub fn live_histfile(relative: &Path) -> Result<Self> {
        let raw: Cow<'static, str> = Cow::Owned(relative.to_string_lossy().into_owned());
        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => segments.push(Segment::Literal(name.to_os_string())),
                _ => {
                    return Err(HswError::InvalidPattern {
                        pattern: raw.to_string(),
                        details: "live histfile must be a plain path below the root".to_string(),
                    });
                }
            }
        }
        if segments.is_empty() {
            return Err(HswError::InvalidPattern {
                pattern: raw.to_string(),
                details: "pattern is empty".to_string(),
            });
        }
        Ok(Self {
            raw,
            kind: PatternKind::Exact,
            category: HistoryCategory::LiveHistfile,
            segments,
        })
    }

    fn compile(raw: Cow<'static, str>, kind: PatternKind, category: HistoryCategory) -> Result<Self> {
        let invalid = |details: &str| HswError::InvalidPattern {
            pattern: raw.to_string(),
            details: details.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("pattern is empty"));
        }
        if raw.starts_with('/') {
            return Err(invalid("pattern must be relative to the target root"));
        }

        let mut segments = Vec::new();
        for part in raw.split('/') {
            match part {
                "" => return Err(invalid("empty path component")),
                "." | ".." => return Err(invalid("dot components are not allowed")),
                _ => {}
            }
            if part.contains("**") {
                return Err(invalid("recursive `**` is not supported"));
            }
            let has_wildcard = part.contains(['*', '?']);
            match (kind, has_wildcard) {
                (PatternKind::Exact, true) => {
                    return Err(invalid("exact pattern contains wildcard characters"));
                }
                (PatternKind::Glob, true) => {
                    segments.push(Segment::Wildcard(segment_regex(&raw, part)?));
                }
                (_, false) => segments.push(Segment::Literal(part.into())),
            }
        }

        if kind == PatternKind::Glob && segments.iter().all(|s| matches!(s, Segment::Literal(_))) {
            return Err(invalid("glob pattern has no wildcard; use an exact pattern"));
        }

        Ok(Self {
            raw,
            kind,
            category,
            segments,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub const fn kind(&self) -> PatternKind {
        self.kind
    }

    #[must_use]
    pub const fn category(&self) -> HistoryCategory {
        self.category
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }
}

impl fmt::Display for FilePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Translate one glob component to an anchored regex.
///
/// `*` matches any run of bytes except `/` (leading dots included), `?`
/// exactly one. Unicode mode is off so names need not be UTF-8.
fn segment_regex(pattern: &str, segment: &str) -> Result<Regex> {
    let mut regex_str = String::with_capacity(segment.len() * 2 + 8);
    regex_str.push_str("(?s-u)^");
    for c in segment.chars() {
        match c {
            '*' => regex_str.push_str("[^/]*"),
            '?' => regex_str.push_str("[^/]"),
            '.' | '+' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '$' | '|' | '\\' => {
                regex_str.push('\\');
                regex_str.push(c);
            }
            c => regex_str.push(c),
        }
    }
    regex_str.push('$');

    Regex::new(&regex_str).map_err(|err| HswError::InvalidPattern {
        pattern: pattern.to_string(),
        details: err.to_string(),
    })
}

const BUILTIN_EXACT: &[(&str, HistoryCategory)] = &[
    (".bash_history", HistoryCategory::Shell),
    (".zsh_history", HistoryCategory::Shell),
    (".sh_history", HistoryCategory::Shell),
    (".history", HistoryCategory::Shell),
    (".histfile", HistoryCategory::Shell),
    (".local/share/fish/fish_history", HistoryCategory::Shell),
    (".python_history", HistoryCategory::Repl),
    (".node_repl_history", HistoryCategory::Repl),
    (".mysql_history", HistoryCategory::DatabaseClient),
    (".psql_history", HistoryCategory::DatabaseClient),
    (".sqlite_history", HistoryCategory::DatabaseClient),
    (".rediscli_history", HistoryCategory::DatabaseClient),
    (".viminfo", HistoryCategory::Editor),
    (".lesshst", HistoryCategory::Pager),
    (".wget-hsts", HistoryCategory::Network),
];

const BUILTIN_GLOB: &[(&str, HistoryCategory)] = &[
    (".*_history", HistoryCategory::Shell),
    (".bash_history-*", HistoryCategory::Shell),
    (".zsh_history.*", HistoryCategory::Shell),
    (".local/share/fish/fish_history*", HistoryCategory::Shell),
    (".*.swp", HistoryCategory::Editor),
];

/// The built-in pattern table, compiled once per run.
#[derive(Debug, Clone)]
pub struct PatternRegistry {
    patterns: Vec<FilePattern>,
}

impl PatternRegistry {
    /// Compile the built-in table. Exact patterns come first so reports list
    /// well-known files before glob expansions.
    pub fn builtin() -> Result<Self> {
        let exact = BUILTIN_EXACT
            .iter()
            .map(|&(raw, category)| FilePattern::exact(raw, category));
        let glob = BUILTIN_GLOB
            .iter()
            .map(|&(raw, category)| FilePattern::glob(raw, category));
        let patterns = exact.chain(glob).collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    #[must_use]
    pub fn patterns(&self) -> &[FilePattern] {
        &self.patterns
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
