//! Target-root discovery from the account database plus the administrative root.
//!
//! Policy: every account's home directory (field 6 of an `/etc/passwd`-format
//! line) is a candidate root, filtered by `min_uid` and optionally by login
//! shell. The administrative root and any configured extra roots are appended.
//! Homes of `/` or empty are dropped; duplicates collapse to the first
//! occurrence after syntactic normalization.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::config::RootsConfig;
use crate::core::errors::{HswError, Result};
use crate::core::paths::absolute_path;

/// Where a target root came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RootSource {
    Account { user: String, uid: u32 },
    AdminRoot,
    Extra,
    CommandLine,
}

/// A directory within which file patterns are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetRoot {
    pub path: PathBuf,
    pub source: RootSource,
}

impl TargetRoot {
    pub fn new(path: impl Into<PathBuf>, source: RootSource) -> Self {
        Self {
            path: path.into(),
            source,
        }
    }

    #[must_use]
    pub fn is_admin_root(&self) -> bool {
        self.source == RootSource::AdminRoot
    }
}

/// One parsed account database line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountEntry {
    pub name: String,
    pub uid: u32,
    pub home: PathBuf,
    pub shell: String,
}

impl AccountEntry {
    /// Whether the login shell forbids interactive sessions.
    #[must_use]
    pub fn has_nologin_shell(&self) -> bool {
        let base = self.shell.rsplit('/').next().unwrap_or_default();
        matches!(base, "nologin" | "false")
    }
}

/// Parse `/etc/passwd`-format content. Malformed lines are skipped.
pub fn parse_account_db(raw: &str) -> Vec<AccountEntry> {
    raw.lines()
        .filter_map(|line| {
            let line = line.trim_end_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() < 7 {
                return None;
            }
            let uid = fields[2].parse::<u32>().ok()?;
            Some(AccountEntry {
                name: fields[0].to_string(),
                uid,
                home: PathBuf::from(fields[5]),
                shell: fields[6].to_string(),
            })
        })
        .collect()
}

/// Read and parse the account database at `path`.
pub fn read_account_db(path: &Path) -> Result<Vec<AccountEntry>> {
    let raw = fs::read_to_string(path).map_err(|err| HswError::AccountDatabase {
        path: path.to_path_buf(),
        details: err.to_string(),
    })?;
    Ok(parse_account_db(&raw))
}

/// Build the full root list for a run from configuration.
pub fn discover_roots(config: &RootsConfig) -> Result<Vec<TargetRoot>> {
    let accounts = read_account_db(&config.account_db)?;
    Ok(roots_from_accounts(&accounts, config))
}

/// Turn parsed accounts plus configured extras into a de-duplicated root list.
pub fn roots_from_accounts(accounts: &[AccountEntry], config: &RootsConfig) -> Vec<TargetRoot> {
    let mut roots = Vec::new();

    for account in accounts {
        if account.uid < config.min_uid {
            continue;
        }
        if config.skip_nologin_shells && account.has_nologin_shell() {
            continue;
        }
        // A uid 0 account normally lives at the admin root; let the admin
        // entry claim it when that is enabled so its source is labeled right.
        if config.include_admin_root && same_path(&account.home, &config.admin_root) {
            continue;
        }
        roots.push(TargetRoot::new(
            account.home.clone(),
            RootSource::Account {
                user: account.name.clone(),
                uid: account.uid,
            },
        ));
    }

    if config.include_admin_root {
        roots.push(TargetRoot::new(
            config.admin_root.clone(),
            RootSource::AdminRoot,
        ));
    }
    for extra in &config.extra_roots {
        roots.push(TargetRoot::new(extra.clone(), RootSource::Extra));
    }

    dedup_roots(roots)
}

/// Drop unusable homes (`/`, empty) and collapse duplicates, first wins.
pub fn dedup_roots(roots: Vec<TargetRoot>) -> Vec<TargetRoot> {
    let mut seen = HashSet::new();
    roots
        .into_iter()
        .filter(|root| {
            if root.path.as_os_str().is_empty() {
                return false;
            }
            let normalized = absolute_path(&root.path);
            if normalized.parent().is_none() {
                return false;
            }
            seen.insert(normalized)
        })
        .collect()
}

/// Verify the run can read the administrative root before anything is touched.
///
/// A missing admin root is fine (it will be skipped); a permission failure is
/// fatal because the sweep could not honor its contract.
pub fn probe_admin_access(roots: &[TargetRoot]) -> Result<()> {
    for root in roots.iter().filter(|r| r.is_admin_root()) {
        match fs::read_dir(&root.path) {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                return Err(HswError::InsufficientPrivilege {
                    path: root.path.clone(),
                });
            }
            Err(_) => {}
        }
    }
    Ok(())
}

/// Whether the process runs with an effective uid of 0.
#[must_use]
pub fn running_as_root() -> bool {
    #[cfg(unix)]
    {
        nix::unistd::geteuid().is_root()
    }
    #[cfg(not(unix))]
    {
        false
    }
}

fn same_path(a: &Path, b: &Path) -> bool {
    absolute_path(a) == absolute_path(b)
}
