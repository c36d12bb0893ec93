//! Sweep driver: roots one at a time, patterns within a root one at a time,
//! matches within a pattern one at a time.
//!
//! Every action is tied to a match produced by resolving a known pattern
//! against a known root. Live `HISTFILE` paths are folded in as extra exact
//! patterns only for the root that contains them, and only when the process
//! that set the value owns both the file and, for account roots, the home.

#![allow(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::errors::HswError;
use crate::core::paths::{absolute_path, is_within};
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};
use crate::platform::accounts::{RootSource, TargetRoot};
use crate::platform::procenv::{LiveHistfile, owner_uid};
use crate::sweeper::deletion::{DeletionConfig, DeletionExecutor, DeletionOutcome};
use crate::sweeper::patterns::{FilePattern, PatternRegistry};
use crate::sweeper::resolve::{Match, resolve};

/// Options fixed for the duration of one run.
#[derive(Debug, Clone, Default)]
pub struct SweepOptions {
    pub dry_run: bool,
    /// `HISTFILE` values discovered from running processes.
    pub live_histfiles: Vec<LiveHistfile>,
}

/// Why a root was not entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootSkip {
    Missing,
    NotDirectory,
    Unreadable,
}

impl RootSkip {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Missing => "does not exist",
            Self::NotDirectory => "not a directory",
            Self::Unreadable => "unreadable",
        }
    }
}

/// Progress notifications, delivered in sweep order.
#[derive(Debug)]
pub enum SweepEvent<'a> {
    RootEntered {
        root: &'a TargetRoot,
    },
    RootSkipped {
        root: &'a TargetRoot,
        reason: RootSkip,
    },
    MatchHandled {
        found: &'a Match,
        outcome: &'a DeletionOutcome,
    },
    InspectFailed {
        path: &'a Path,
        error: &'a HswError,
    },
}

/// Receives sweep progress; the CLI renders these as output lines.
pub trait SweepObserver {
    fn on_event(&mut self, event: &SweepEvent<'_>);
}

/// Observer that ignores everything.
pub struct NullObserver;

impl SweepObserver for NullObserver {
    fn on_event(&mut self, _event: &SweepEvent<'_>) {}
}

/// A per-file or per-directory failure that did not stop the sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub path: PathBuf,
    pub code: String,
    pub message: String,
}

impl SweepFailure {
    fn new(path: &Path, error: &HswError) -> Self {
        Self {
            path: path.to_path_buf(),
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Matches seen for one root.
#[derive(Debug, Clone, Serialize)]
pub struct RootSummary {
    pub root: PathBuf,
    pub entered: bool,
    pub matches: usize,
}

/// Totals for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    pub dry_run: bool,
    pub roots_entered: usize,
    pub roots_skipped: usize,
    pub matches: usize,
    pub removed: usize,
    pub already_gone: usize,
    pub skipped_directories: usize,
    pub failed: usize,
    pub bytes: u64,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
    pub roots: Vec<RootSummary>,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    /// Matches recorded for `root`, if it was part of the run.
    #[must_use]
    pub fn matches_for(&self, root: &Path) -> Option<usize> {
        self.roots.iter().find(|r| r.root == root).map(|r| r.matches)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn serialize_duration_ms<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

/// The history sweeper.
pub struct Sweeper {
    registry: PatternRegistry,
    executor: DeletionExecutor,
    live_histfiles: Vec<LiveHistfile>,
    audit: JsonlWriter,
}

impl Sweeper {
    pub fn new(registry: PatternRegistry, options: SweepOptions, audit: JsonlWriter) -> Self {
        Self {
            registry,
            executor: DeletionExecutor::new(DeletionConfig {
                dry_run: options.dry_run,
            }),
            live_histfiles: options.live_histfiles,
            audit,
        }
    }

    /// Sweep every root in order and return the totals.
    pub fn run(&mut self, roots: &[TargetRoot], observer: &mut dyn SweepObserver) -> SweepReport {
        let start = Instant::now();
        let mut report = SweepReport {
            dry_run: self.executor.is_dry_run(),
            ..SweepReport::default()
        };

        let mut entry = LogEntry::new(EventType::SweepStart, Severity::Info)
            .with_details(format!(
                "roots={} patterns={} live_histfiles={}",
                roots.len(),
                self.registry.len(),
                self.live_histfiles.len()
            ));
        entry.dry_run = Some(report.dry_run);
        self.audit.write_entry(&entry);

        for root in roots {
            self.sweep_root(root, observer, &mut report);
        }

        report.duration = start.elapsed();
        let mut entry = LogEntry::new(EventType::SweepComplete, Severity::Info).with_details(
            format!(
                "entered={} skipped={} matches={} removed={} failed={}",
                report.roots_entered,
                report.roots_skipped,
                report.matches,
                report.removed,
                report.failed
            ),
        );
        entry.dry_run = Some(report.dry_run);
        entry.duration_ms = Some(u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX));
        self.audit.write_entry(&entry);
        self.audit.flush();

        report
    }

    fn sweep_root(
        &mut self,
        root: &TargetRoot,
        observer: &mut dyn SweepObserver,
        report: &mut SweepReport,
    ) {
        let mut summary = RootSummary {
            root: root.path.clone(),
            entered: false,
            matches: 0,
        };

        if let Err(reason) = Self::check_root(root, report) {
            report.roots_skipped += 1;
            report.roots.push(summary);
            observer.on_event(&SweepEvent::RootSkipped { root, reason });
            self.audit.write_entry(
                &LogEntry::new(EventType::RootSkipped, Severity::Info)
                    .with_root(&root.path)
                    .with_details(reason.label()),
            );
            return;
        }

        summary.entered = true;
        report.roots_entered += 1;
        observer.on_event(&SweepEvent::RootEntered { root });
        self.audit.write_entry(
            &LogEntry::new(EventType::RootEntered, Severity::Info).with_root(&root.path),
        );

        let patterns: Vec<FilePattern> = self
            .registry
            .patterns()
            .iter()
            .cloned()
            .chain(self.live_patterns_for(root))
            .collect();
        let mut seen = HashSet::new();

        for pattern in &patterns {
            let resolution = resolve(&root.path, pattern);

            for failure in &resolution.errors {
                report.failed += 1;
                report
                    .failures
                    .push(SweepFailure::new(&failure.path, &failure.error));
                observer.on_event(&SweepEvent::InspectFailed {
                    path: &failure.path,
                    error: &failure.error,
                });
                self.audit.write_entry(
                    &LogEntry::new(EventType::Error, Severity::Warning)
                        .with_root(&root.path)
                        .with_path(&failure.path)
                        .with_error(&failure.error),
                );
            }

            for found in resolution.matches {
                if !seen.insert(found.path.clone()) {
                    continue;
                }
                summary.matches += 1;
                self.handle_match(&found, observer, report);
            }
        }

        report.roots.push(summary);
    }

    /// Decide whether a root can be entered. Unreadable roots are also failures.
    fn check_root(
        root: &TargetRoot,
        report: &mut SweepReport,
    ) -> std::result::Result<(), RootSkip> {
        match fs::metadata(&root.path) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(RootSkip::NotDirectory),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(RootSkip::Missing),
            Err(err) => {
                let error = HswError::io(&root.path, err);
                report.failed += 1;
                report.failures.push(SweepFailure::new(&root.path, &error));
                Err(RootSkip::Unreadable)
            }
        }
    }

    fn handle_match(
        &mut self,
        found: &Match,
        observer: &mut dyn SweepObserver,
        report: &mut SweepReport,
    ) {
        report.matches += 1;
        report.bytes += found.size_bytes;

        let mut entry = LogEntry::new(EventType::MatchFound, Severity::Info)
            .with_root(&found.root)
            .with_path(&found.path);
        entry.pattern = Some(found.pattern.clone());
        entry.size = Some(found.size_bytes);
        entry.dry_run = Some(report.dry_run);
        self.audit.write_entry(&entry);

        let outcome = self.executor.execute(found);
        match &outcome {
            DeletionOutcome::WouldRemove => {}
            DeletionOutcome::Removed => {
                report.removed += 1;
                self.audit.write_entry(
                    &LogEntry::new(EventType::FileRemoved, Severity::Info)
                        .with_root(&found.root)
                        .with_path(&found.path),
                );
            }
            DeletionOutcome::AlreadyGone => report.already_gone += 1,
            DeletionOutcome::SkippedDirectory => report.skipped_directories += 1,
            DeletionOutcome::Failed(error) => {
                report.failed += 1;
                report.failures.push(SweepFailure::new(&found.path, error));
                self.audit.write_entry(
                    &LogEntry::new(EventType::RemovalFailed, Severity::Warning)
                        .with_root(&found.root)
                        .with_path(&found.path)
                        .with_error(error),
                );
            }
        }
        observer.on_event(&SweepEvent::MatchHandled {
            found,
            outcome: &outcome,
        });
    }

    /// Exact patterns for live `HISTFILE` paths that sit inside `root`.
    fn live_patterns_for(&self, root: &TargetRoot) -> Vec<FilePattern> {
        let root_abs = absolute_path(&root.path);
        self.live_histfiles
            .iter()
            .filter(|live| live_histfile_allowed(root, &root_abs, live))
            .filter_map(|live| {
                let path = absolute_path(&live.path);
                let relative = path.strip_prefix(&root_abs).ok()?;
                FilePattern::live_histfile(relative).ok()
            })
            .collect()
    }
}

/// A process may only point the sweep at its own files in its own home.
fn live_histfile_allowed(root: &TargetRoot, root_abs: &Path, live: &LiveHistfile) -> bool {
    if !is_within(root_abs, &live.path) {
        return false;
    }
    let home_matches = match &root.source {
        RootSource::Account { uid, .. } => *uid == live.uid,
        RootSource::AdminRoot => live.uid == 0,
        RootSource::Extra | RootSource::CommandLine => true,
    };
    home_matches && owner_uid(&live.path) == Some(live.uid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn my_uid() -> u32 {
        nix::unistd::geteuid().as_raw()
    }

    fn live(path: &Path, uid: u32) -> LiveHistfile {
        LiveHistfile {
            path: path.to_path_buf(),
            uid,
        }
    }

    fn sweeper(dry_run: bool, live: Vec<LiveHistfile>) -> Sweeper {
        Sweeper::new(
            PatternRegistry::builtin().unwrap(),
            SweepOptions {
                dry_run,
                live_histfiles: live,
            },
            JsonlWriter::disabled(),
        )
    }

    fn root(path: &Path) -> TargetRoot {
        TargetRoot::new(path, RootSource::CommandLine)
    }

    #[derive(Default)]
    struct Recorder {
        lines: Vec<String>,
    }

    impl SweepObserver for Recorder {
        fn on_event(&mut self, event: &SweepEvent<'_>) {
            let line = match event {
                SweepEvent::RootEntered { root } => format!("enter {}", root.path.display()),
                SweepEvent::RootSkipped { root, reason } => {
                    format!("skip {} {}", root.path.display(), reason.label())
                }
                SweepEvent::MatchHandled { found, outcome } => {
                    format!("{} {}", outcome.label(), found.path.display())
                }
                SweepEvent::InspectFailed { path, .. } => format!("fail {}", path.display()),
            };
            self.lines.push(line);
        }
    }

    #[test]
    fn overlapping_patterns_act_once() {
        let home = tempfile::tempdir().unwrap();
        // Matched by `.bash_history` (exact) and `.*_history` (glob).
        fs::write(home.path().join(".bash_history"), b"ls").unwrap();

        let mut recorder = Recorder::default();
        let report = sweeper(false, Vec::new()).run(&[root(home.path())], &mut recorder);

        assert_eq!(report.matches, 1);
        assert_eq!(report.removed, 1);
        assert_eq!(report.already_gone, 0);
        assert_eq!(recorder.lines.len(), 2);
        assert!(recorder.lines[1].starts_with("removed"));
    }

    #[test]
    fn missing_root_is_skipped_without_failure() {
        let parent = tempfile::tempdir().unwrap();
        let missing = parent.path().join("ghost");

        let mut recorder = Recorder::default();
        let report = sweeper(false, Vec::new()).run(&[root(&missing)], &mut recorder);

        assert_eq!(report.roots_skipped, 1);
        assert_eq!(report.roots_entered, 0);
        assert_eq!(report.failed, 0);
        assert_eq!(report.matches_for(&missing), Some(0));
        assert_eq!(recorder.lines, vec![format!("skip {} does not exist", missing.display())]);
    }

    #[test]
    fn file_root_is_skipped() {
        let parent = tempfile::tempdir().unwrap();
        let file = parent.path().join("not-a-home");
        fs::write(&file, b"x").unwrap();

        let report = sweeper(false, Vec::new()).run(&[root(&file)], &mut NullObserver);
        assert_eq!(report.roots_skipped, 1);
        assert!(file.exists());
    }

    #[test]
    fn dry_run_counts_bytes_and_keeps_files() {
        let home = tempfile::tempdir().unwrap();
        fs::write(home.path().join(".bash_history"), b"0123456789").unwrap();
        fs::write(home.path().join(".viminfo.swp"), b"").unwrap();

        let report = sweeper(true, Vec::new()).run(&[root(home.path())], &mut NullObserver);

        assert!(report.dry_run);
        assert_eq!(report.matches, 2);
        assert_eq!(report.removed, 0);
        assert_eq!(report.bytes, 10);
        assert!(home.path().join(".bash_history").exists());
        assert!(home.path().join(".viminfo.swp").exists());
    }

    #[test]
    fn live_histfile_inside_root_is_swept() {
        let home = tempfile::tempdir().unwrap();
        let custom = home.path().join("logs/shell.hist");
        fs::create_dir_all(custom.parent().unwrap()).unwrap();
        fs::write(&custom, b"secret").unwrap();

        let report = sweeper(false, vec![live(&custom, my_uid())])
            .run(&[root(home.path())], &mut NullObserver);

        assert_eq!(report.removed, 1);
        assert!(!custom.exists());
    }

    #[test]
    fn live_histfile_outside_every_root_is_ignored() {
        let home = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let outside = elsewhere.path().join("shell.hist");
        fs::write(&outside, b"keep").unwrap();

        let report =
            sweeper(false, vec![live(&outside, my_uid())]).run(&[root(home.path())], &mut NullObserver);

        assert_eq!(report.matches, 0);
        assert!(outside.exists());
    }

    #[test]
    fn live_histfile_from_foreign_process_is_ignored() {
        let home = tempfile::tempdir().unwrap();
        let key = home.path().join(".ssh/authorized_keys");
        fs::create_dir_all(key.parent().unwrap()).unwrap();
        fs::write(&key, b"ssh-ed25519 AAAA").unwrap();
        let foreign = my_uid().wrapping_add(1);
        let admin = TargetRoot::new(home.path(), RootSource::AdminRoot);

        let report =
            sweeper(false, vec![live(&key, foreign)]).run(&[admin], &mut NullObserver);

        assert_eq!(report.matches, 0);
        assert!(key.exists());
    }

    #[test]
    fn live_histfile_in_another_accounts_home_is_ignored() {
        let home = tempfile::tempdir().unwrap();
        let custom = home.path().join("shell.hist");
        fs::write(&custom, b"x").unwrap();
        let other_account = TargetRoot::new(
            home.path(),
            RootSource::Account {
                user: "bob".to_string(),
                uid: my_uid().wrapping_add(1),
            },
        );

        let report = sweeper(false, vec![live(&custom, my_uid())])
            .run(&[other_account], &mut NullObserver);

        assert_eq!(report.matches, 0);
        assert!(custom.exists());
    }

    #[test]
    fn live_histfile_in_own_account_home_is_swept() {
        let home = tempfile::tempdir().unwrap();
        let custom = home.path().join("shell.hist");
        fs::write(&custom, b"x").unwrap();
        let own_account = TargetRoot::new(
            home.path(),
            RootSource::Account {
                user: "me".to_string(),
                uid: my_uid(),
            },
        );

        let report = sweeper(false, vec![live(&custom, my_uid())])
            .run(&[own_account], &mut NullObserver);

        assert_eq!(report.removed, 1);
        assert!(!custom.exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn non_utf8_history_names_are_swept() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let home = tempfile::tempdir().unwrap();
        let odd = home.path().join(OsStr::from_bytes(b".\xff_history"));
        fs::write(&odd, b"x").unwrap();
        let odd_live = home.path().join(OsStr::from_bytes(b"hist-\xfe"));
        fs::write(&odd_live, b"y").unwrap();

        let report = sweeper(false, vec![live(&odd_live, my_uid())])
            .run(&[root(home.path())], &mut NullObserver);

        assert_eq!(report.removed, 2);
        assert_eq!(report.failed, 0);
        assert!(fs::symlink_metadata(&odd).is_err());
        assert!(fs::symlink_metadata(&odd_live).is_err());
    }

    #[test]
    fn roots_are_processed_in_order() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        fs::write(a.path().join(".zsh_history"), b"a").unwrap();
        fs::write(b.path().join(".psql_history"), b"b").unwrap();

        let mut recorder = Recorder::default();
        sweeper(true, Vec::new()).run(&[root(a.path()), root(b.path())], &mut recorder);

        assert_eq!(
            recorder.lines,
            vec![
                format!("enter {}", a.path().display()),
                format!("would remove {}", a.path().join(".zsh_history").display()),
                format!("enter {}", b.path().display()),
                format!("would remove {}", b.path().join(".psql_history").display()),
            ]
        );
    }

    #[test]
    fn audit_log_records_lifecycle() {
        let home = tempfile::tempdir().unwrap();
        fs::write(home.path().join(".bash_history"), b"ls").unwrap();
        let log_dir = tempfile::tempdir().unwrap();
        let log = log_dir.path().join("audit.jsonl");

        let audit = JsonlWriter::open(crate::logger::jsonl::JsonlConfig {
            path: Some(log.clone()),
            fallback_to_stderr: false,
            ..Default::default()
        });
        let mut sweeper = Sweeper::new(
            PatternRegistry::builtin().unwrap(),
            SweepOptions::default(),
            audit,
        );
        sweeper.run(&[root(home.path())], &mut NullObserver);
        drop(sweeper);

        let events: Vec<String> = fs::read_to_string(&log)
            .unwrap()
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["event"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(
            events,
            vec![
                "sweep_start",
                "root_entered",
                "match_found",
                "file_removed",
                "sweep_complete"
            ]
        );
    }
}
