//! Top-level CLI definition and dispatch.

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::Parser;
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use history_sweeper::core::config::{Config, OutputFormat};
use history_sweeper::core::errors::HswError;
use history_sweeper::logger::jsonl::{JsonlConfig, JsonlWriter};
use history_sweeper::platform::accounts::{
    RootSource, TargetRoot, dedup_roots, discover_roots, probe_admin_access, running_as_root,
};
use history_sweeper::platform::procenv::live_histfiles;
use history_sweeper::sweeper::deletion::DeletionOutcome;
use history_sweeper::sweeper::patterns::PatternRegistry;
use history_sweeper::sweeper::sweep::{
    SweepEvent, SweepObserver, SweepOptions, SweepReport, Sweeper,
};

/// History Sweeper: remove shell and client history files for local accounts.
#[derive(Debug, Parser)]
#[command(
    name = "hsweep",
    author,
    version,
    about = "History Sweeper - remove shell, REPL and database-client history files",
    long_about = None
)]
pub struct Cli {
    /// Report matches without removing anything.
    #[arg(short = 'n', long)]
    dry_run: bool,
    /// Sweep only this directory (repeatable); skips account discovery.
    #[arg(long = "root", value_name = "DIR")]
    roots: Vec<PathBuf>,
    /// Leave the administrative root out of discovery.
    #[arg(long)]
    no_admin_root: bool,
    /// Best-effort: also sweep HISTFILE paths found in running processes.
    #[arg(long)]
    live_histfiles: bool,
    /// Append a JSONL audit record of the run to this file.
    #[arg(long, value_name = "PATH")]
    audit_log: Option<PathBuf>,
    /// Override config file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Emit one JSON object per output line.
    #[arg(long)]
    json: bool,
    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Environment/runtime failure, including missing privileges.
    #[error("{0}")]
    Runtime(String),
    /// Internal bug or invariant violation.
    #[error("{0}")]
    Internal(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) => 2,
            Self::Internal(_) | Self::Json(_) | Self::Io(_) => 3,
        }
    }
}

impl From<HswError> for CliError {
    fn from(err: HswError) -> Self {
        match err {
            HswError::InvalidConfig { .. }
            | HswError::MissingConfig { .. }
            | HswError::ConfigParse { .. } => Self::User(err.to_string()),
            HswError::InvalidPattern { .. } => Self::Internal(err.to_string()),
            _ => Self::Runtime(err.to_string()),
        }
    }
}

/// Run one sweep with the parsed arguments.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color || !io::stdout().is_terminal() {
        control::set_override(false);
    }
    let mut config = Config::load(cli.config.as_deref())?;
    apply_cli_overrides(cli, &mut config);
    let mode = resolve_output_mode(cli.json, config.output.format);

    let roots = if cli.roots.is_empty() {
        discover_roots(&config.roots)?
    } else {
        dedup_roots(
            cli.roots
                .iter()
                .map(|path| TargetRoot::new(path.clone(), RootSource::CommandLine))
                .collect(),
        )
    };

    // Nothing is touched until the privileged part of the root set is readable.
    probe_admin_access(&roots)?;

    let live = if config.sweep.live_histfiles {
        live_histfiles()
    } else {
        Vec::new()
    };

    if cli.verbose {
        eprintln!(
            "hsweep: {} roots, {} live histfiles, euid root: {}, mode: {}",
            roots.len(),
            live.len(),
            running_as_root(),
            if config.sweep.dry_run { "dry-run" } else { "live" }
        );
    }

    let registry = PatternRegistry::builtin()?;
    let audit = match &config.logging.audit_log {
        Some(path) => JsonlWriter::open(JsonlConfig {
            path: Some(path.clone()),
            fallback_to_stderr: config.logging.fallback_to_stderr,
            ..JsonlConfig::default()
        }),
        None => JsonlWriter::disabled(),
    };

    let mut sweeper = Sweeper::new(
        registry,
        SweepOptions {
            dry_run: config.sweep.dry_run,
            live_histfiles: live,
        },
        audit,
    );
    let mut console = ConsoleObserver {
        mode,
        verbose: cli.verbose,
        quiet: cli.quiet,
    };
    let report = sweeper.run(&roots, &mut console);

    if !cli.quiet {
        match mode {
            OutputFormat::Human => print_summary_human(&report),
            OutputFormat::Json => {
                let mut payload = serde_json::to_value(&report)?;
                payload["event"] = json!("summary");
                write_json_line(&payload)?;
            }
        }
    }
    Ok(())
}

fn apply_cli_overrides(cli: &Cli, config: &mut Config) {
    if cli.dry_run {
        config.sweep.dry_run = true;
    }
    if cli.no_admin_root {
        config.roots.include_admin_root = false;
    }
    if cli.live_histfiles {
        config.sweep.live_histfiles = true;
    }
    if let Some(path) = &cli.audit_log {
        config.logging.audit_log = Some(path.clone());
    }
}

// ---------------------------------------------------------------------------
// Console rendering
// ---------------------------------------------------------------------------

struct ConsoleObserver {
    mode: OutputFormat,
    verbose: bool,
    quiet: bool,
}

impl SweepObserver for ConsoleObserver {
    fn on_event(&mut self, event: &SweepEvent<'_>) {
        match self.mode {
            OutputFormat::Human => self.render_human(event),
            OutputFormat::Json => self.render_json(event),
        }
    }
}

impl ConsoleObserver {
    fn render_human(&self, event: &SweepEvent<'_>) {
        match event {
            SweepEvent::RootEntered { root } => {
                if !self.quiet {
                    println!("{} {}", "==>".bold(), root.path.display());
                }
            }
            SweepEvent::RootSkipped { root, reason } => {
                if self.verbose {
                    eprintln!("skip {} ({})", root.path.display(), reason.label());
                }
            }
            SweepEvent::MatchHandled { found, outcome } => match outcome {
                DeletionOutcome::Failed(error) => {
                    eprintln!(
                        "{} {}: {error}",
                        "failed".red(),
                        found.path.display()
                    );
                }
                _ if self.quiet => {}
                DeletionOutcome::WouldRemove => println!(
                    "  {} {} ({})",
                    "would remove".yellow(),
                    found.path.display(),
                    format_bytes(found.size_bytes)
                ),
                DeletionOutcome::Removed => println!(
                    "  {} {} ({})",
                    "removed".green(),
                    found.path.display(),
                    format_bytes(found.size_bytes)
                ),
                other => println!("  {} {}", other.label().dimmed(), found.path.display()),
            },
            SweepEvent::InspectFailed { path, error } => {
                eprintln!("{} {}: {error}", "warning".yellow(), path.display());
            }
        }
    }

    fn render_json(&self, event: &SweepEvent<'_>) {
        let payload = match event {
            SweepEvent::RootEntered { root } => json!({
                "event": "root_entered",
                "root": root.path,
                "source": root.source,
            }),
            SweepEvent::RootSkipped { root, reason } => {
                if !self.verbose {
                    return;
                }
                json!({
                    "event": "root_skipped",
                    "root": root.path,
                    "reason": reason,
                })
            }
            SweepEvent::MatchHandled { found, outcome } => {
                let mut value = json!({
                    "event": "match",
                    "path": found.path,
                    "root": found.root,
                    "pattern": found.pattern,
                    "kind": found.kind,
                    "category": found.category,
                    "size_bytes": found.size_bytes,
                    "outcome": outcome.label(),
                });
                if let DeletionOutcome::Failed(error) = outcome {
                    value["error_code"] = json!(error.code());
                    value["error"] = json!(error.to_string());
                }
                value
            }
            SweepEvent::InspectFailed { path, error } => json!({
                "event": "inspect_failed",
                "path": path,
                "error_code": error.code(),
                "error": error.to_string(),
            }),
        };
        if self.quiet && !is_failure(event) {
            return;
        }
        if let Err(err) = write_json_line(&payload) {
            eprintln!("hsweep: {err}");
        }
    }
}

fn is_failure(event: &SweepEvent<'_>) -> bool {
    matches!(
        event,
        SweepEvent::InspectFailed { .. }
            | SweepEvent::MatchHandled {
                outcome: DeletionOutcome::Failed(_),
                ..
            }
    )
}

fn print_summary_human(report: &SweepReport) {
    let verb = if report.dry_run { "would remove" } else { "removed" };
    let count = if report.dry_run {
        report.matches
    } else {
        report.removed
    };
    println!(
        "Swept {} roots ({} skipped): {} matches, {verb} {count} ({}), {} failed.",
        report.roots_entered,
        report.roots_skipped,
        report.matches,
        format_bytes(report.bytes),
        report.failed
    );
}

#[allow(clippy::cast_precision_loss)]
fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;

    if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

/// `--json` wins over the configured format.
fn resolve_output_mode(json_flag: bool, configured: OutputFormat) -> OutputFormat {
    if json_flag {
        OutputFormat::Json
    } else {
        configured
    }
}
