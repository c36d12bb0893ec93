//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{HswError, Result};

/// Default location of the system-wide config file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/hsweep/config.toml";

/// Full hsweep configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub roots: RootsConfig,
    pub sweep: SweepConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
    /// Where this config was loaded from (not serialized).
    #[serde(skip)]
    pub config_file: PathBuf,
}

/// How target roots are discovered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RootsConfig {
    /// Account database in `/etc/passwd` format.
    pub account_db: PathBuf,
    /// Administrative root home directory.
    pub admin_root: PathBuf,
    /// Whether the administrative root is swept at all.
    pub include_admin_root: bool,
    /// Accounts with a uid below this are ignored (0 keeps every account).
    pub min_uid: u32,
    /// Skip accounts whose login shell is `nologin` or `false`.
    pub skip_nologin_shells: bool,
    /// Additional directories swept as roots.
    pub extra_roots: Vec<PathBuf>,
}

/// Sweep behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SweepConfig {
    /// Report matches without removing anything.
    pub dry_run: bool,
    /// Best-effort discovery of `HISTFILE` values from running processes.
    pub live_histfiles: bool,
}

/// Audit logging.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Optional JSONL audit log; unset disables it.
    pub audit_log: Option<PathBuf>,
    /// Emit audit lines to stderr when the audit log cannot be opened.
    pub fallback_to_stderr: bool,
}

/// Console rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// Stdout format: colored human lines or one JSON object per line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `human` or `json`, got {other:?}")),
        }
    }
}

impl Default for RootsConfig {
    fn default() -> Self {
        Self {
            account_db: PathBuf::from("/etc/passwd"),
            admin_root: PathBuf::from("/root"),
            include_admin_root: true,
            min_uid: 0,
            skip_nologin_shells: false,
            extra_roots: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            audit_log: None,
            fallback_to_stderr: true,
        }
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, env_var)
    }

    /// [`Config::load`] with an explicit environment lookup.
    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| HswError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(HswError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = path_buf;
        cfg.apply_env_overrides_from(lookup)?;
        cfg.normalize_paths();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("HSWEEP_ACCOUNT_DB") {
            self.roots.account_db = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("HSWEEP_ADMIN_ROOT") {
            self.roots.admin_root = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("HSWEEP_MIN_UID") {
            self.roots.min_uid = raw.parse::<u32>().map_err(|error| HswError::ConfigParse {
                context: "env",
                details: format!("HSWEEP_MIN_UID={raw:?}: {error}"),
            })?;
        }
        if let Some(raw) = lookup("HSWEEP_DRY_RUN") {
            self.sweep.dry_run = parse_env_bool("HSWEEP_DRY_RUN", &raw)?;
        }
        if let Some(raw) = lookup("HSWEEP_LIVE_HISTFILES") {
            self.sweep.live_histfiles = parse_env_bool("HSWEEP_LIVE_HISTFILES", &raw)?;
        }
        if let Some(raw) = lookup("HSWEEP_AUDIT_LOG") {
            self.logging.audit_log = Some(PathBuf::from(raw));
        }
        if let Some(raw) = lookup("HSWEEP_OUTPUT_FORMAT") {
            self.output.format = raw.parse().map_err(|details| HswError::ConfigParse {
                context: "env",
                details: format!("HSWEEP_OUTPUT_FORMAT={raw:?}: {details}"),
            })?;
        }
        Ok(())
    }

    /// Strip trailing slashes so roots compare consistently; `/` stays `/`.
    fn normalize_paths(&mut self) {
        for path in &mut self.roots.extra_roots {
            strip_trailing_slash(path);
        }
        strip_trailing_slash(&mut self.roots.admin_root);
    }

    pub fn validate(&self) -> Result<()> {
        require_absolute("roots.account_db", &self.roots.account_db)?;
        require_absolute("roots.admin_root", &self.roots.admin_root)?;
        for root in &self.roots.extra_roots {
            require_absolute("roots.extra_roots", root)?;
        }
        if let Some(log) = &self.logging.audit_log {
            require_absolute("logging.audit_log", log)?;
        }
        Ok(())
    }
}

fn strip_trailing_slash(path: &mut PathBuf) {
    let s = path.to_string_lossy();
    if s.len() > 1
        && let Some(stripped) = s.strip_suffix('/')
    {
        *path = PathBuf::from(stripped);
    }
}

fn require_absolute(name: &str, path: &Path) -> Result<()> {
    if !path.is_absolute() {
        return Err(HswError::InvalidConfig {
            details: format!("{name} must be an absolute path, got {}", path.display()),
        });
    }
    Ok(())
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    raw.trim()
        .parse::<bool>()
        .map_err(|error| HswError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: {error}"),
        })
}
