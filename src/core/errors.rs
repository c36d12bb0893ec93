//! HSW-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, HswError>;

/// Top-level error type for the history sweeper.
#[derive(Debug, Error)]
pub enum HswError {
    #[error("[HSW-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[HSW-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[HSW-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[HSW-1101] invalid file pattern {pattern:?}: {details}")]
    InvalidPattern { pattern: String, details: String },

    #[error("[HSW-2001] insufficient privilege to read {path}")]
    InsufficientPrivilege { path: PathBuf },

    #[error("[HSW-2002] account database unreadable at {path}: {details}")]
    AccountDatabase { path: PathBuf, details: String },

    #[error("[HSW-3001] permission denied for {path}")]
    PermissionDenied { path: PathBuf },

    #[error("[HSW-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[HSW-3003] {path} no longer resolves inside root {root}")]
    PathEscape { path: PathBuf, root: PathBuf },

    #[error("[HSW-3101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[HSW-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl HswError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "HSW-1001",
            Self::MissingConfig { .. } => "HSW-1002",
            Self::ConfigParse { .. } => "HSW-1003",
            Self::InvalidPattern { .. } => "HSW-1101",
            Self::InsufficientPrivilege { .. } => "HSW-2001",
            Self::AccountDatabase { .. } => "HSW-2002",
            Self::PermissionDenied { .. } => "HSW-3001",
            Self::Io { .. } => "HSW-3002",
            Self::PathEscape { .. } => "HSW-3003",
            Self::Serialization { .. } => "HSW-3101",
            Self::Runtime { .. } => "HSW-3900",
        }
    }

    /// Whether the error stops the whole run rather than one file.
    ///
    /// Per-file failures (permissions, IO) are recorded in the sweep report and
    /// the sweep moves on; configuration and precondition failures abort before
    /// any mutation.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::InvalidPattern { .. }
                | Self::InsufficientPrivilege { .. }
                | Self::AccountDatabase { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    ///
    /// `PermissionDenied` is lifted into its own variant so reports carry the
    /// more specific code.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::PermissionDenied { path };
        }
        Self::Io { path, source }
    }
}

impl From<serde_json::Error> for HswError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for HswError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<HswError> {
        vec![
            HswError::InvalidConfig {
                details: String::new(),
            },
            HswError::MissingConfig {
                path: PathBuf::new(),
            },
            HswError::ConfigParse {
                context: "",
                details: String::new(),
            },
            HswError::InvalidPattern {
                pattern: String::new(),
                details: String::new(),
            },
            HswError::InsufficientPrivilege {
                path: PathBuf::new(),
            },
            HswError::AccountDatabase {
                path: PathBuf::new(),
                details: String::new(),
            },
            HswError::PermissionDenied {
                path: PathBuf::new(),
            },
            HswError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            HswError::PathEscape {
                path: PathBuf::new(),
                root: PathBuf::new(),
            },
            HswError::Serialization {
                context: "",
                details: String::new(),
            },
            HswError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = all_variants();
        let codes: Vec<&str> = errors.iter().map(HswError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn display_carries_matching_code() {
        for err in all_variants() {
            let msg = err.to_string();
            assert!(
                msg.contains(err.code()),
                "display {msg:?} should contain code {}",
                err.code()
            );
            assert!(err.code().starts_with("HSW-"));
        }
    }

    #[test]
    fn fatal_split_matches_taxonomy() {
        assert!(
            HswError::InsufficientPrivilege {
                path: PathBuf::from("/root")
            }
            .is_fatal()
        );
        assert!(
            HswError::AccountDatabase {
                path: PathBuf::from("/etc/passwd"),
                details: String::new()
            }
            .is_fatal()
        );
        assert!(
            !HswError::PermissionDenied {
                path: PathBuf::from("/home/a/.bash_history")
            }
            .is_fatal()
        );
        assert!(
            !HswError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            }
            .is_fatal()
        );
    }

    #[test]
    fn io_constructor_lifts_permission_denied() {
        let err = HswError::io(
            "/home/a/.zsh_history",
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        assert_eq!(err.code(), "HSW-3001");

        let err = HswError::io(
            "/tmp/test.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "HSW-3002");
        assert!(err.to_string().contains("/tmp/test.txt"));
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: HswError = json_err.into();
        assert_eq!(err.code(), "HSW-3101");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: HswError = toml_err.into();
        assert_eq!(err.code(), "HSW-1003");
    }
}
