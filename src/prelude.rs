//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use history_sweeper::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{HswError, Result};

// Platform
pub use crate::platform::accounts::{RootSource, TargetRoot, discover_roots};

// Logging
pub use crate::logger::jsonl::{JsonlConfig, JsonlWriter};

// Sweeper
pub use crate::sweeper::deletion::{DeletionConfig, DeletionExecutor, DeletionOutcome};
pub use crate::sweeper::patterns::{FilePattern, PatternKind, PatternRegistry};
pub use crate::sweeper::resolve::{Match, resolve};
pub use crate::sweeper::sweep::{
    NullObserver, SweepEvent, SweepObserver, SweepOptions, SweepReport, Sweeper,
};
