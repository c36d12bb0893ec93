#![forbid(unsafe_code)]

//! History Sweeper (hsweep): locate and remove shell, REPL and database-client
//! history files across local user accounts.
//!
//! Roots come from the account database plus the administrative root. Each
//! root is resolved against a static table of exact paths and globs, and every
//! match is either reported (dry-run) or unlinked.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use history_sweeper::prelude::*;
//!
//! let roots = vec![TargetRoot::new("/home/alice", RootSource::CommandLine)];
//! let mut sweeper = Sweeper::new(
//!     PatternRegistry::builtin()?,
//!     SweepOptions { dry_run: true, ..Default::default() },
//!     JsonlWriter::disabled(),
//! );
//! let report = sweeper.run(&roots, &mut NullObserver);
//! println!("{} matches", report.matches);
//! # Ok::<(), HswError>(())
//! ```

pub mod prelude;

pub mod core;
pub mod logger;
pub mod platform;
pub mod sweeper;
