//! # treecmp - Multi-way directory tree reconciliation
//!
//! Compare two or more directory trees in one pass and find, for every name
//! in the union of their contents, which trees hold it and whether the copies
//! agree.
//!
//! ## Overview
//!
//! treecmp walks N roots in lockstep, one relative directory at a time:
//! - List the directory in every root and drop filtered names
//! - Build the union of the surviving names, in a stable order
//! - Classify each name per root against a reference copy:
//!   `Same`, `Different(reasons)`, `Missing` or `Unreadable`
//! - Recurse into every name that is a directory in at least one root
//!
//! Problems below the roots (an unreadable file, a permission-denied
//! directory, a symlink loop) are recorded in the result instead of
//! aborting the run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use treecmp::{reconcile, ReconcileOptions, RootSet};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let roots = RootSet::new(vec![
//!     PathBuf::from("./release-1.0"),
//!     PathBuf::from("./release-1.1"),
//! ])?;
//!
//! let result = reconcile(&roots, Path::new(""), &ReconcileOptions::default())?;
//!
//! for level in result.walk() {
//!     for entry in level.entries.iter().filter(|e| e.has_difference()) {
//!         println!("{}/{}", level.relative_path.display(), entry.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Advanced Usage
//!
//! ### Content comparison with a deadline
//!
//! ```rust,no_run
//! use treecmp::{CancellationToken, EqualityPolicy, ReconcileOptions, ReconcilerBuilder, RootSet};
//! use std::path::{Path, PathBuf};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let roots = RootSet::new(vec![PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")])?;
//! let options = ReconcileOptions {
//!     equality: EqualityPolicy::Content,
//!     only_show_differences: true,
//!     ..Default::default()
//! };
//!
//! let reconciler = ReconcilerBuilder::new()
//!     .parallel_workers(8)
//!     .cancellation(CancellationToken::with_timeout(Duration::from_secs(60)))
//!     .progress(|p| eprintln!("{} directories", p.directories_visited))
//!     .build();
//!
//! let result = reconciler.reconcile(&roots, Path::new(""), &options)?;
//! if !result.is_complete() {
//!     eprintln!("{} subtrees were not compared", result.counters.subtrees_cancelled);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Rendering
//!
//! ```rust,no_run
//! use treecmp::report::{render, OutputFormat, RenderOptions};
//! # use treecmp::{reconcile, ReconcileOptions, RootSet};
//! # use std::path::{Path, PathBuf};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let roots = RootSet::new(vec![PathBuf::from("a"), PathBuf::from("b")])?;
//! # let result = reconcile(&roots, Path::new(""), &ReconcileOptions::default())?;
//! print!("{}", render(&result, &roots, OutputFormat::Diff, &RenderOptions::default())?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Key Concepts
//!
//! ### Reference root
//!
//! Each name is compared against the lowest-index root holding a readable
//! copy. Because every check is an equality on one attribute, copies judged
//! `Same` also agree with each other.
//!
//! ### Equality policies
//!
//! - `Existence`: presence only (a file/directory clash still counts)
//! - `SizeAndTime`: byte size and modification time (default)
//! - `Content`: SHA-256 of the bytes, computed only when sizes agree
//!
//! ## Error Handling
//!
//! Only invalid options and unusable top-level roots are errors; see
//! [`CompareError`]. Everything else shows up as verdicts, warnings and
//! [`SubtreeOutcome`] variants.
//!
//! ## Module Organization
//!
//! - [`reconciler`]: the recursive walk and the builder
//! - [`compare`]: per-entry equality rules
//! - [`filter`], [`config`]: which names take part, and how
//! - [`lister`]: directory listing behind a trait
//! - [`report`], [`diff`]: text, JSON and `diff -r` style output
//! - [`types`], [`error`]: data model and errors

// Public API modules
pub mod cancel;
pub mod compare;
pub mod config;
pub mod diff;
pub mod error;
pub mod filter;
pub mod lister;
pub mod reconciler;
pub mod report;
pub mod types;

// Internal helpers
mod utils;

// Re-export main types for convenience
pub use cancel::CancellationToken;
pub use config::{EqualityPolicy, ReconcileOptions};
pub use error::{CompareError, Result};
pub use lister::{DirectoryLister, FsLister};
pub use reconciler::{reconcile, ProgressCallback, Reconciler, ReconcilerBuilder};
pub use report::{render, OutputFormat, RenderOptions};
pub use types::*;
pub use utils::format_bytes;
