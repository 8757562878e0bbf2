//! Comparison options
//!
//! `ReconcileOptions` is the one immutable bag of settings passed down the
//! whole recursion. It is built once (usually by the CLI), validated, and
//! never changed while a comparison runs.

use crate::error::Result;
use crate::filter::NameFilter;
use serde::{Deserialize, Serialize};

/// How two same-named file entries are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityPolicy {
    /// Present is enough
    Existence,
    /// Size and modification time must match
    #[default]
    SizeAndTime,
    /// Bytes must match (SHA-256 digest, computed only when needed)
    Content,
}

impl EqualityPolicy {
    /// Name used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            EqualityPolicy::Existence => "existence",
            EqualityPolicy::SizeAndTime => "size-time",
            EqualityPolicy::Content => "content",
        }
    }
}

/// Options recognized by the reconciler
///
/// # Examples
///
/// ```rust
/// use treecmp::{EqualityPolicy, ReconcileOptions};
///
/// let options = ReconcileOptions {
///     include_patterns: vec![r"\.rs$".to_string()],
///     equality: EqualityPolicy::Content,
///     only_show_differences: true,
///     ..Default::default()
/// };
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileOptions {
    /// Regexes; when non-empty a name must match at least one to be considered
    pub include_patterns: Vec<String>,
    /// Regexes; a matching name is dropped even if it was included
    pub exclude_patterns: Vec<String>,
    /// Consider dot-prefixed names
    pub include_hidden: bool,
    /// Consider names that look like backups (`foo~`, `*.bak`, `Copy of foo`);
    /// on by default, turn off to skip them
    pub include_backups: bool,
    /// Consider generated files (`*.pyc`, `*.o`, `.DS_Store`); on by default
    pub include_generated: bool,
    /// How same-named files are compared
    pub equality: EqualityPolicy,
    /// Also flag permission-bit differences (ignored under `Existence`)
    pub compare_permissions: bool,
    /// Order output names ignoring case; matching is unaffected
    pub case_insensitive_order: bool,
    /// Drop union entries that are identical in every root
    pub only_show_differences: bool,
    /// Treat symlinks as what they point to and descend through linked directories
    pub follow_symlinks: bool,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            include_hidden: false,
            include_backups: true,
            include_generated: true,
            equality: EqualityPolicy::default(),
            compare_permissions: false,
            case_insensitive_order: false,
            only_show_differences: false,
            follow_symlinks: false,
        }
    }
}

impl ReconcileOptions {
    /// Turn on every name class (hidden, backup, generated)
    pub fn include_all(mut self) -> Self {
        self.include_hidden = true;
        self.include_backups = true;
        self.include_generated = true;
        self
    }

    /// Check the options and compile the name filter
    ///
    /// # Errors
    ///
    /// - [`CompareError::Configuration`](crate::CompareError::Configuration) if a pattern is not a valid regex
    pub fn validate(&self) -> Result<NameFilter> {
        NameFilter::from_options(self)
    }
}
