//! Name filtering applied to each snapshot before the union is built
//!
//! A name survives when it is not in a suppressed class, matches at least one include pattern (if any were given) and
//! matches no exclude pattern. Filters look at the entry name only, never the
//! path, so the same name is treated the same way in every root.
//!
//! Only hidden names are suppressed by default. Backup and generated names
//! are compared unless their class is turned off.

use crate::config::ReconcileOptions;
use crate::error::Result;
use regex::Regex;
use std::path::Path;
use tracing::trace;

/// Extensions of files that are produced by tools rather than written by people
const GENERATED_EXTENSIONS: &[&str] = &["pyc", "pyo", "o", "obj", "class", "elc"];

/// Names of generated files and directories
const GENERATED_NAMES: &[&str] = &[".DS_Store", "Thumbs.db", "__pycache__"];

/// Extensions used for backup copies
const BACKUP_EXTENSIONS: &[&str] = &["bak", "bkup", "tmp"];

/// Compiled form of the filtering options
#[derive(Debug, Clone)]
pub struct NameFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    include_hidden: bool,
    include_backups: bool,
    include_generated: bool,
}

impl NameFilter {
    /// Compile the patterns in `options`
    ///
    /// # Errors
    ///
    /// - [`CompareError::Configuration`](crate::CompareError::Configuration) for an invalid regex
    pub fn from_options(options: &ReconcileOptions) -> Result<Self> {
        Ok(Self {
            include: compile_all(&options.include_patterns)?,
            exclude: compile_all(&options.exclude_patterns)?,
            include_hidden: options.include_hidden,
            include_backups: options.include_backups,
            include_generated: options.include_generated,
        })
    }

    /// Whether `name` should take part in the comparison
    pub fn accepts(&self, name: &str) -> bool {
        if !self.include_hidden && is_hidden(name) {
            trace!("Skipping hidden name {}", name);
            return false;
        }
        if !self.include_backups && is_backup(name) {
            trace!("Skipping backup name {}", name);
            return false;
        }
        if !self.include_generated && is_generated(name) {
            trace!("Skipping generated name {}", name);
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(name)) {
            return false;
        }
        !self.exclude.iter().any(|re| re.is_match(name))
    }
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(Into::into))
        .collect()
}

/// Dot-prefixed names
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

/// Names that look like backup copies
///
/// `foo~`, `#foo#`, `~foo`, `foo.bak`, `foo.tmp`, `Copy of foo`,
/// `foo copy`, `foo backup 2.txt`.
pub fn is_backup(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    if name.starts_with(['~', '#']) || name.ends_with(['~', '#']) {
        return true;
    }

    let path = Path::new(name);
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        if BACKUP_EXTENSIONS.iter().any(|b| ext.eq_ignore_ascii_case(b)) {
            return true;
        }
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_ascii_lowercase();
    if stem.starts_with("copy of ") {
        return true;
    }
    let mut words = stem.split_whitespace().rev();
    match (words.next(), words.next()) {
        (Some(last), _) if last == "copy" || last == "backup" => true,
        (Some(last), Some(prev)) if last.chars().all(|c| c.is_ascii_digit()) => {
            prev == "copy" || prev == "backup"
        }
        _ => false,
    }
}

/// Files produced by compilers, interpreters or the desktop
pub fn is_generated(name: &str) -> bool {
    if GENERATED_NAMES.contains(&name) {
        return true;
    }
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|ext| GENERATED_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}
