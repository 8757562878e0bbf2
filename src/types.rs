//! Core data types used throughout treecmp
//!
//! ## Overview
//!
//! The types in this module represent:
//! - **Inputs**: `RootSet`, `Entry`, `DirectorySnapshot` - what the lister observed
//! - **Verdicts**: `Verdict`, `DiffReason`, `RootObservation` - per-root classification
//! - **Results**: `UnionEntry`, `ReconciliationResult`, `SubtreeOutcome`, `Counters`
//! - **Progress**: `ProgressInfo` - reported once per visited directory
//!
//! ## Examples
//!
//! ```rust
//! use treecmp::types::{Verdict, DiffReason};
//!
//! let verdict = Verdict::Different(vec![DiffReason::Size, DiffReason::ModTime]);
//! assert!(verdict.is_difference());
//! assert_eq!(verdict.reason_labels(), "SIZE TIME");
//! ```

use crate::error::{CompareError, Result};
use crate::utils;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Ordered set of directory roots being compared
///
/// The first root is the default reference. Relative roots are resolved
/// against the current directory when the set is built.
///
/// # Examples
///
/// ```rust
/// use treecmp::RootSet;
///
/// let roots = RootSet::new(vec!["/srv/a".into(), "/srv/b".into()]).unwrap();
/// assert_eq!(roots.len(), 2);
///
/// assert!(RootSet::new(vec!["/srv/a".into()]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSet {
    roots: Vec<PathBuf>,
}

impl RootSet {
    /// Build a root set from at least two paths
    ///
    /// # Errors
    ///
    /// - [`CompareError::Configuration`] if fewer than two roots are supplied
    /// - [`CompareError::Io`] if the current directory is needed and unavailable
    pub fn new(roots: Vec<PathBuf>) -> Result<Self> {
        if roots.len() < 2 {
            return Err(CompareError::configuration(format!(
                "at least two roots are required, got {}",
                roots.len()
            )));
        }

        let mut absolute = Vec::with_capacity(roots.len());
        for root in roots {
            if root.is_absolute() {
                absolute.push(root);
            } else {
                absolute.push(std::env::current_dir()?.join(root));
            }
        }

        Ok(Self { roots: absolute })
    }

    /// Number of roots
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Always false; a root set holds at least two roots
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Root at `index`
    pub fn get(&self, index: usize) -> Option<&Path> {
        self.roots.get(index).map(PathBuf::as_path)
    }

    /// Iterate over the roots in order
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.roots.iter().map(PathBuf::as_path)
    }

    /// Roots as a slice
    pub fn as_slice(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Kind of filesystem object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link that was not followed
    Symlink,
    /// Sockets, fifos, devices
    Other,
}

impl EntryKind {
    /// Short label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "dir",
            EntryKind::Symlink => "link",
            EntryKind::Other => "other",
        }
    }
}

/// Identity of a directory on disk, used to detect symlink cycles
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileId {
    /// Device and inode number
    Inode {
        /// Device the object lives on
        device: u64,
        /// Inode number on that device
        inode: u64,
    },
    /// Canonical path, where inode numbers are not available
    Canonical(PathBuf),
}

/// One filesystem object within a single root at a single relative path
///
/// Entries are snapshots taken when the directory was listed. The content
/// digest is the only part filled in later, and only when a content
/// comparison asks for it.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Name within its parent directory
    pub name: OsString,
    /// Absolute path used for reading content
    pub path: PathBuf,
    /// What kind of object this is
    pub kind: EntryKind,
    /// Size in bytes (files only, 0 otherwise)
    pub size: u64,
    /// Last modification time
    pub modified: Option<DateTime<Utc>>,
    /// Unix permission bits
    pub permissions: u32,
    /// Target of an unfollowed symbolic link
    pub link_target: Option<PathBuf>,
    /// Identity used for cycle detection (directories only)
    pub file_id: Option<FileId>,
    /// Set when the entry's metadata could not be read
    pub error: Option<String>,
    digest: OnceLock<std::result::Result<String, String>>,
}

impl Entry {
    /// Create an entry with no size, time or permissions recorded
    pub fn new(name: impl Into<OsString>, path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            kind,
            size: 0,
            modified: None,
            permissions: 0,
            link_target: None,
            file_id: None,
            error: None,
            digest: OnceLock::new(),
        }
    }

    /// Create an entry whose metadata could not be read
    pub fn unreadable(
        name: impl Into<OsString>,
        path: impl Into<PathBuf>,
        error: impl Into<String>,
    ) -> Self {
        let mut entry = Self::new(name, path, EntryKind::Other);
        entry.error = Some(error.into());
        entry
    }

    /// Set the size
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    /// Set the modification time
    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }

    /// Set the permission bits
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    /// Name as displayable text
    pub fn display_name(&self) -> String {
        self.name.to_string_lossy().into_owned()
    }

    /// Whether the entry's metadata was read successfully
    pub fn is_readable(&self) -> bool {
        self.error.is_none()
    }

    /// Whether this entry is a directory
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// SHA-256 digest of the file's bytes, computed on first use
    ///
    /// The result (including a failure) is cached, so a file is read at most
    /// once per snapshot no matter how many roots compare against it.
    pub fn content_digest(&self) -> std::result::Result<&str, String> {
        let cached = self.digest.get_or_init(|| {
            utils::hash_file_content(&self.path).map_err(|e| e.to_string())
        });
        match cached {
            Ok(digest) => Ok(digest.as_str()),
            Err(message) => Err(message.clone()),
        }
    }

    /// Digest if it has already been computed
    pub fn cached_digest(&self) -> Option<&str> {
        self.digest
            .get()
            .and_then(|d| d.as_ref().ok())
            .map(String::as_str)
    }
}

/// How a directory listing turned out for one root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotState {
    /// The directory was read
    Listed,
    /// The path does not exist (or is not a directory) under this root
    Absent,
    /// The directory exists but could not be read
    Unreadable(String),
}

/// Entries observed in one directory of one root
#[derive(Debug, Clone)]
pub struct DirectorySnapshot {
    /// Absolute path of the listed directory
    pub dir: PathBuf,
    /// Outcome of the listing
    pub state: SnapshotState,
    /// Entries keyed by name
    pub entries: BTreeMap<OsString, Entry>,
}

impl DirectorySnapshot {
    /// Snapshot of a directory that was read
    pub fn listed(dir: impl Into<PathBuf>, entries: BTreeMap<OsString, Entry>) -> Self {
        Self {
            dir: dir.into(),
            state: SnapshotState::Listed,
            entries,
        }
    }

    /// Empty snapshot for a path that is not there
    pub fn absent(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: SnapshotState::Absent,
            entries: BTreeMap::new(),
        }
    }

    /// Empty snapshot for a directory that could not be read
    pub fn unreadable(dir: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            state: SnapshotState::Unreadable(message.into()),
            entries: BTreeMap::new(),
        }
    }

    /// Look up an entry by name
    pub fn get(&self, name: &OsStr) -> Option<&Entry> {
        self.entries.get(name)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only entries accepted by `keep`, returning how many were dropped
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Entry) -> bool,
    {
        let before = self.entries.len();
        self.entries.retain(|_, entry| keep(entry));
        before - self.entries.len()
    }
}

/// Why two present entries were judged different
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffReason {
    /// File on one side, directory (or other kind) on the other
    Kind,
    /// Byte sizes differ
    Size,
    /// Modification times differ
    ModTime,
    /// Permission bits differ
    Permissions,
    /// Bytes differ
    Content,
    /// Symbolic links point at different targets
    LinkTarget,
}

impl DiffReason {
    /// Report keyword for this reason
    pub fn label(&self) -> &'static str {
        match self {
            DiffReason::Kind => "KIND",
            DiffReason::Size => "SIZE",
            DiffReason::ModTime => "TIME",
            DiffReason::Permissions => "PERM",
            DiffReason::Content => "CONTENT",
            DiffReason::LinkTarget => "LINK",
        }
    }
}

/// Per-name, per-root classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "detail", rename_all = "snake_case")]
pub enum Verdict {
    /// Equal to the reference entry under the configured policy
    Same,
    /// Present but not equal to the reference entry
    Different(Vec<DiffReason>),
    /// Not present in this root
    Missing,
    /// Present but could not be read
    Unreadable(String),
}

impl Verdict {
    /// Whether this is `Same`
    pub fn is_same(&self) -> bool {
        matches!(self, Verdict::Same)
    }

    /// Whether this is `Missing`
    pub fn is_missing(&self) -> bool {
        matches!(self, Verdict::Missing)
    }

    /// Whether this is `Unreadable`
    pub fn is_unreadable(&self) -> bool {
        matches!(self, Verdict::Unreadable(_))
    }

    /// Whether this counts as a difference (`Different` or `Missing`)
    pub fn is_difference(&self) -> bool {
        matches!(self, Verdict::Different(_) | Verdict::Missing)
    }

    /// Space separated reason keywords, empty unless `Different`
    pub fn reason_labels(&self) -> String {
        match self {
            Verdict::Different(reasons) => reasons
                .iter()
                .map(DiffReason::label)
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        }
    }
}

/// What one root holds for one union name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootObservation {
    /// Classification against the reference root
    pub verdict: Verdict,
    /// Whether the root's listing held the name
    pub present: bool,
    /// Kind, if present
    pub kind: Option<EntryKind>,
    /// Size, if present
    pub size: Option<u64>,
    /// Modification time, if present
    pub modified: Option<DateTime<Utc>>,
    /// Content digest, if one was computed
    pub digest: Option<String>,
}

impl RootObservation {
    /// Observation for a root that lacks the name
    pub fn missing() -> Self {
        Self {
            verdict: Verdict::Missing,
            present: false,
            kind: None,
            size: None,
            modified: None,
            digest: None,
        }
    }

    /// Observation for a root whose directory could not be listed
    ///
    /// Nothing is known about the name there, so it is not counted as present.
    pub fn unreadable(message: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Unreadable(message.into()),
            ..Self::missing()
        }
    }

    /// Observation of a present entry
    pub fn present(entry: &Entry, verdict: Verdict) -> Self {
        let readable = entry.is_readable();
        Self {
            verdict,
            present: true,
            kind: readable.then_some(entry.kind),
            size: (readable && entry.kind == EntryKind::File).then_some(entry.size),
            modified: entry.modified,
            digest: entry.cached_digest().map(str::to_string),
        }
    }

    /// Whether the root was seen to hold the name, readable or not
    pub fn is_present(&self) -> bool {
        self.present
    }
}

/// Annotation attached to a union entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum EntryWarning {
    /// The directory leads back to one of its own ancestors in this root
    CycleDetected {
        /// Index of the root where the loop was found
        root: usize,
    },
}

/// One name at one relative path, across every root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnionEntry {
    /// Entry name as displayable text
    pub name: String,
    #[serde(skip)]
    pub(crate) os_name: OsString,
    /// Lowest-index root holding a readable entry, if any
    pub reference_root: Option<usize>,
    /// Whether the name is a directory in at least one root
    pub is_directory: bool,
    /// One observation per root, in root order
    pub observations: Vec<RootObservation>,
    /// Annotations such as detected cycles
    pub warnings: Vec<EntryWarning>,
}

impl UnionEntry {
    /// Raw name as found on disk
    pub fn os_name(&self) -> &OsStr {
        &self.os_name
    }

    /// Verdict for the root at `index`
    pub fn verdict(&self, index: usize) -> Option<&Verdict> {
        self.observations.get(index).map(|o| &o.verdict)
    }

    /// Whether every root holds an equal copy
    pub fn is_identical(&self) -> bool {
        self.observations.iter().all(|o| o.verdict.is_same())
    }

    /// Whether any root is missing the name or holds a different copy
    pub fn has_difference(&self) -> bool {
        self.observations.iter().any(|o| o.verdict.is_difference())
    }

    /// Whether any root could not be read
    pub fn has_unreadable(&self) -> bool {
        self.observations.iter().any(|o| o.verdict.is_unreadable())
    }

    /// Indices of roots that lack the name
    pub fn missing_roots(&self) -> Vec<usize> {
        self.observations
            .iter()
            .enumerate()
            .filter(|(_, o)| o.verdict.is_missing())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Aggregate counts for a subtree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Union names classified
    pub entries_compared: usize,
    /// Union names identical in every root
    pub identical: usize,
    /// Union names with at least one `Different` or `Missing` verdict
    pub differences: usize,
    /// Per root: union names that root lacks
    pub missing_per_root: Vec<usize>,
    /// Per root: names dropped by the filters
    pub filtered_per_root: Vec<usize>,
    /// Per root: union names that root holds
    pub present_per_root: Vec<usize>,
    /// `Unreadable` verdicts
    pub unreadable: usize,
    /// Directory levels reconciled
    pub directories_visited: usize,
    /// Subdirectories skipped because they loop back to an ancestor
    pub cycles_detected: usize,
    /// Subtrees not processed because of cancellation
    pub subtrees_cancelled: usize,
}

impl Counters {
    /// Zeroed counters for `roots` roots
    pub fn new(roots: usize) -> Self {
        Self {
            missing_per_root: vec![0; roots],
            filtered_per_root: vec![0; roots],
            present_per_root: vec![0; roots],
            ..Default::default()
        }
    }

    /// Add another subtree's counts into this one
    pub fn merge(&mut self, other: &Counters) {
        self.entries_compared += other.entries_compared;
        self.identical += other.identical;
        self.differences += other.differences;
        self.unreadable += other.unreadable;
        self.directories_visited += other.directories_visited;
        self.cycles_detected += other.cycles_detected;
        self.subtrees_cancelled += other.subtrees_cancelled;
        add_per_root(&mut self.missing_per_root, &other.missing_per_root);
        add_per_root(&mut self.filtered_per_root, &other.filtered_per_root);
        add_per_root(&mut self.present_per_root, &other.present_per_root);
    }

    /// Total `Missing` verdicts across roots
    pub fn total_missing(&self) -> usize {
        self.missing_per_root.iter().sum()
    }

    /// Whether anything differs
    pub fn has_differences(&self) -> bool {
        self.differences > 0
    }

    /// Whether parts of the tree could not be compared
    pub fn is_incomplete(&self) -> bool {
        self.unreadable > 0 || self.subtrees_cancelled > 0
    }
}

fn add_per_root(target: &mut Vec<usize>, other: &[usize]) {
    if target.len() < other.len() {
        target.resize(other.len(), 0);
    }
    for (t, o) in target.iter_mut().zip(other) {
        *t += o;
    }
}

/// What happened to one subdirectory in the recursion list
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubtreeOutcome {
    /// The subtree was reconciled
    Completed(Box<ReconciliationResult>),
    /// Cancellation fired before the subtree was started
    Cancelled {
        /// Path of the skipped subtree, relative to the roots
        relative_path: PathBuf,
        /// Depth of the skipped subtree
        depth: usize,
    },
    /// The subtree loops back to an ancestor and was not entered
    CycleDetected {
        /// Path of the skipped subtree, relative to the roots
        relative_path: PathBuf,
        /// Depth of the skipped subtree
        depth: usize,
        /// Root where the loop was found
        root: usize,
    },
}

impl SubtreeOutcome {
    /// Relative path of the subtree
    pub fn relative_path(&self) -> &Path {
        match self {
            SubtreeOutcome::Completed(result) => &result.relative_path,
            SubtreeOutcome::Cancelled { relative_path, .. } => relative_path,
            SubtreeOutcome::CycleDetected { relative_path, .. } => relative_path,
        }
    }

    /// Completed result, if any
    pub fn completed(&self) -> Option<&ReconciliationResult> {
        match self {
            SubtreeOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }
}

/// Classified union for one relative path, plus its subtrees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Path relative to every root; empty at the top
    pub relative_path: PathBuf,
    /// Nesting depth; 0 at the top
    pub depth: usize,
    /// Union entries in output order
    pub entries: Vec<UnionEntry>,
    /// Names that were a directory in at least one root
    pub subdirectories: Vec<String>,
    /// One outcome per subdirectory, in the same order
    pub children: Vec<SubtreeOutcome>,
    /// Counts for this level and every completed descendant
    pub counters: Counters,
}

impl ReconciliationResult {
    /// Union entry by name at this level
    pub fn entry(&self, name: &str) -> Option<&UnionEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Completed child result for the subdirectory `name`
    pub fn child(&self, name: &str) -> Option<&ReconciliationResult> {
        self.children
            .iter()
            .filter_map(SubtreeOutcome::completed)
            .find(|c| c.relative_path.file_name().map(|n| n == name).unwrap_or(false))
    }

    /// Completed result for a path relative to the roots
    pub fn find(&self, relative_path: &Path) -> Option<&ReconciliationResult> {
        let mut current = self;
        let rest = relative_path
            .strip_prefix(&self.relative_path)
            .unwrap_or(relative_path);
        for component in rest.components() {
            let name = component.as_os_str().to_string_lossy();
            current = current.child(&name)?;
        }
        Some(current)
    }

    /// Every completed result in the tree, depth first, parents before children
    pub fn walk(&self) -> Vec<&ReconciliationResult> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(result) = stack.pop() {
            out.push(result);
            for child in result.children.iter().rev() {
                if let Some(completed) = child.completed() {
                    stack.push(completed);
                }
            }
        }
        out
    }

    /// Whether any difference was found anywhere in the tree
    pub fn has_differences(&self) -> bool {
        self.counters.has_differences()
    }

    /// Whether every subtree was compared
    pub fn is_complete(&self) -> bool {
        self.counters.subtrees_cancelled == 0
    }

    /// Process exit code for this outcome
    ///
    /// 1 when anything differs, otherwise 2 when something could not be
    /// compared, otherwise 0.
    pub fn exit_code(&self) -> i32 {
        if self.counters.has_differences() {
            1
        } else if self.counters.is_incomplete() {
            2
        } else {
            0
        }
    }
}

/// Progress information reported once per visited directory
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Directory just reconciled, relative to the roots
    pub relative_path: PathBuf,
    /// Directory levels reconciled so far in this run
    pub directories_visited: usize,
    /// Union names classified so far in this run
    pub entries_compared: usize,
}
