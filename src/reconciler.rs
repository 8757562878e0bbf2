//! Tree reconciliation
//!
//! Given N roots and a relative path, the reconciler lists that directory in
//! every root, filters each listing, builds the union of names, classifies
//! every name per root against its reference root, and then recurses into
//! every name that is a directory in at least one root.
//!
//! ## Reference root
//!
//! For each name, the reference is the lowest-index root holding a readable
//! entry with that name. Every other root is classified against it:
//!
//! ```text
//!             root0      root1      root2
//! a.txt       SAME       SAME       DIFFERENT(SIZE)    reference = root0
//! b.txt       MISSING    SAME       SAME               reference = root1
//! ```
//!
//! ## Parallelism
//!
//! All work runs inside a dedicated rayon pool of `parallel_workers` threads.
//! Listings across roots, classification of union names (and with it content
//! hashing) and sibling subtrees are processed with parallel iterators. The
//! pool size bounds how many files are open at once. Results are collected in
//! input order, so the output does not depend on scheduling.
//!
//! ## Cycles
//!
//! Each branch of the recursion carries, per root, the identities of the
//! directories above it. A subdirectory whose identity is already on that
//! chain is not entered; it is reported as `CycleDetected` instead.
//!
//! ## Example
//!
//! ```rust,no_run
//! use treecmp::{reconcile, ReconcileOptions, RootSet, EqualityPolicy};
//! use std::path::{Path, PathBuf};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let roots = RootSet::new(vec![PathBuf::from("./left"), PathBuf::from("./right")])?;
//! let options = ReconcileOptions {
//!     equality: EqualityPolicy::Content,
//!     ..Default::default()
//! };
//!
//! let result = reconcile(&roots, Path::new(""), &options)?;
//! println!("{} differences", result.counters.differences);
//! # Ok(())
//! # }
//! ```

use crate::cancel::CancellationToken;
use crate::compare::classify;
use crate::config::ReconcileOptions;
use crate::error::Result;
use crate::filter::NameFilter;
use crate::lister::{DirectoryLister, FsLister};
use crate::types::{
    Counters, DirectorySnapshot, Entry, EntryWarning, FileId, ProgressInfo,
    ReconciliationResult, RootObservation, RootSet, SnapshotState, SubtreeOutcome, UnionEntry,
    Verdict,
};
use rayon::prelude::*;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, trace, warn};

/// Callback invoked once per reconciled directory
pub type ProgressCallback = Arc<dyn Fn(ProgressInfo) + Send + Sync>;

/// Compare the trees under `roots` at `relative_path` with the default reconciler
///
/// Uses [`FsLister`], one worker per CPU and no cancellation. See
/// [`ReconcilerBuilder`] to change any of these.
///
/// # Errors
///
/// - [`CompareError::Configuration`](crate::CompareError::Configuration) for invalid patterns
/// - [`CompareError::InvalidRoot`](crate::CompareError::InvalidRoot) if a root is missing or not a directory
pub fn reconcile(
    roots: &RootSet,
    relative_path: &Path,
    options: &ReconcileOptions,
) -> Result<ReconciliationResult> {
    ReconcilerBuilder::new().build().reconcile(roots, relative_path, options)
}

/// Multi-way directory tree reconciler
///
/// A `Reconciler` holds only runtime knobs (lister, pool size, cancellation,
/// progress). Comparison options are passed to each call, and no state is
/// kept between calls.
pub struct Reconciler {
    lister: Arc<dyn DirectoryLister>,
    parallel_workers: usize,
    cancellation: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("lister", &self.lister)
            .field("parallel_workers", &self.parallel_workers)
            .field("cancellation", &self.cancellation)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl Reconciler {
    /// Reconcile `relative_path` across `roots`, recursing into subdirectories
    ///
    /// Roots are validated before anything is compared, so a bad root never
    /// produces a partial result.
    ///
    /// # Errors
    ///
    /// - [`CompareError::Configuration`](crate::CompareError::Configuration) for invalid patterns
    /// - [`CompareError::InvalidRoot`](crate::CompareError::InvalidRoot) if a root is missing or not a directory
    /// - [`CompareError::ThreadPool`](crate::CompareError::ThreadPool) if the worker pool cannot start
    #[instrument(skip_all, fields(roots = roots.len(), path = %relative_path.display()))]
    pub fn reconcile(
        &self,
        roots: &RootSet,
        relative_path: &Path,
        options: &ReconcileOptions,
    ) -> Result<ReconciliationResult> {
        let filter = options.validate()?;

        let mut root_ids = Vec::with_capacity(roots.len());
        for root in roots.iter() {
            root_ids.push(self.lister.check_root(root)?);
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.parallel_workers)
            .thread_name(|i| format!("treecmp-worker-{}", i))
            .build()?;

        let run = Run {
            lister: self.lister.as_ref(),
            roots,
            options,
            filter: &filter,
            cancel: &self.cancellation,
            progress: self.progress.as_ref(),
            directories_visited: AtomicUsize::new(0),
            entries_compared: AtomicUsize::new(0),
        };
        let ancestors: Vec<Vec<FileId>> = roots
            .iter()
            .zip(root_ids)
            .map(|(root, id)| self.start_chain(root, id, relative_path))
            .collect();

        let start = Instant::now();
        let result = pool.install(|| run.reconcile_level(relative_path, 0, &ancestors));

        info!(
            "Compared {} entries in {} directories across {} roots in {:?} ({} differences)",
            result.counters.entries_compared,
            result.counters.directories_visited,
            roots.len(),
            start.elapsed(),
            result.counters.differences
        );
        if result.counters.unreadable > 0 {
            warn!("{} entries could not be read", result.counters.unreadable);
        }
        if result.counters.subtrees_cancelled > 0 {
            warn!("{} subtrees were cancelled before comparison", result.counters.subtrees_cancelled);
        }
        Ok(result)
    }

    /// Ancestor chain for a run starting at `relative_path` below `root`
    fn start_chain(&self, root: &Path, root_id: FileId, relative_path: &Path) -> Vec<FileId> {
        let mut chain = vec![root_id];
        let mut prefix = PathBuf::new();
        for component in relative_path.components() {
            prefix.push(component);
            if let Some(id) = self.lister.directory_id(root, &prefix) {
                chain.push(id);
            }
        }
        chain
    }
}

/// Builder for [`Reconciler`]
///
/// # Examples
///
/// ```rust
/// use treecmp::{ReconcilerBuilder, CancellationToken};
/// use std::time::Duration;
///
/// let reconciler = ReconcilerBuilder::new()
///     .parallel_workers(4)
///     .cancellation(CancellationToken::with_timeout(Duration::from_secs(30)))
///     .build();
/// ```
pub struct ReconcilerBuilder {
    lister: Option<Arc<dyn DirectoryLister>>,
    parallel_workers: usize,
    cancellation: CancellationToken,
    progress: Option<ProgressCallback>,
}

impl ReconcilerBuilder {
    /// Create a builder with default settings
    pub fn new() -> Self {
        Self {
            lister: None,
            parallel_workers: num_cpus::get(),
            cancellation: CancellationToken::new(),
            progress: None,
        }
    }

    /// Use a custom directory lister
    pub fn lister(mut self, lister: Arc<dyn DirectoryLister>) -> Self {
        self.lister = Some(lister);
        self
    }

    /// Set number of worker threads (minimum 1)
    ///
    /// This also bounds how many files are hashed concurrently.
    pub fn parallel_workers(mut self, count: usize) -> Self {
        self.parallel_workers = count.max(1);
        self
    }

    /// Stop early when `token` fires
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Report progress after each reconciled directory
    pub fn progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressInfo) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Build the reconciler
    pub fn build(self) -> Reconciler {
        Reconciler {
            lister: self.lister.unwrap_or_else(|| Arc::new(FsLister::new())),
            parallel_workers: self.parallel_workers,
            cancellation: self.cancellation,
            progress: self.progress,
        }
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Where recursion goes next for one union name
enum ChildPlan {
    Enter {
        relative_path: PathBuf,
        ancestors: Vec<Vec<FileId>>,
    },
    Cycle {
        relative_path: PathBuf,
        root: usize,
    },
}

/// State shared by every level of one `reconcile` call
struct Run<'a> {
    lister: &'a dyn DirectoryLister,
    roots: &'a RootSet,
    options: &'a ReconcileOptions,
    filter: &'a NameFilter,
    cancel: &'a CancellationToken,
    progress: Option<&'a ProgressCallback>,
    directories_visited: AtomicUsize,
    entries_compared: AtomicUsize,
}

impl Run<'_> {
    fn reconcile_level(
        &self,
        relative_path: &Path,
        depth: usize,
        ancestors: &[Vec<FileId>],
    ) -> ReconciliationResult {
        let root_count = self.roots.len();
        let mut counters = Counters::new(root_count);
        counters.directories_visited = 1;

        let mut snapshots = self.snapshots(relative_path);
        for (i, snapshot) in snapshots.iter_mut().enumerate() {
            counters.filtered_per_root[i] = snapshot.retain(|e| self.filter.accepts(&e.display_name()));
        }

        let names = self.union_names(&snapshots);
        trace!("{} union names at {:?}", names.len(), relative_path);

        let classified: Vec<(UnionEntry, Option<ChildPlan>)> = names
            .par_iter()
            .map(|name| self.classify_name(name, &snapshots, relative_path, ancestors))
            .collect();

        let mut entries = Vec::with_capacity(classified.len());
        let mut subdirectories = Vec::new();
        let mut plans = Vec::new();
        for (entry, plan) in classified {
            counters.entries_compared += 1;
            if entry.is_identical() {
                counters.identical += 1;
            }
            if entry.has_difference() {
                counters.differences += 1;
            }
            for (i, observation) in entry.observations.iter().enumerate() {
                match &observation.verdict {
                    Verdict::Missing => counters.missing_per_root[i] += 1,
                    Verdict::Unreadable(_) => counters.unreadable += 1,
                    _ => {}
                }
                if observation.is_present() {
                    counters.present_per_root[i] += 1;
                }
            }
            if let Some(plan) = plan {
                subdirectories.push(entry.name.clone());
                plans.push(plan);
            }
            entries.push(entry);
        }

        if self.options.only_show_differences {
            entries.retain(|e| !e.is_identical() || !e.warnings.is_empty());
        }

        self.report_progress(relative_path, counters.entries_compared);

        let children: Vec<SubtreeOutcome> = plans
            .into_par_iter()
            .map(|plan| match plan {
                ChildPlan::Cycle { relative_path, root } => {
                    warn!("Cycle detected at {:?} in root {}", relative_path, root);
                    SubtreeOutcome::CycleDetected {
                        relative_path,
                        depth: depth + 1,
                        root,
                    }
                }
                ChildPlan::Enter { relative_path, ancestors } => {
                    if self.cancel.is_cancelled() {
                        debug!("Cancelled before {:?}", relative_path);
                        SubtreeOutcome::Cancelled {
                            relative_path,
                            depth: depth + 1,
                        }
                    } else {
                        let child = self.reconcile_level(&relative_path, depth + 1, &ancestors);
                        SubtreeOutcome::Completed(Box::new(child))
                    }
                }
            })
            .collect();

        for child in &children {
            match child {
                SubtreeOutcome::Completed(result) => counters.merge(&result.counters),
                SubtreeOutcome::Cancelled { .. } => counters.subtrees_cancelled += 1,
                SubtreeOutcome::CycleDetected { .. } => counters.cycles_detected += 1,
            }
        }

        ReconciliationResult {
            relative_path: relative_path.to_path_buf(),
            depth,
            entries,
            subdirectories,
            children,
            counters,
        }
    }

    /// List `relative_path` in every root, once each
    fn snapshots(&self, relative_path: &Path) -> Vec<DirectorySnapshot> {
        let follow = self.options.follow_symlinks;
        self.roots
            .as_slice()
            .par_iter()
            .map(|root| match self.lister.list(root, relative_path, follow) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Cannot list {:?} under {:?}: {}", relative_path, root, e);
                    DirectorySnapshot::unreadable(root.join(relative_path), e.to_string())
                }
            })
            .collect()
    }

    /// Union of surviving names in output order
    fn union_names(&self, snapshots: &[DirectorySnapshot]) -> Vec<OsString> {
        let union: BTreeSet<&OsString> = snapshots.iter().flat_map(|s| s.entries.keys()).collect();
        let mut names: Vec<OsString> = union.into_iter().cloned().collect();

        if self.options.case_insensitive_order {
            names.sort_by_cached_key(|n| (n.to_string_lossy().to_lowercase(), n.as_encoded_bytes().to_vec()));
        } else {
            names.sort_by(|a, b| byte_order(a, b));
        }
        names
    }

    fn classify_name(
        &self,
        name: &OsString,
        snapshots: &[DirectorySnapshot],
        relative_path: &Path,
        ancestors: &[Vec<FileId>],
    ) -> (UnionEntry, Option<ChildPlan>) {
        let present: Vec<Option<&Entry>> = snapshots.iter().map(|s| s.get(name)).collect();
        let reference_root = present
            .iter()
            .position(|slot| slot.map(Entry::is_readable).unwrap_or(false));
        let reference = reference_root.and_then(|r| present[r]);

        let mut observations = Vec::with_capacity(present.len());
        let mut reference_error = None;
        for (i, slot) in present.iter().enumerate() {
            let observation = match (slot, reference) {
                (None, _) => match &snapshots[i].state {
                    SnapshotState::Unreadable(message) => RootObservation::unreadable(message.clone()),
                    _ => RootObservation::missing(),
                },
                (Some(entry), Some(reference)) if Some(i) != reference_root => {
                    let comparison = classify(reference, entry, self.options, self.cancel);
                    if comparison.reference_error.is_some() {
                        reference_error = comparison.reference_error;
                    }
                    RootObservation::present(entry, comparison.verdict)
                }
                (Some(entry), Some(_)) => RootObservation::present(entry, Verdict::Same),
                (Some(entry), None) => RootObservation::present(
                    entry,
                    Verdict::Unreadable(entry.error.clone().unwrap_or_default()),
                ),
            };
            observations.push(observation);
        }

        // Rebuilt after the loop so the reference shows a digest computed during comparison.
        if let (Some(r), Some(reference)) = (reference_root, reference) {
            let verdict = match reference_error {
                Some(message) => Verdict::Unreadable(message),
                None => Verdict::Same,
            };
            observations[r] = RootObservation::present(reference, verdict);
        }

        let is_directory = present.iter().flatten().any(|e| e.is_dir());
        let mut warnings = Vec::new();
        let plan = if is_directory {
            let child_path = relative_path.join(name);
            let cycle_root = present.iter().enumerate().find_map(|(i, slot)| {
                let id = slot.filter(|e| e.is_dir())?.file_id.as_ref()?;
                ancestors[i].contains(id).then_some(i)
            });
            match cycle_root {
                Some(root) => {
                    warnings.push(EntryWarning::CycleDetected { root });
                    Some(ChildPlan::Cycle {
                        relative_path: child_path,
                        root,
                    })
                }
                None => {
                    let child_ancestors = ancestors
                        .iter()
                        .zip(&present)
                        .map(|(chain, slot)| {
                            let mut chain = chain.clone();
                            if let Some(id) = slot.filter(|e| e.is_dir()).and_then(|e| e.file_id.clone()) {
                                chain.push(id);
                            }
                            chain
                        })
                        .collect();
                    Some(ChildPlan::Enter {
                        relative_path: child_path,
                        ancestors: child_ancestors,
                    })
                }
            }
        } else {
            None
        };

        let entry = UnionEntry {
            name: name.to_string_lossy().into_owned(),
            os_name: name.clone(),
            reference_root,
            is_directory,
            observations,
            warnings,
        };
        (entry, plan)
    }

    fn report_progress(&self, relative_path: &Path, compared: usize) {
        let visited = self.directories_visited.fetch_add(1, Ordering::Relaxed) + 1;
        let compared = self.entries_compared.fetch_add(compared, Ordering::Relaxed) + compared;
        if let Some(callback) = self.progress {
            callback(ProgressInfo {
                relative_path: relative_path.to_path_buf(),
                directories_visited: visited,
                entries_compared: compared,
            });
        }
    }
}

fn byte_order(a: &OsString, b: &OsString) -> CmpOrdering {
    a.as_encoded_bytes().cmp(b.as_encoded_bytes())
}
