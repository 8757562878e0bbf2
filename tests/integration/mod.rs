//! Integration tests for treecmp
//!
//! Builds generated trees in several roots, mutates some of them, and checks
//! that the reconciliation accounts for every mutation.

use ::treecmp::*;
use filetime::{set_file_mtime, FileTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

const FIXED_MTIME: i64 = 1_650_000_000;

/// N temporary roots plus helpers to populate them
pub struct TreeHarness {
    pub dirs: Vec<TempDir>,
    pub generator: TreeGenerator,
}

impl TreeHarness {
    /// Create `count` empty roots
    pub fn new(count: usize, seed: u64) -> Self {
        Self {
            dirs: (0..count).map(|_| TempDir::new().unwrap()).collect(),
            generator: TreeGenerator::new(seed),
        }
    }

    pub fn root(&self, index: usize) -> &Path {
        self.dirs[index].path()
    }

    pub fn roots(&self) -> RootSet {
        RootSet::new(self.dirs.iter().map(|d| d.path().to_path_buf()).collect()).unwrap()
    }

    /// Write `content` at `rel` in root `index` with a fixed mtime
    pub fn write(&self, index: usize, rel: &str, content: &[u8]) -> anyhow::Result<()> {
        let path = self.root(index).join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        set_file_mtime(&path, FileTime::from_unix_time(FIXED_MTIME, 0))?;
        Ok(())
    }

    /// Write the same generated tree into every root
    pub fn populate_all(&mut self, files: usize, max_depth: usize) -> anyhow::Result<Vec<String>> {
        let tree = self.generator.generate_tree(files, max_depth);
        for index in 0..self.dirs.len() {
            for (rel, content) in &tree {
                self.write(index, rel, content)?;
            }
        }
        Ok(tree.into_iter().map(|(rel, _)| rel).collect())
    }

    pub fn reconcile(&self, options: &ReconcileOptions) -> ReconciliationResult {
        reconcile(&self.roots(), Path::new(""), options).unwrap()
    }
}

/// Deterministic random tree contents
pub struct TreeGenerator {
    rng: StdRng,
}

impl TreeGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate `files` distinct relative paths with text content
    pub fn generate_tree(&mut self, files: usize, max_depth: usize) -> Vec<(String, Vec<u8>)> {
        let mut seen = BTreeSet::new();
        let mut tree = Vec::with_capacity(files);
        while tree.len() < files {
            let depth = self.rng.random_range(0..=max_depth);
            let mut rel = PathBuf::new();
            for _ in 0..depth {
                rel.push(format!("dir{}", self.rng.random_range(0..4)));
            }
            rel.push(format!("file{}.txt", self.rng.random_range(0..1000)));
            let rel = rel.to_string_lossy().into_owned();
            if seen.insert(rel.clone()) {
                let content = self.generate_content(16..512);
                tree.push((rel, content));
            }
        }
        tree
    }

    pub fn generate_content(&mut self, size: std::ops::Range<usize>) -> Vec<u8> {
        let len = self.rng.random_range(size);
        (0..len)
            .map(|_| {
                if self.rng.random_bool(0.1) {
                    b'\n'
                } else {
                    self.rng.random_range(b'a'..=b'z')
                }
            })
            .collect()
    }
}

/// Every (relative directory, name) pair that differs anywhere in the result
fn differing_paths(result: &ReconciliationResult) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for level in result.walk() {
        for entry in level.entries.iter().filter(|e| e.has_difference()) {
            out.insert(level.relative_path.join(&entry.name).to_string_lossy().into_owned());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_identical_trees() {
        let mut harness = TreeHarness::new(3, 7);
        let files = harness.populate_all(60, 3).unwrap();

        let result = harness.reconcile(&ReconcileOptions::default());
        info!("Compared {} entries", result.counters.entries_compared);

        assert!(!result.has_differences());
        assert_eq!(result.exit_code(), 0);
        let file_entries: usize = result
            .walk()
            .iter()
            .map(|l| l.entries.iter().filter(|e| !e.is_directory).count())
            .sum();
        assert_eq!(file_entries, files.len());
    }

    #[test]
    fn test_mutations_are_all_found() {
        let mut harness = TreeHarness::new(2, 11);
        let files = harness.populate_all(40, 3).unwrap();

        // Change, delete and add one file each in root 1
        let changed = &files[0];
        let deleted = &files[1];
        harness.write(1, changed, b"rewritten with another length").unwrap();
        fs::remove_file(harness.root(1).join(deleted)).unwrap();
        harness.write(1, "brand_new.txt", b"new").unwrap();

        let options = ReconcileOptions {
            equality: EqualityPolicy::Content,
            ..Default::default()
        };
        let result = harness.reconcile(&options);
        let found = differing_paths(&result);

        assert!(found.contains(changed.as_str()), "missing {} in {:?}", changed, found);
        assert!(found.contains(deleted.as_str()));
        assert!(found.contains("brand_new.txt"));
        assert_eq!(result.counters.missing_per_root, vec![1, 1]);
    }

    #[test]
    fn test_only_diffs_is_subset_on_generated_tree() {
        let mut harness = TreeHarness::new(2, 23);
        let files = harness.populate_all(30, 2).unwrap();
        harness.write(0, &files[3], b"different").unwrap();

        let full = harness.reconcile(&ReconcileOptions::default());
        let reduced = harness.reconcile(&ReconcileOptions {
            only_show_differences: true,
            ..Default::default()
        });

        let names = |r: &ReconciliationResult| -> BTreeSet<String> {
            r.walk()
                .iter()
                .flat_map(|l| {
                    l.entries
                        .iter()
                        .map(move |e| l.relative_path.join(&e.name).to_string_lossy().into_owned())
                })
                .collect()
        };
        let full_names = names(&full);
        let reduced_names = names(&reduced);
        assert!(reduced_names.is_subset(&full_names));
        assert!(reduced_names.len() < full_names.len());
        assert_eq!(full.counters, reduced.counters);
    }

    #[test]
    fn test_filters_and_counts() {
        let harness = TreeHarness::new(2, 1);
        for index in 0..2 {
            harness.write(index, "keep.rs", b"fn main() {}").unwrap();
            harness.write(index, "skip.log", b"noise").unwrap();
            harness.write(index, ".hidden", b"dot").unwrap();
            harness.write(index, "notes.txt~", b"backup").unwrap();
            harness.write(index, "mod.pyc", b"bytecode").unwrap();
        }
        harness.write(1, "extra.log", b"only here").unwrap();

        let options = ReconcileOptions {
            exclude_patterns: vec![r"\.log$".to_string()],
            include_backups: false,
            include_generated: false,
            ..Default::default()
        };
        let result = harness.reconcile(&options);
        let names: Vec<&str> = result.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["keep.rs"]);
        assert_eq!(result.counters.filtered_per_root, vec![4, 5]);

        let defaults = harness.reconcile(&ReconcileOptions {
            exclude_patterns: vec![r"\.log$".to_string()],
            ..Default::default()
        });
        let names: Vec<&str> = defaults.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["keep.rs", "mod.pyc", "notes.txt~"]);
        assert_eq!(defaults.counters.filtered_per_root, vec![2, 3]);
        assert!(!result.has_differences());

        let everything = harness.reconcile(&ReconcileOptions::default().include_all());
        assert!(everything.entry(".hidden").is_some());
        assert!(everything.entry("notes.txt~").is_some());
        assert!(everything.entry("mod.pyc").is_some());
        assert!(everything.entry("extra.log").unwrap().verdict(0).unwrap().is_missing());
    }

    #[test]
    fn test_three_roots_deep_kind_conflict() {
        let harness = TreeHarness::new(3, 5);
        harness.write(0, "a/b/c.txt", b"abc").unwrap();
        harness.write(1, "a/b", b"a file where a directory was").unwrap();
        harness.write(2, "a/b/c.txt", b"abc").unwrap();

        let result = harness.reconcile(&ReconcileOptions::default());
        let a = result.child("a").unwrap();
        let b = a.entry("b").unwrap();
        assert_eq!(b.reference_root, Some(0));
        assert_eq!(b.verdict(1), Some(&Verdict::Different(vec![DiffReason::Kind])));
        assert_eq!(b.verdict(2), Some(&Verdict::Same));

        let c = result.find(Path::new("a/b")).unwrap().entry("c.txt").unwrap();
        assert_eq!(c.missing_roots(), vec![1]);
    }

    #[test]
    fn test_workers_do_not_change_output() {
        let mut harness = TreeHarness::new(2, 99);
        let files = harness.populate_all(80, 4).unwrap();
        for rel in files.iter().step_by(7) {
            harness.write(1, rel, b"changed").unwrap();
        }

        let roots = harness.roots();
        let options = ReconcileOptions::default();
        let serial = ReconcilerBuilder::new()
            .parallel_workers(1)
            .build()
            .reconcile(&roots, Path::new(""), &options)
            .unwrap();
        let parallel = ReconcilerBuilder::new()
            .parallel_workers(8)
            .build()
            .reconcile(&roots, Path::new(""), &options)
            .unwrap();

        let serial_json = render(&serial, &roots, OutputFormat::Json, &RenderOptions::default()).unwrap();
        let parallel_json = render(&parallel, &roots, OutputFormat::Json, &RenderOptions::default()).unwrap();
        assert_eq!(serial_json, parallel_json);
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_denied_directory() {
        use std::os::unix::fs::PermissionsExt;

        let harness = TreeHarness::new(2, 3);
        harness.write(0, "private/secret.txt", b"s").unwrap();
        harness.write(1, "private/secret.txt", b"s").unwrap();
        let locked = harness.root(1).join("private");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users can still read the directory
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = harness.reconcile(&ReconcileOptions::default());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let secret = result.find(Path::new("private")).unwrap().entry("secret.txt").unwrap();
        assert!(secret.verdict(1).unwrap().is_unreadable());
        assert!(secret.missing_roots().is_empty());
    }
}
