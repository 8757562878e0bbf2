//! Property-based testing for treecmp
//!
//! Uses proptest to generate small multi-root trees and checks invariants
//! that must hold for any input.

use ::treecmp::*;
use filetime::{set_file_mtime, FileTime};
use proptest::prelude::*;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Contents of one root: relative file path -> bytes
type Layout = BTreeMap<String, Vec<u8>>;

/// Generate file paths at most two directories deep
fn path_strategy() -> impl Strategy<Value = String> {
    let dirs = prop::collection::vec(prop_oneof!["alpha", "beta", "gamma"], 0..=2);
    let name = prop_oneof![
        "file[0-9]\\.txt".prop_map(|s| s),
        "[a-e]{1,3}\\.(rs|md)".prop_map(|s| s),
    ];
    (dirs, name).prop_map(|(dirs, name)| {
        let mut parts: Vec<String> = dirs.into_iter().map(String::from).collect();
        parts.push(name);
        parts.join("/")
    })
}

fn layout_strategy() -> impl Strategy<Value = Layout> {
    prop::collection::btree_map(path_strategy(), prop::collection::vec(any::<u8>(), 0..32), 0..12)
}

/// Two or three roots, each a random layout
fn roots_strategy() -> impl Strategy<Value = Vec<Layout>> {
    prop::collection::vec(layout_strategy(), 2..=3)
}

fn materialize(layouts: &[Layout]) -> (Vec<TempDir>, RootSet) {
    let dirs: Vec<TempDir> = layouts.iter().map(|_| TempDir::new().unwrap()).collect();
    for (dir, layout) in dirs.iter().zip(layouts) {
        for (rel, content) in layout {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            set_file_mtime(&path, FileTime::from_unix_time(1_500_000_000, 0)).unwrap();
        }
    }
    let roots = RootSet::new(dirs.iter().map(|d| d.path().to_path_buf()).collect()).unwrap();
    (dirs, roots)
}

/// Every listed name, keyed by its full relative path
fn entries_by_path(result: &ReconciliationResult) -> BTreeMap<String, UnionEntry> {
    let mut out = BTreeMap::new();
    for level in result.walk() {
        for entry in &level.entries {
            let key = level.relative_path.join(&entry.name).to_string_lossy().into_owned();
            out.insert(key, entry.clone());
        }
    }
    out
}

/// Whether `rel` names a file or a directory inside `layout`
fn layout_has(layout: &Layout, rel: &str) -> bool {
    let prefix = format!("{}/", rel);
    layout.keys().any(|k| k == rel || k.starts_with(&prefix))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn prop_missing_exactly_where_absent(layouts in roots_strategy()) {
        let (_dirs, roots) = materialize(&layouts);
        let result = reconcile(&roots, Path::new(""), &ReconcileOptions::default()).unwrap();

        for (rel, entry) in entries_by_path(&result) {
            for (i, layout) in layouts.iter().enumerate() {
                prop_assert_eq!(
                    entry.verdict(i).unwrap().is_missing(),
                    !layout_has(layout, &rel),
                    "root {} name {}", i, rel
                );
            }
        }
    }

    #[test]
    fn prop_same_entries_agree_pairwise(layouts in roots_strategy()) {
        let (_dirs, roots) = materialize(&layouts);
        let result = reconcile(&roots, Path::new(""), &ReconcileOptions::default()).unwrap();

        for entry in entries_by_path(&result).values() {
            let same: Vec<&RootObservation> =
                entry.observations.iter().filter(|o| o.verdict.is_same()).collect();
            for pair in same.windows(2) {
                prop_assert_eq!(pair[0].kind, pair[1].kind);
                prop_assert_eq!(pair[0].size, pair[1].size);
            }
        }
    }

    #[test]
    fn prop_include_filter_commutes(layouts in roots_strategy(), ext in prop_oneof!["rs", "md", "txt"]) {
        let (_dirs, roots) = materialize(&layouts);
        let pattern = format!(r"\.{}$", ext);
        let regex = Regex::new(&pattern).unwrap();

        let unfiltered = reconcile(&roots, Path::new(""), &ReconcileOptions::default()).unwrap();
        let top_unfiltered: BTreeSet<String> = unfiltered
            .entries
            .iter()
            .filter(|e| regex.is_match(&e.name))
            .map(|e| e.name.clone())
            .collect();

        let options = ReconcileOptions {
            include_patterns: vec![pattern.clone()],
            ..Default::default()
        };
        let filtered = reconcile(&roots, Path::new(""), &options).unwrap();
        let top_filtered: BTreeSet<String> = filtered.entries.iter().map(|e| e.name.clone()).collect();

        prop_assert_eq!(top_filtered, top_unfiltered);
    }

    #[test]
    fn prop_only_differences_is_subset(layouts in roots_strategy()) {
        let (_dirs, roots) = materialize(&layouts);
        let full = reconcile(&roots, Path::new(""), &ReconcileOptions::default()).unwrap();
        let reduced = reconcile(&roots, Path::new(""), &ReconcileOptions {
            only_show_differences: true,
            ..Default::default()
        }).unwrap();

        let full_keys: BTreeSet<String> = entries_by_path(&full).into_keys().collect();
        for (key, entry) in entries_by_path(&reduced) {
            prop_assert!(full_keys.contains(&key));
            prop_assert!(!entry.is_identical());
        }
        prop_assert_eq!(full.counters, reduced.counters);
    }

    #[test]
    fn prop_directories_recursed_once(layouts in roots_strategy()) {
        let (_dirs, roots) = materialize(&layouts);
        let result = reconcile(&roots, Path::new(""), &ReconcileOptions::default()).unwrap();

        let mut visited = BTreeSet::new();
        for level in result.walk() {
            prop_assert!(visited.insert(level.relative_path.clone()));
            let dirs: Vec<&str> = level
                .entries
                .iter()
                .filter(|e| e.is_directory)
                .map(|e| e.name.as_str())
                .collect();
            let listed: Vec<&str> = level.subdirectories.iter().map(String::as_str).collect();
            prop_assert_eq!(dirs, listed);
        }
        prop_assert_eq!(visited.len(), result.counters.directories_visited);
    }
}
