//! Main test module for treecmp
//!
//! This module includes all test suites:
//! - Integration tests over generated multi-root trees
//! - Property-based tests for reconciliation invariants
//! - Edge cases below

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::treecmp::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn pair() -> (TempDir, TempDir, RootSet) {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let roots = RootSet::new(vec![a.path().to_path_buf(), b.path().to_path_buf()]).unwrap();
        (a, b, roots)
    }

    #[test]
    fn test_empty_roots() {
        let (_a, _b, roots) = pair();
        let result = reconcile(&roots, Path::new(""), &ReconcileOptions::default()).unwrap();
        assert!(result.entries.is_empty());
        assert!(result.children.is_empty());
        assert_eq!(result.counters.directories_visited, 1);
        assert_eq!(result.exit_code(), 0);
    }

    #[test]
    fn test_fewer_than_two_roots() {
        let a = TempDir::new().unwrap();
        let err = RootSet::new(vec![a.path().to_path_buf()]).unwrap_err();
        assert!(matches!(err, CompareError::Configuration(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_root_is_a_file() {
        let (a, _b, _) = pair();
        let file = a.path().join("plain");
        fs::write(&file, "x").unwrap();
        let roots = RootSet::new(vec![a.path().to_path_buf(), file]).unwrap();
        let err = reconcile(&roots, Path::new(""), &ReconcileOptions::default()).unwrap_err();
        assert!(matches!(err, CompareError::InvalidRoot { .. }));
        assert!(err.user_message().contains("directory"));
    }

    #[test]
    fn test_same_root_twice() {
        let (a, _b, _) = pair();
        fs::write(a.path().join("f.txt"), "x").unwrap();
        fs::create_dir(a.path().join("d")).unwrap();
        let roots = RootSet::new(vec![a.path().to_path_buf(), a.path().to_path_buf()]).unwrap();
        let result = reconcile(&roots, Path::new(""), &ReconcileOptions::default()).unwrap();
        assert!(!result.has_differences());
        assert_eq!(result.counters.identical, 2);
    }

    #[test]
    fn test_special_filenames() {
        let (a, b, roots) = pair();
        let names = ["with space.txt", "ünïcödé.txt", "semi;colon", "dash-start", "emoji_🚀.md"];
        for name in names {
            fs::write(a.path().join(name), name).unwrap();
        }
        fs::write(b.path().join(names[0]), names[0]).unwrap();

        let options = ReconcileOptions {
            equality: EqualityPolicy::Existence,
            ..Default::default()
        };
        let result = reconcile(&roots, Path::new(""), &options).unwrap();
        assert_eq!(result.entries.len(), names.len());
        assert!(result.entry("with space.txt").unwrap().is_identical());
        assert_eq!(result.counters.missing_per_root, vec![0, 4]);
    }

    #[test]
    fn test_backup_and_generated_names_compared_by_default() {
        let (a, _b, roots) = pair();
        for name in ["notes copy.txt", "main.o", "plan.tmp"] {
            fs::write(a.path().join(name), name).unwrap();
        }

        let result = reconcile(&roots, Path::new(""), &ReconcileOptions::default()).unwrap();
        assert_eq!(result.entries.len(), 3);
        assert_eq!(result.counters.filtered_per_root, vec![0, 0]);
        assert_eq!(result.counters.missing_per_root, vec![0, 3]);
        assert_eq!(result.exit_code(), 1);
    }

    #[test]
    fn test_empty_files_are_equal_by_content() {
        let (a, b, roots) = pair();
        fs::write(a.path().join("empty"), "").unwrap();
        fs::write(b.path().join("empty"), "").unwrap();
        let options = ReconcileOptions {
            equality: EqualityPolicy::Content,
            ..Default::default()
        };
        let result = reconcile(&roots, Path::new(""), &options).unwrap();
        assert!(result.entry("empty").unwrap().is_identical());
    }

    #[test]
    fn test_missing_start_path_is_empty_not_error() {
        let (_a, _b, roots) = pair();
        let result = reconcile(&roots, Path::new("no/such/dir"), &ReconcileOptions::default()).unwrap();
        assert_eq!(result.relative_path, PathBuf::from("no/such/dir"));
        assert!(result.entries.is_empty());
    }

    #[test]
    fn test_options_from_json() {
        let options: ReconcileOptions =
            serde_json::from_str(r#"{"equality": "content", "include_hidden": true}"#).unwrap();
        assert_eq!(options.equality, EqualityPolicy::Content);
        assert!(options.include_hidden);
        assert!(!options.follow_symlinks);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_targets_compared_when_not_followed() {
        let (a, b, roots) = pair();
        std::os::unix::fs::symlink("target-one", a.path().join("link")).unwrap();
        std::os::unix::fs::symlink("target-two", b.path().join("link")).unwrap();

        let result = reconcile(&roots, Path::new(""), &ReconcileOptions::default()).unwrap();
        let link = result.entry("link").unwrap();
        assert_eq!(link.verdict(1), Some(&Verdict::Different(vec![DiffReason::LinkTarget])));
        assert!(!link.is_directory);
    }
}
