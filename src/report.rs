//! Rendering reconciliation results
//!
//! The reconciler never prints. This module turns a [`ReconciliationResult`]
//! into text in one of three formats:
//!
//! - [`OutputFormat::Table`]: one line per union name with a status marker,
//!   a cell per root and the reasons for any difference, followed by totals.
//! - [`OutputFormat::Json`]: the full result tree.
//! - [`OutputFormat::Diff`]: `diff -r` style lines, with unified hunks for
//!   text files that differ.
//!
//! ## Table layout
//!
//! ```text
//! [0] /srv/left
//! [1] /srv/right
//!
//! == sub ==
//! ======  same.txt                     12 B          12 B
//! !!!!!!  changed.txt                  12 B          40 B          SIZE TIME
//! !!!!!!  only_left.txt                3 B           (NONE)
//! ```

use crate::diff::{self, FileDiff, LineDiffOptions};
use crate::error::Result;
use crate::types::{
    Counters, DiffReason, EntryKind, EntryWarning, ReconciliationResult, RootObservation,
    RootSet, SubtreeOutcome, UnionEntry, Verdict,
};
use crate::utils::format_bytes;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Marker for names identical in every root
pub const IDENTICAL_MARKER: &str = "======";
/// Marker for names missing or different in some root
pub const DIFFERENT_MARKER: &str = "!!!!!!";
/// Marker for names that could not be read in some root
pub const UNREADABLE_MARKER: &str = "??????";

const CELL_WIDTH: usize = 14;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Aligned columns with a summary
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// `diff -r` style
    Diff,
}

/// Presentation options
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Colorize markers and reasons
    pub color: bool,
    /// Context lines around each hunk in the diff format
    pub context_lines: usize,
    /// Pair lines that differ only in surrounding whitespace when printing hunks
    pub ignore_whitespace: bool,
    /// Text shown in a cell for a root that lacks the name
    pub nil: String,
    /// Width of the name column
    pub name_width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            color: false,
            context_lines: 3,
            ignore_whitespace: false,
            nil: "(NONE)".to_string(),
            name_width: 32,
        }
    }
}

impl RenderOptions {
    fn line_diff(&self) -> LineDiffOptions {
        LineDiffOptions {
            context_lines: self.context_lines,
            ignore_whitespace: self.ignore_whitespace,
            ..Default::default()
        }
    }

    fn paint<F>(&self, text: &str, style: F) -> String
    where
        F: Fn(&str) -> ColoredString,
    {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }
}

/// Render `result` for the given roots
///
/// # Errors
///
/// - [`CompareError::Json`](crate::CompareError::Json) if JSON serialization fails
pub fn render(
    result: &ReconciliationResult,
    roots: &RootSet,
    format: OutputFormat,
    options: &RenderOptions,
) -> Result<String> {
    debug!("Rendering {:?} report", format);
    match format {
        OutputFormat::Table => Ok(render_table(result, roots, options)),
        OutputFormat::Json => render_json(result, roots),
        OutputFormat::Diff => Ok(render_diff(result, roots, options)),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    roots: &'a [PathBuf],
    exit_code: i32,
    result: &'a ReconciliationResult,
}

fn render_json(result: &ReconciliationResult, roots: &RootSet) -> Result<String> {
    let report = JsonReport {
        roots: roots.as_slice(),
        exit_code: result.exit_code(),
        result,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

fn render_table(result: &ReconciliationResult, roots: &RootSet, options: &RenderOptions) -> String {
    let mut out = String::new();
    for (i, root) in roots.iter().enumerate() {
        let _ = writeln!(out, "[{}] {}", i, root.display());
    }

    for level in result.walk() {
        if level.entries.is_empty() && cancelled(level).next().is_none() {
            continue;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", options.paint(&level_title(&level.relative_path), |s| s.bold()));

        for entry in &level.entries {
            let _ = writeln!(out, "{}", table_line(entry, options));
        }
        for path in cancelled(level) {
            let _ = writeln!(
                out,
                "{}",
                options.paint(&format!("        {} (not compared, cancelled)", path.display()), |s| s.yellow())
            );
        }
    }

    out.push('\n');
    out.push_str(&summary(&result.counters, roots, options));
    out
}

fn level_title(relative_path: &Path) -> String {
    if relative_path.as_os_str().is_empty() {
        "== . ==".to_string()
    } else {
        format!("== {} ==", relative_path.display())
    }
}

fn cancelled(level: &ReconciliationResult) -> impl Iterator<Item = &Path> {
    level.children.iter().filter_map(|child| match child {
        SubtreeOutcome::Cancelled { relative_path, .. } => Some(relative_path.as_path()),
        _ => None,
    })
}

fn table_line(entry: &UnionEntry, options: &RenderOptions) -> String {
    let marker = if entry.has_difference() {
        options.paint(DIFFERENT_MARKER, |s| s.red().bold())
    } else if entry.has_unreadable() {
        options.paint(UNREADABLE_MARKER, |s| s.yellow().bold())
    } else {
        options.paint(IDENTICAL_MARKER, |s| s.green())
    };

    let mut name = entry.name.clone();
    if entry.is_directory {
        name.push('/');
    }
    let mut line = format!("{}  {:<width$}", marker, name, width = options.name_width);

    for observation in &entry.observations {
        let cell = cell_text(observation, options);
        let _ = write!(line, " {:<width$}", cell, width = CELL_WIDTH);
    }

    let reasons = entry_reasons(entry);
    if !reasons.is_empty() {
        line.push(' ');
        line.push_str(&options.paint(&reasons, |s| s.red()));
    }
    line.trim_end().to_string()
}

fn cell_text(observation: &RootObservation, options: &RenderOptions) -> String {
    match (&observation.verdict, observation.kind) {
        (Verdict::Missing, _) => options.nil.clone(),
        (Verdict::Unreadable(_), None) => "unreadable".to_string(),
        (_, Some(EntryKind::File)) => format_bytes(observation.size.unwrap_or(0)),
        (_, Some(EntryKind::Directory)) => "<dir>".to_string(),
        (_, Some(EntryKind::Symlink)) => "<link>".to_string(),
        (_, Some(EntryKind::Other)) => "<other>".to_string(),
        (_, None) => "?".to_string(),
    }
}

/// Reason keywords across every root, plus unreadable and cycle notes
fn entry_reasons(entry: &UnionEntry) -> String {
    let mut reasons: Vec<DiffReason> = entry
        .observations
        .iter()
        .filter_map(|o| match &o.verdict {
            Verdict::Different(reasons) => Some(reasons.iter().copied()),
            _ => None,
        })
        .flatten()
        .collect();
    reasons.sort();
    reasons.dedup();

    let mut words: Vec<String> = reasons.iter().map(|r| r.label().to_string()).collect();
    if entry.has_unreadable() {
        words.push("UNREADABLE".to_string());
    }
    for warning in &entry.warnings {
        match warning {
            EntryWarning::CycleDetected { root } => words.push(format!("CYCLE[{}]", root)),
        }
    }
    words.join(" ")
}

fn summary(counters: &Counters, roots: &RootSet, options: &RenderOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", options.paint("Summary:", |s| s.blue().bold()));

    let mut row = |label: String, value: usize| {
        let _ = writeln!(out, "  {:<28}{:>8}", label, value);
    };
    row("Entries compared:".to_string(), counters.entries_compared);
    row("Identical:".to_string(), counters.identical);
    row("Differing:".to_string(), counters.differences);
    for i in 0..roots.len() {
        row(format!("Total from [{}]:", i), counters.present_per_root.get(i).copied().unwrap_or(0));
    }
    for i in 0..roots.len() {
        row(format!("Missing from [{}]:", i), counters.missing_per_root.get(i).copied().unwrap_or(0));
    }
    for i in 0..roots.len() {
        row(format!("Filtered from [{}]:", i), counters.filtered_per_root.get(i).copied().unwrap_or(0));
    }
    row("Unreadable:".to_string(), counters.unreadable);
    row("Directories visited:".to_string(), counters.directories_visited);
    row("Cycles detected:".to_string(), counters.cycles_detected);
    row("Subtrees cancelled:".to_string(), counters.subtrees_cancelled);
    out
}

fn render_diff(result: &ReconciliationResult, roots: &RootSet, options: &RenderOptions) -> String {
    let line_options = options.line_diff();
    let mut out = String::new();

    for level in result.walk() {
        let dirs: Vec<PathBuf> = roots.iter().map(|r| level_dir(r, &level.relative_path)).collect();

        for entry in &level.entries {
            diff_entry(&mut out, entry, &dirs, &line_options, options);
        }
        for path in cancelled(level) {
            let _ = writeln!(out, "Not compared (cancelled): {}", path.display());
        }
    }
    out
}

fn level_dir(root: &Path, relative_path: &Path) -> PathBuf {
    if relative_path.as_os_str().is_empty() {
        root.to_path_buf()
    } else {
        root.join(relative_path)
    }
}

fn diff_entry(
    out: &mut String,
    entry: &UnionEntry,
    dirs: &[PathBuf],
    line_options: &LineDiffOptions,
    options: &RenderOptions,
) {
    let holders: Vec<usize> = entry
        .observations
        .iter()
        .enumerate()
        .filter(|(_, o)| o.is_present())
        .map(|(i, _)| i)
        .collect();

    if holders.len() == 1 && entry.missing_roots().len() + 1 == dirs.len() {
        let _ = writeln!(out, "Only in {}: {}", dirs[holders[0]].display(), entry.name);
    } else {
        for missing in entry.missing_roots() {
            let _ = writeln!(out, "Not in {}: {}", dirs[missing].display(), entry.name);
        }
    }

    for warning in &entry.warnings {
        match warning {
            EntryWarning::CycleDetected { root } => {
                let path = dirs[*root].join(entry.os_name());
                let _ = writeln!(out, "Cycle detected at {}: not entered", path.display());
            }
        }
    }

    let Some(reference) = entry.reference_root else {
        for (i, observation) in entry.observations.iter().enumerate() {
            if let Verdict::Unreadable(message) = &observation.verdict {
                let path = dirs[i].join(entry.os_name());
                let _ = writeln!(out, "Cannot compare {}: {}", path.display(), message);
            }
        }
        return;
    };
    let reference_path = dirs[reference].join(entry.os_name());
    let reference_kind = entry.observations[reference].kind;

    for (i, observation) in entry.observations.iter().enumerate() {
        let path = dirs[i].join(entry.os_name());
        match &observation.verdict {
            Verdict::Unreadable(message) => {
                let _ = writeln!(out, "Cannot compare {}: {}", path.display(), message);
            }
            Verdict::Different(reasons) if reasons.contains(&DiffReason::Kind) => {
                let _ = writeln!(
                    out,
                    "File {} is a {} while file {} is a {}",
                    reference_path.display(),
                    kind_phrase(reference_kind),
                    path.display(),
                    kind_phrase(observation.kind)
                );
            }
            Verdict::Different(_) if observation.kind == Some(EntryKind::Symlink) => {
                let _ = writeln!(
                    out,
                    "Symbolic links {} and {} differ",
                    reference_path.display(),
                    path.display()
                );
            }
            Verdict::Different(_) if observation.kind == Some(EntryKind::File) => {
                file_diff(out, &reference_path, &path, line_options, options);
            }
            Verdict::Different(_) => {
                let _ = writeln!(out, "{} and {} differ", reference_path.display(), path.display());
            }
            Verdict::Same | Verdict::Missing => {}
        }
    }
}

fn file_diff(
    out: &mut String,
    reference: &Path,
    other: &Path,
    line_options: &LineDiffOptions,
    options: &RenderOptions,
) {
    let from = reference.display().to_string();
    let to = other.display().to_string();

    match diff::diff_files(reference, other, line_options) {
        Ok(FileDiff::Binary) => {
            let _ = writeln!(out, "Binary files {} and {} differ", from, to);
        }
        Ok(FileDiff::Text(hunks)) if !hunks.is_empty() => {
            let _ = writeln!(out, "Files {} and {} differ", from, to);
            for line in diff::render_unified(&from, &to, &hunks).lines() {
                let styled = match line.chars().next() {
                    Some('+') if !line.starts_with("+++") => options.paint(line, |s| s.green()),
                    Some('-') if !line.starts_with("---") => options.paint(line, |s| s.red()),
                    Some('@') => options.paint(line, |s| s.cyan()),
                    _ => line.to_string(),
                };
                let _ = writeln!(out, "{}", styled);
            }
        }
        Ok(_) => {
            let _ = writeln!(out, "Files {} and {} differ", from, to);
        }
        Err(e) => {
            debug!("Cannot diff {} and {}: {}", from, to, e);
            let _ = writeln!(out, "Files {} and {} differ", from, to);
        }
    }
}

fn kind_phrase(kind: Option<EntryKind>) -> &'static str {
    match kind {
        Some(EntryKind::File) => "regular file",
        Some(EntryKind::Directory) => "directory",
        Some(EntryKind::Symlink) => "symbolic link",
        Some(EntryKind::Other) => "special file",
        None => "unreadable entry",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EqualityPolicy, ReconcileOptions};
    use crate::reconciler::reconcile;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, TempDir, RootSet) {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let when = FileTime::from_unix_time(1_600_000_000, 0);
        for (root, text) in [(a.path(), "one\ntwo\nthree\n"), (b.path(), "one\nTWO\nthree\n")] {
            fs::write(root.join("same.txt"), "same\n").unwrap();
            fs::write(root.join("changed.txt"), text).unwrap();
            set_file_mtime(root.join("same.txt"), when).unwrap();
            set_file_mtime(root.join("changed.txt"), when).unwrap();
        }
        fs::write(a.path().join("only_a.txt"), "a").unwrap();
        fs::write(a.path().join("blob.bin"), b"\x00\x01").unwrap();
        fs::write(b.path().join("blob.bin"), b"\x00\x02").unwrap();
        set_file_mtime(a.path().join("blob.bin"), when).unwrap();
        set_file_mtime(b.path().join("blob.bin"), when).unwrap();

        let roots = RootSet::new(vec![a.path().to_path_buf(), b.path().to_path_buf()]).unwrap();
        (a, b, roots)
    }

    fn content() -> ReconcileOptions {
        ReconcileOptions {
            equality: EqualityPolicy::Content,
            ..Default::default()
        }
    }

    #[test]
    fn test_table_markers_and_summary() {
        let (_a, _b, roots) = fixture();
        let result = reconcile(&roots, Path::new(""), &content()).unwrap();
        let text = render(&result, &roots, OutputFormat::Table, &RenderOptions::default()).unwrap();

        let same = text.lines().find(|l| l.contains("same.txt")).unwrap();
        assert!(same.starts_with(IDENTICAL_MARKER));
        let changed = text.lines().find(|l| l.contains("changed.txt")).unwrap();
        assert!(changed.starts_with(DIFFERENT_MARKER));
        assert!(changed.ends_with("CONTENT"));
        let only = text.lines().find(|l| l.contains("only_a.txt")).unwrap();
        assert!(only.contains("(NONE)"));

        assert!(text.contains("Summary:"));
        let differing = text.lines().find(|l| l.trim_start().starts_with("Differing:")).unwrap();
        assert!(differing.ends_with('3'));
    }

    #[test]
    fn test_table_custom_nil_and_no_color() {
        let (_a, _b, roots) = fixture();
        let result = reconcile(&roots, Path::new(""), &content()).unwrap();
        let options = RenderOptions {
            nil: "-".to_string(),
            ..Default::default()
        };
        let text = render(&result, &roots, OutputFormat::Table, &options).unwrap();
        assert!(!text.contains("(NONE)"));
        assert!(!text.contains('\u{1b}'));
    }

    #[test]
    fn test_json_round_trips_through_value() {
        let (_a, _b, roots) = fixture();
        let result = reconcile(&roots, Path::new(""), &content()).unwrap();
        let text = render(&result, &roots, OutputFormat::Json, &RenderOptions::default()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["exit_code"], 1);
        assert_eq!(value["roots"].as_array().unwrap().len(), 2);
        assert_eq!(value["result"]["counters"]["differences"], 3);
    }

    #[test]
    fn test_diff_format() {
        let (_a, _b, roots) = fixture();
        let result = reconcile(&roots, Path::new(""), &content()).unwrap();
        let text = render(&result, &roots, OutputFormat::Diff, &RenderOptions::default()).unwrap();

        assert!(text.contains(&format!("Only in {}: only_a.txt", roots.get(0).unwrap().display())));
        assert!(text.contains("Binary files"));
        assert!(text.contains("-two"));
        assert!(text.contains("+TWO"));
        assert!(text.contains("@@ -1,3 +1,3 @@"));
        assert!(!text.contains("same.txt"));
    }
}
