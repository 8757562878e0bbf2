//! Line-level diff for text files that differ between two roots
//!
//! Used by the `diff` report format to show what changed inside a file, in
//! the unified format `diff -u` prints. The algorithm is a longest common
//! subsequence over lines, followed by grouping changed lines into hunks
//! with a configurable amount of surrounding context.
//!
//! Lines shared at the start and end of both files are matched directly.
//! The LCS table only covers the middle, and when that table would exceed
//! `max_table_cells` no hunks are produced.
//!
//! Verdicts never depend on this module. `ignore_whitespace` only changes
//! which lines are paired up when a hunk is printed.
//!
//! ## Examples
//!
//! ```rust
//! use treecmp::diff::{line_diff, LineDiffOptions, LineChange};
//!
//! let old = b"alpha\nbeta\ngamma\n";
//! let new = b"alpha\nBETA\ngamma\n";
//!
//! let hunks = line_diff(old, new, &LineDiffOptions::default()).unwrap();
//! assert_eq!(hunks.len(), 1);
//! assert!(hunks[0].changes.contains(&LineChange::Removed("beta".to_string())));
//! assert!(hunks[0].changes.contains(&LineChange::Added("BETA".to_string())));
//! ```

use crate::error::Result;
use crate::utils;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, trace};

/// Options for computing and printing line diffs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDiffOptions {
    /// Unchanged lines shown around each change
    pub context_lines: usize,
    /// Pair lines that differ only in leading or trailing whitespace
    pub ignore_whitespace: bool,
    /// Files larger than this are reported without hunks
    pub max_file_size: u64,
    /// Largest LCS table (old lines x new lines, after trimming shared
    /// leading and trailing lines) computed before giving up on hunks
    pub max_table_cells: usize,
}

impl Default for LineDiffOptions {
    fn default() -> Self {
        Self {
            context_lines: 3,
            ignore_whitespace: false,
            max_file_size: 4 * 1024 * 1024,
            max_table_cells: 10_000_000,
        }
    }
}

/// One line of a hunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineChange {
    /// Present on both sides
    Context(String),
    /// Only in the reference file
    Removed(String),
    /// Only in the compared file
    Added(String),
}

impl LineChange {
    /// Unified diff prefix character
    pub fn prefix(&self) -> char {
        match self {
            LineChange::Context(_) => ' ',
            LineChange::Removed(_) => '-',
            LineChange::Added(_) => '+',
        }
    }

    /// Line text without the prefix
    pub fn text(&self) -> &str {
        match self {
            LineChange::Context(t) | LineChange::Removed(t) | LineChange::Added(t) => t,
        }
    }
}

/// Contiguous group of changes with context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    /// First line in the reference file (1-based, 0 when the range is empty)
    pub from_line: usize,
    /// Lines from the reference file covered by this hunk
    pub from_count: usize,
    /// First line in the compared file (1-based, 0 when the range is empty)
    pub to_line: usize,
    /// Lines from the compared file covered by this hunk
    pub to_count: usize,
    /// Lines in display order
    pub changes: Vec<LineChange>,
}

impl DiffHunk {
    /// `@@ -a,b +c,d @@` header line
    pub fn header(&self) -> String {
        format!(
            "@@ -{},{} +{},{} @@",
            self.from_line, self.from_count, self.to_line, self.to_count
        )
    }
}

/// What a pair of files looks like when diffed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileDiff {
    /// Text files with line hunks (possibly empty if only whitespace moved)
    Text(Vec<DiffHunk>),
    /// At least one side looks binary
    Binary,
    /// At least one side exceeds `max_file_size`, or the line diff exceeds
    /// `max_table_cells`
    TooLarge,
}

/// Diff two files on disk
///
/// # Errors
///
/// - [`CompareError::Io`](crate::CompareError::Io) if either file cannot be read
pub fn diff_files(reference: &Path, other: &Path, options: &LineDiffOptions) -> Result<FileDiff> {
    let old = read_limited(reference, options.max_file_size)?;
    let new = read_limited(other, options.max_file_size)?;

    let (old, new) = match (old, new) {
        (Some(old), Some(new)) => (old, new),
        _ => return Ok(FileDiff::TooLarge),
    };

    if utils::is_binary_content(&old) || utils::is_binary_content(&new) {
        return Ok(FileDiff::Binary);
    }

    Ok(match line_diff(&old, &new, options) {
        Some(hunks) => FileDiff::Text(hunks),
        None => FileDiff::TooLarge,
    })
}

fn read_limited(path: &Path, limit: u64) -> Result<Option<Vec<u8>>> {
    let file = File::open(path)?;
    if file.metadata()?.len() > limit {
        return Ok(None);
    }
    let mut bytes = Vec::new();
    file.take(limit + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > limit {
        return Ok(None);
    }
    Ok(Some(bytes))
}

/// Compute unified hunks between two text contents
///
/// Invalid UTF-8 is replaced lossily. Returns `None` when the differing
/// middle of the two files needs more than `max_table_cells` table cells.
pub fn line_diff(old: &[u8], new: &[u8], options: &LineDiffOptions) -> Option<Vec<DiffHunk>> {
    let old_text = String::from_utf8_lossy(old);
    let new_text = String::from_utf8_lossy(new);
    let old_lines: Vec<&str> = old_text.lines().collect();
    let new_lines: Vec<&str> = new_text.lines().collect();

    let ops = edit_script(
        &old_lines,
        &new_lines,
        options.ignore_whitespace,
        options.max_table_cells,
    )?;
    let hunks = group_hunks(&ops, &old_lines, &new_lines, options.context_lines);
    trace!("{} hunks from {} edit operations", hunks.len(), ops.len());
    Some(hunks)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Keep(usize, usize),
    /// Old line index, new position
    Remove(usize, usize),
    /// Old position, new line index
    Insert(usize, usize),
}

impl Op {
    fn is_change(&self) -> bool {
        !matches!(self, Op::Keep(..))
    }
}

fn same_line(a: &str, b: &str, ignore_whitespace: bool) -> bool {
    if ignore_whitespace {
        a.trim() == b.trim()
    } else {
        a == b
    }
}

/// LCS table walk producing keep/remove/insert operations in order
fn edit_script(
    old: &[&str],
    new: &[&str],
    ignore_whitespace: bool,
    max_cells: usize,
) -> Option<Vec<Op>> {
    let prefix = old
        .iter()
        .zip(new)
        .take_while(|(a, b)| same_line(a, b, ignore_whitespace))
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| same_line(a, b, ignore_whitespace))
        .count();
    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];
    let (m, n) = (old_mid.len(), new_mid.len());

    let cells = (m + 1).saturating_mul(n + 1);
    if cells > max_cells {
        debug!("Line diff of {}x{} lines exceeds {} cells", m, n, max_cells);
        return None;
    }

    // lcs[i * width + j] = LCS length of old_mid[i..] and new_mid[j..]
    let width = n + 1;
    let mut lcs = vec![0u32; cells];
    for i in (0..m).rev() {
        for j in (0..n).rev() {
            lcs[i * width + j] = if same_line(old_mid[i], new_mid[j], ignore_whitespace) {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(old.len() + new.len());
    ops.extend((0..prefix).map(|k| Op::Keep(k, k)));
    let (mut i, mut j) = (0, 0);
    while i < m && j < n {
        if same_line(old_mid[i], new_mid[j], ignore_whitespace) {
            ops.push(Op::Keep(prefix + i, prefix + j));
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            ops.push(Op::Remove(prefix + i, prefix + j));
            i += 1;
        } else {
            ops.push(Op::Insert(prefix + i, prefix + j));
            j += 1;
        }
    }
    ops.extend((i..m).map(|o| Op::Remove(prefix + o, prefix + n)));
    ops.extend((j..n).map(|k| Op::Insert(prefix + m, prefix + k)));
    let (old_tail, new_tail) = (old.len() - suffix, new.len() - suffix);
    ops.extend((0..suffix).map(|k| Op::Keep(old_tail + k, new_tail + k)));
    Some(ops)
}

/// Split the edit script into hunks, merging changes closer than twice the context
fn group_hunks(ops: &[Op], old: &[&str], new: &[&str], context: usize) -> Vec<DiffHunk> {
    let changed: Vec<usize> = ops
        .iter()
        .enumerate()
        .filter(|(_, op)| op.is_change())
        .map(|(i, _)| i)
        .collect();

    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for &at in &changed {
        let start = at.saturating_sub(context);
        let end = (at + context + 1).min(ops.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = end,
            _ => ranges.push((start, end)),
        }
    }

    ranges
        .into_iter()
        .map(|(start, end)| build_hunk(&ops[start..end], old, new))
        .collect()
}

fn build_hunk(ops: &[Op], old: &[&str], new: &[&str]) -> DiffHunk {
    let mut hunk = DiffHunk {
        from_line: 0,
        from_count: 0,
        to_line: 0,
        to_count: 0,
        changes: Vec::with_capacity(ops.len()),
    };

    // An empty side starts at the line before the hunk, 0 at file start.
    let (old_pos, new_pos) = match ops.first() {
        Some(Op::Keep(o, n)) | Some(Op::Remove(o, n)) | Some(Op::Insert(o, n)) => (*o, *n),
        None => (0, 0),
    };

    for op in ops {
        match *op {
            Op::Keep(o, _) => {
                hunk.from_count += 1;
                hunk.to_count += 1;
                hunk.changes.push(LineChange::Context(old[o].to_string()));
            }
            Op::Remove(o, _) => {
                hunk.from_count += 1;
                hunk.changes.push(LineChange::Removed(old[o].to_string()));
            }
            Op::Insert(_, n) => {
                hunk.to_count += 1;
                hunk.changes.push(LineChange::Added(new[n].to_string()));
            }
        }
    }

    hunk.from_line = if hunk.from_count == 0 { old_pos } else { old_pos + 1 };
    hunk.to_line = if hunk.to_count == 0 { new_pos } else { new_pos + 1 };
    hunk
}

/// Render hunks in unified format below a `---`/`+++` header
pub fn render_unified(from_label: &str, to_label: &str, hunks: &[DiffHunk]) -> String {
    let mut out = format!("--- {}\n+++ {}\n", from_label, to_label);
    for hunk in hunks {
        out.push_str(&hunk.header());
        out.push('\n');
        for change in &hunk.changes {
            out.push(change.prefix());
            out.push_str(change.text());
            out.push('\n');
        }
    }
    out
}
