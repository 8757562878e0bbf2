//! # compare-trees - Compare two or more directory trees
//!
//! Command-line front end for the treecmp library.
//!
//! ## Features
//! - Compare any number of roots at once against a reference copy
//! - Existence, size/time or content equality
//! - Regex include/exclude filters; hidden names skipped unless asked for, backup and generated names optionally skipped
//! - Table, JSON or `diff -r` style output with line hunks
//!
//! ## Usage
//! ```bash
//! # Quick size/time comparison
//! compare-trees ./left ./right
//!
//! # Byte-exact comparison of three trees, only showing differences
//! compare-trees --equality content --only-diffs a b c
//!
//! # Unified hunks for changed text files
//! compare-trees --format diff --context 5 old/ new/
//! ```
//!
//! ## Exit status
//! - 0: no differences
//! - 1: differences found
//! - 2: invalid arguments or roots, or parts of the trees could not be compared

use clap::{Parser, ValueEnum};
use colored::*;
use humantime::format_duration;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;
use treecmp::{
    render, CancellationToken, EqualityPolicy, OutputFormat, ReconcileOptions, ReconcilerBuilder,
    RenderOptions, Result, RootSet,
};

/// compare-trees - multi-way directory comparison
#[derive(Parser)]
#[command(name = "compare-trees")]
#[command(version)]
#[command(about = "Compare two or more directory trees and report what differs")]
#[command(long_about = None)]
struct Cli {
    /// Directories to compare; the first is the default reference
    #[arg(required = true, num_args = 2.., value_name = "ROOT")]
    roots: Vec<PathBuf>,

    /// Only compare this subdirectory of every root
    #[arg(long, value_name = "PATH")]
    start: Option<PathBuf>,

    /// Only consider names matching this regex (repeatable)
    #[arg(short, long, value_name = "REGEX")]
    include: Vec<String>,

    /// Skip names matching this regex (repeatable)
    #[arg(short = 'x', long, value_name = "REGEX")]
    exclude: Vec<String>,

    /// Include dot-prefixed names
    #[arg(long)]
    hidden: bool,

    /// Skip backup copies (foo~, #foo#, *.bak, "Copy of foo")
    #[arg(long)]
    skip_backups: bool,

    /// Skip generated files (*.pyc, *.o, .DS_Store)
    #[arg(long)]
    skip_generated: bool,

    /// Include hidden, backup and generated names
    #[arg(short, long, conflicts_with_all = ["skip_backups", "skip_generated"])]
    all: bool,

    /// How same-named files are compared
    #[arg(short, long, value_enum, default_value = "size-time")]
    equality: EqualityMode,

    /// Also compare permission bits
    #[arg(short, long)]
    permissions: bool,

    /// Only report names that are not identical everywhere
    #[arg(long)]
    only_diffs: bool,

    /// Order names ignoring case
    #[arg(long)]
    case_insensitive: bool,

    /// Follow symbolic links
    #[arg(short = 'L', long)]
    follow_symlinks: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    format: FormatMode,

    /// Context lines around diff hunks
    #[arg(long, default_value = "3")]
    context: usize,

    /// Ignore leading and trailing whitespace when printing hunks
    #[arg(long)]
    ignore_whitespace: bool,

    /// Text shown for a root that lacks a name
    #[arg(long, default_value = "(NONE)")]
    nil: String,

    /// Width of the name column
    #[arg(long, default_value = "32")]
    name_width: usize,

    /// Worker threads (defaults to CPU count)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Stop descending after this long, e.g. "30s" or "5m"
    #[arg(long, value_parser = humantime::parse_duration)]
    timeout: Option<Duration>,

    /// Show a progress spinner
    #[arg(long)]
    progress: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum EqualityMode {
    Existence,
    SizeTime,
    Content,
}

impl From<EqualityMode> for EqualityPolicy {
    fn from(mode: EqualityMode) -> Self {
        match mode {
            EqualityMode::Existence => EqualityPolicy::Existence,
            EqualityMode::SizeTime => EqualityPolicy::SizeAndTime,
            EqualityMode::Content => EqualityPolicy::Content,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum FormatMode {
    Table,
    Json,
    Diff,
}

impl From<FormatMode> for OutputFormat {
    fn from(mode: FormatMode) -> Self {
        match mode {
            FormatMode::Table => OutputFormat::Table,
            FormatMode::Json => OutputFormat::Json,
            FormatMode::Diff => OutputFormat::Diff,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Set up logging
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Disable colors if needed
    if cli.no_color || std::env::var_os("NO_COLOR").is_some() {
        colored::control::set_override(false);
    }

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e.user_message());
            std::process::exit(e.exit_code());
        }
    }
}

/// Run the comparison and print the report, returning the exit code
fn run(cli: Cli) -> Result<i32> {
    let roots = RootSet::new(cli.roots)?;

    let mut options = ReconcileOptions {
        include_patterns: cli.include,
        exclude_patterns: cli.exclude,
        include_hidden: cli.hidden,
        include_backups: !cli.skip_backups,
        include_generated: !cli.skip_generated,
        equality: cli.equality.into(),
        compare_permissions: cli.permissions,
        case_insensitive_order: cli.case_insensitive,
        only_show_differences: cli.only_diffs,
        follow_symlinks: cli.follow_symlinks,
    };
    if cli.all {
        options = options.include_all();
    }

    let cancellation = match cli.timeout {
        Some(timeout) => CancellationToken::with_timeout(timeout),
        None => CancellationToken::new(),
    };

    let mut builder = ReconcilerBuilder::new().cancellation(cancellation);
    if let Some(jobs) = cli.jobs {
        builder = builder.parallel_workers(jobs);
    }

    let spinner = if cli.progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message("Listing roots...");
        let handle = pb.clone();
        builder = builder.progress(move |p| {
            handle.set_message(format!(
                "{} directories, {} entries ({})",
                p.directories_visited,
                p.entries_compared,
                p.relative_path.display()
            ));
        });
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();
    let start_path = cli.start.unwrap_or_default();
    info!(
        "Comparing {} roots from {:?} with {} equality",
        roots.len(),
        start_path,
        options.equality.as_str()
    );
    let result = builder.build().reconcile(&roots, &start_path, &options);

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let result = result?;
    info!("Finished in {}", format_duration(start.elapsed()));

    let render_options = RenderOptions {
        color: !cli.no_color
            && std::env::var_os("NO_COLOR").is_none()
            && std::io::stdout().is_terminal(),
        context_lines: cli.context,
        ignore_whitespace: cli.ignore_whitespace,
        nil: cli.nil,
        name_width: cli.name_width,
    };
    print!("{}", render(&result, &roots, cli.format.into(), &render_options)?);

    Ok(result.exit_code())
}
