//! Error types for treecmp
//!
//! Only two kinds of failure abort a comparison: bad configuration and an
//! unusable top-level root. Everything that goes wrong below the roots
//! (an unreadable file, a permission-denied subdirectory, a symlink loop)
//! is recorded in the result tree instead, so the variants here are mostly
//! what the CLI turns into exit code 2.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the treecmp library
pub type Result<T> = std::result::Result<T, CompareError>;

/// Main error type for all treecmp operations
#[derive(Debug, Error)]
pub enum CompareError {
    /// Invalid options: fewer than two roots, a pattern that does not compile
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A top-level root is missing or is not a directory
    #[error("Invalid root {path:?}: {reason}")]
    InvalidRoot {
        /// The offending root as supplied
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// An existing path could not be read
    #[error("Cannot read {path:?}: {source}")]
    Access {
        /// Path that could not be read
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// I/O errors outside of directory listing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors during JSON serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl From<regex::Error> for CompareError {
    fn from(err: regex::Error) -> Self {
        CompareError::Configuration(format!("invalid pattern: {}", err))
    }
}

impl From<rayon::ThreadPoolBuildError> for CompareError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        CompareError::ThreadPool(err.to_string())
    }
}

impl CompareError {
    /// Create a configuration error with a custom message
    pub fn configuration(msg: impl Into<String>) -> Self {
        CompareError::Configuration(msg.into())
    }

    /// Create an invalid-root error
    pub fn invalid_root(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CompareError::InvalidRoot {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error raised while reading `path`
    pub fn access(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompareError::Access {
            path: path.into(),
            source,
        }
    }

    /// Exit code the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            CompareError::InvalidRoot { path, reason } => {
                format!(
                    "{:?} cannot be compared: {}. Every ROOT argument must be an existing directory.",
                    path, reason
                )
            }
            CompareError::Configuration(msg) if msg.contains("pattern") => {
                format!(
                    "{}. Patterns use Rust regex syntax and are matched against entry names, not paths.",
                    msg
                )
            }
            CompareError::Access { path, .. } => {
                format!(
                    "Permission denied for {:?}. Check file permissions or run with appropriate privileges.",
                    path
                )
            }
            _ => self.to_string(),
        }
    }
}
