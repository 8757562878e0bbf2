//! Utility functions for treecmp
//!
//! File hashing, cross-platform metadata extraction and byte formatting.
//! All functions are thread-safe and are called from rayon workers.

use crate::error::Result;
use crate::types::FileId;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::time::SystemTime;
use tracing::trace;

/// Hash a file's content using SHA-256
///
/// Reads the file in 8KB chunks so memory use does not grow with file size.
///
/// # Returns
///
/// Returns the SHA-256 hash as a 64-character hexadecimal string.
///
/// # Errors
///
/// - [`CompareError::Io`](crate::CompareError::Io) if the file cannot be opened or read
pub fn hash_file_content(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    trace!("Hashed {:?}", path);
    Ok(hex::encode(hasher.finalize()))
}

/// Convert a filesystem timestamp to UTC
pub fn to_utc(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
}

/// Get Unix permissions from metadata
#[cfg(unix)]
pub fn get_permissions(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

/// Get permissions from metadata (Windows implementation)
///
/// Maps the read-only attribute to Unix-like bits so permission
/// comparison still means something across roots.
#[cfg(windows)]
pub fn get_permissions(metadata: &fs::Metadata) -> u32 {
    let mut mode = if metadata.permissions().readonly() { 0o444 } else { 0o644 };
    if metadata.is_dir() {
        mode |= 0o111;
    }
    mode
}

/// Identity of the object at `path`, following symlinks
#[cfg(unix)]
pub fn file_id(_path: &Path, metadata: &fs::Metadata) -> FileId {
    use std::os::unix::fs::MetadataExt;
    FileId::Inode {
        device: metadata.dev(),
        inode: metadata.ino(),
    }
}

/// Identity of the object at `path`, following symlinks
#[cfg(not(unix))]
pub fn file_id(path: &Path, _metadata: &fs::Metadata) -> FileId {
    FileId::Canonical(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()))
}

/// Format bytes in human-readable form
///
/// Uses binary units (1024-based).
///
/// ```rust,ignore
/// assert_eq!(format_bytes(1536), "1.50 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", size as u64, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Check if content appears to be binary (NUL byte in the first 8KB)
pub fn is_binary_content(content: &[u8]) -> bool {
    let check_len = content.len().min(8192);
    content[..check_len].contains(&0)
}
