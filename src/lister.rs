//! Directory listing
//!
//! The reconciler never touches the filesystem directly for listings; it asks
//! a [`DirectoryLister`] for one level at a time. [`FsLister`] is the real
//! implementation and walks a single directory level with `walkdir`.
//!
//! ## Contract
//!
//! - A path that does not exist (or is not a directory) under a root yields an
//!   empty snapshot in the [`SnapshotState::Absent`] state, not an error.
//! - An existing directory that cannot be read yields
//!   [`CompareError::Access`].
//! - An entry whose metadata cannot be read is still listed, with
//!   [`Entry::error`] set, so the reconciler can report it as unreadable.

use crate::error::{CompareError, Result};
use crate::types::{DirectorySnapshot, Entry, EntryKind, FileId, SnapshotState};
use crate::utils;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// Source of per-directory snapshots
pub trait DirectoryLister: Send + Sync + std::fmt::Debug {
    /// Check that `root` is an existing directory and return its identity
    ///
    /// # Errors
    ///
    /// - [`CompareError::InvalidRoot`] if the root is missing or not a directory
    fn check_root(&self, root: &Path) -> Result<FileId>;

    /// Identity of the directory at `root/relative_path`, if there is one
    fn directory_id(&self, root: &Path, relative_path: &Path) -> Option<FileId>;

    /// List the entries directly inside `root/relative_path`
    ///
    /// # Errors
    ///
    /// - [`CompareError::Access`] if the directory exists but cannot be read
    fn list(&self, root: &Path, relative_path: &Path, follow_symlinks: bool)
        -> Result<DirectorySnapshot>;
}

/// Lister backed by the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FsLister;

impl FsLister {
    /// Create a filesystem lister
    pub fn new() -> Self {
        Self
    }
}

impl DirectoryLister for FsLister {
    fn check_root(&self, root: &Path) -> Result<FileId> {
        let metadata = match fs::metadata(root) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CompareError::invalid_root(root, "does not exist"));
            }
            Err(e) => return Err(CompareError::invalid_root(root, e.to_string())),
        };

        if !metadata.is_dir() {
            return Err(CompareError::invalid_root(root, "not a directory"));
        }

        Ok(utils::file_id(root, &metadata))
    }

    fn directory_id(&self, root: &Path, relative_path: &Path) -> Option<FileId> {
        let dir = root.join(relative_path);
        let metadata = fs::metadata(&dir).ok()?;
        metadata.is_dir().then(|| utils::file_id(&dir, &metadata))
    }

    fn list(
        &self,
        root: &Path,
        relative_path: &Path,
        follow_symlinks: bool,
    ) -> Result<DirectorySnapshot> {
        let dir = root.join(relative_path);

        match fs::metadata(&dir) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                trace!("{:?} is not a directory, treating as absent", dir);
                return Ok(DirectorySnapshot::absent(dir));
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                trace!("{:?} does not exist, treating as absent", dir);
                return Ok(DirectorySnapshot::absent(dir));
            }
            Err(e) => return Err(CompareError::access(dir, e)),
        }

        let mut entries = BTreeMap::new();
        let walker = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false);

        for item in walker {
            match item {
                Ok(dir_entry) => {
                    let name = dir_entry.file_name().to_os_string();
                    let entry = read_entry(name.clone(), dir_entry.path(), follow_symlinks);
                    entries.insert(name, entry);
                }
                Err(e) if e.depth() == 0 => {
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed"));
                    return Err(CompareError::access(dir, source));
                }
                Err(e) => {
                    // The entry exists but could not be stat'ed; keep it as unreadable.
                    warn!("Walk error under {:?}: {}", dir, e);
                    if let Some(path) = e.path() {
                        if let Some(name) = path.file_name() {
                            entries.insert(
                                name.to_os_string(),
                                Entry::unreadable(name, path, e.to_string()),
                            );
                        }
                    }
                }
            }
        }

        debug!("Listed {} entries in {:?}", entries.len(), dir);
        Ok(DirectorySnapshot {
            dir,
            state: SnapshotState::Listed,
            entries,
        })
    }
}

/// Build an [`Entry`] from the object at `path`
///
/// With `follow_symlinks`, a link is described by its target; a dangling link
/// falls back to the link itself.
fn read_entry(name: std::ffi::OsString, path: &Path, follow_symlinks: bool) -> Entry {
    let metadata = if follow_symlinks {
        fs::metadata(path).or_else(|_| fs::symlink_metadata(path))
    } else {
        fs::symlink_metadata(path)
    };

    let metadata = match metadata {
        Ok(metadata) => metadata,
        Err(e) => return Entry::unreadable(name, path, e.to_string()),
    };

    let file_type = metadata.file_type();
    let kind = if file_type.is_dir() {
        EntryKind::Directory
    } else if file_type.is_file() {
        EntryKind::File
    } else if file_type.is_symlink() {
        EntryKind::Symlink
    } else {
        EntryKind::Other
    };

    let mut entry = Entry::new(name, path, kind).with_permissions(utils::get_permissions(&metadata));
    if kind == EntryKind::File {
        entry.size = metadata.len();
    }
    entry.modified = metadata.modified().ok().map(utils::to_utc);
    if kind == EntryKind::Symlink {
        entry.link_target = fs::read_link(path).ok();
    }
    if kind == EntryKind::Directory {
        entry.file_id = Some(utils::file_id(path, &metadata));
    }
    entry
}
