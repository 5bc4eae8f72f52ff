//! Symlink-aware include directory walker
//!
//! Expands include paths into workspace-relative file paths. Symlinks are
//! followed transparently: contents are read from the physical target, but
//! every produced path is named after the alias (link) path, so workers see
//! the same layout the compiler sees locally.
//!
//! Traversal is depth-first in directory-listing order (entries sorted by
//! name). Each directory is a frame on an explicit stack holding its
//! remaining entries, which keeps the pre-order of a recursive walk without
//! recursion.

use crate::error::{ResolutionError, ResolutionResult};
use indexmap::IndexSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Ordered, deduplicated set of workspace-relative paths (first seen wins)
pub type FileSet = IndexSet<String>;

/// Resolve a symlink to its physical target
///
/// Returns `Ok(Some(path))` unchanged when `path` is not a symlink, and the
/// fully resolved target when it is. A link whose target cannot be resolved
/// or does not exist yields `Ok(None)`: dangling links are not errors.
/// Failing to stat or read `path` itself is an error.
pub fn resolve_symlink(path: &Path) -> io::Result<Option<PathBuf>> {
    let meta = fs::symlink_metadata(path)?;
    if !meta.file_type().is_symlink() {
        return Ok(Some(path.to_path_buf()));
    }

    let target = fs::read_link(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    // canonicalize follows every link in the chain and fails if the end
    // does not exist
    match fs::canonicalize(base.join(target)) {
        Ok(resolved) => Ok(Some(resolved)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping dangling symlink");
            Ok(None)
        }
    }
}

/// Lexically normalize a path (drop `.`, fold `..` into its parent)
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn stat_error(path: &Path, source: io::Error) -> ResolutionError {
    if source.kind() == io::ErrorKind::NotFound {
        ResolutionError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        ResolutionError::Stat {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A directory being listed
struct Frame {
    /// Where the entries are actually read from
    physical: PathBuf,
    /// Name under which the entries are reported
    alias: PathBuf,
    /// Entry names not yet visited, in listing order
    pending: std::vec::IntoIter<OsString>,
}

/// Walker bound to a workspace root
#[derive(Debug, Clone)]
pub struct SymlinkWalker {
    root: PathBuf,
}

impl SymlinkWalker {
    /// Create a walker that reports paths relative to `root`
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: normalize(root.as_ref()),
        }
    }

    /// The normalized workspace root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Expand one include path (relative to the workspace root) into `files`
    ///
    /// A missing include path is a hard error. An include that is itself a
    /// dangling symlink is skipped.
    pub fn expand_include(&self, include: &str, files: &mut FileSet) -> ResolutionResult<()> {
        let alias = normalize(&self.root.join(include));

        let resolved = resolve_symlink(&alias).map_err(|e| stat_error(&alias, e))?;
        let Some(physical) = resolved else {
            return Ok(());
        };

        let meta = fs::metadata(&physical).map_err(|e| stat_error(&physical, e))?;
        if meta.is_dir() {
            self.enumerate(&physical, &alias, files)
        } else {
            self.add(&alias, files)
        }
    }

    /// Recursively list `physical`, naming every entry under `alias`
    ///
    /// New relative paths are appended to `files`; paths already present
    /// are left where they are.
    pub fn enumerate(&self, physical: &Path, alias: &Path, files: &mut FileSet) -> ResolutionResult<()> {
        let mut stack = vec![self.open_frame(physical, alias)?];

        while let Some(frame) = stack.last_mut() {
            let Some(name) = frame.pending.next() else {
                stack.pop();
                continue;
            };

            let entry_path = frame.physical.join(&name);
            let alias_path = frame.alias.join(&name);

            let resolved = resolve_symlink(&entry_path).map_err(|e| stat_error(&entry_path, e))?;
            let Some(target) = resolved else {
                continue;
            };

            let meta = fs::metadata(&target).map_err(|e| stat_error(&target, e))?;
            if !meta.is_dir() {
                self.add(&alias_path, files)?;
                continue;
            }

            // A link back into a directory that is still open would never end
            if stack.iter().any(|open| same_dir(&open.physical, &target)) {
                warn!(
                    path = %alias_path.display(),
                    target = %target.display(),
                    "Skipping symlink cycle"
                );
                continue;
            }

            let child = self.open_frame(&target, &alias_path)?;
            stack.push(child);
        }

        Ok(())
    }

    fn open_frame(&self, physical: &Path, alias: &Path) -> ResolutionResult<Frame> {
        let read_dir = fs::read_dir(physical).map_err(|source| ResolutionError::ReadDir {
            path: physical.to_path_buf(),
            source,
        })?;

        let mut names = read_dir
            .map(|entry| entry.map(|e| e.file_name()))
            .collect::<io::Result<Vec<_>>>()
            .map_err(|source| ResolutionError::ReadDir {
                path: physical.to_path_buf(),
                source,
            })?;
        names.sort();

        Ok(Frame {
            physical: physical.to_path_buf(),
            alias: alias.to_path_buf(),
            pending: names.into_iter(),
        })
    }

    fn add(&self, alias: &Path, files: &mut FileSet) -> ResolutionResult<()> {
        let relative = self.relative(alias)?;
        if !relative.is_empty() {
            files.insert(relative);
        }
        Ok(())
    }

    /// Express an alias path relative to the workspace root
    fn relative(&self, alias: &Path) -> ResolutionResult<String> {
        let rel = alias
            .strip_prefix(&self.root)
            .map_err(|_| ResolutionError::OutsideWorkspace {
                path: alias.to_path_buf(),
                root: self.root.clone(),
            })?;
        rel.to_str()
            .map(str::to_string)
            .ok_or_else(|| ResolutionError::NonUtf8Path {
                path: alias.to_path_buf(),
            })
    }
}

/// Compare two directories by identity, falling back to path equality
fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
