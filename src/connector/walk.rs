//! Recursive remote-tree listing.
//!
//! Protocols that can only list one directory at a time implement
//! [`DirectoryLister`]; [`walk_tree`] turns that into a full recursive file
//! listing. The walk never leaves the base directory and never visits the same
//! directory twice, so symlink loops and servers that echo `.`/`..` terminate.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::download::{clean_remote_path, is_within_base, join_remote_path};

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory to descend into.
    Directory,
    /// Anything else (symlink, device...). Skipped.
    Other,
}

/// One entry of a single-directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Entry name as reported by the server (usually a bare name).
    pub name: String,
    /// What the entry is.
    pub kind: EntryKind,
}

impl RemoteEntry {
    /// Creates a file entry.
    #[must_use]
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    /// Creates a directory entry.
    #[must_use]
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
        }
    }
}

/// Lists a single remote directory.
pub trait DirectoryLister {
    /// Error produced by a failed listing.
    type Error;

    /// Returns the immediate entries of `path`.
    fn list_directory(&mut self, path: &str) -> Result<Vec<RemoteEntry>, Self::Error>;
}

/// Recursively collects every regular file beneath `base`, depth first.
///
/// Paths are cleaned before they are followed or recorded. Entries that
/// resolve outside `base` are dropped, and each directory is listed at most
/// once. Files appear in the order the server listed them, with each
/// subdirectory's files inserted where the subdirectory was listed.
///
/// # Errors
///
/// Returns the first error reported by `lister`; no partial result is kept.
pub fn walk_tree<L>(lister: &mut L, base: &str) -> Result<Vec<String>, L::Error>
where
    L: DirectoryLister + ?Sized,
{
    let base = clean_remote_path(base);
    let mut walk = Walk {
        base: &base,
        visited: HashSet::new(),
        recorded: HashSet::new(),
        files: Vec::new(),
    };
    walk.directory(lister, base.clone())?;
    Ok(walk.files)
}

struct Walk<'a> {
    base: &'a str,
    visited: HashSet<String>,
    recorded: HashSet<String>,
    files: Vec<String>,
}

impl Walk<'_> {
    fn directory<L>(&mut self, lister: &mut L, directory: String) -> Result<(), L::Error>
    where
        L: DirectoryLister + ?Sized,
    {
        if !self.visited.insert(directory.clone()) {
            debug!(directory = %directory, "directory already visited; skipping");
            return Ok(());
        }

        for entry in lister.list_directory(&directory)? {
            if entry.name.is_empty() || entry.name == "." || entry.name == ".." {
                continue;
            }
            let path = join_remote_path(&directory, &entry.name);
            if !is_within_base(&path, self.base) {
                debug!(entry = %entry.name, path = %path, base = %self.base, "skipping entry outside base");
                continue;
            }
            match entry.kind {
                EntryKind::File => {
                    if self.recorded.insert(path.clone()) {
                        self.files.push(path);
                    }
                }
                EntryKind::Directory => self.directory(lister, path)?,
                EntryKind::Other => trace!(path = %path, "skipping non-regular entry"),
            }
        }
        Ok(())
    }
}

/// Keeps the lines of a `find`-style listing that name paths inside `base`.
///
/// Each non-empty line is cleaned; duplicates and paths outside `base` are
/// dropped.
#[must_use]
pub fn filter_within_base<'a, I>(lines: I, base: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let base = clean_remote_path(base);
    let mut seen = HashSet::new();
    let mut files = Vec::new();
    for line in lines {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let path = clean_remote_path(line);
        if !is_within_base(&path, &base) {
            debug!(path = %path, base = %base, "skipping listed path outside base");
            continue;
        }
        if seen.insert(path.clone()) {
            files.push(path);
        }
    }
    files
}
