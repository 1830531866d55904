//! Shared save routine used by every connector.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::DownloadError;
use super::path::resolve_local_path;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Result of a completed save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    /// Absolute local path that was written.
    pub path: PathBuf,
    /// Number of bytes written.
    pub bytes: u64,
}

/// Writes a remote file's byte stream into the job's target directory.
///
/// Resolves the destination with [`resolve_local_path`], creates missing
/// parent directories, creates or truncates the destination and copies
/// `reader` to completion. Writing the same stream twice leaves exactly one
/// copy of the bytes on disk.
///
/// # Errors
///
/// - [`DownloadError::OutsideTarget`] if the path cannot be placed under `target_dir`
/// - [`DownloadError::Io`] for directory/file creation or write failures
/// - [`DownloadError::Stream`] if reading `reader` fails
pub fn save_remote_file(
    remote_path: &str,
    target_dir: &Path,
    base_path: &str,
    reader: &mut dyn Read,
) -> Result<SavedFile, DownloadError> {
    let local_path = resolve_local_path(remote_path, base_path, target_dir)?;

    if let Some(parent) = local_path.parent() {
        fs::create_dir_all(parent).map_err(|source| DownloadError::io(parent, source))?;
    }

    let mut file = File::create(&local_path).map_err(|source| DownloadError::io(&local_path, source))?;
    let bytes = copy_stream(remote_path, &local_path, reader, &mut file)?;
    file.flush()
        .map_err(|source| DownloadError::io(&local_path, source))?;

    debug!(remote = remote_path, local = %local_path.display(), bytes, "saved remote file");
    Ok(SavedFile {
        path: local_path,
        bytes,
    })
}

/// Copies `reader` into `writer`, attributing failures to the side that failed.
fn copy_stream(
    remote_path: &str,
    local_path: &Path,
    reader: &mut dyn Read,
    writer: &mut dyn Write,
) -> Result<u64, DownloadError> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => return Ok(total),
            Ok(read) => read,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(DownloadError::stream(remote_path, error)),
        };
        writer
            .write_all(&buffer[..read])
            .map_err(|source| DownloadError::io(local_path, source))?;
        total += read as u64;
    }
}

/// Applies a remote permission mode to a saved file.
///
/// Only the permission bits (`0o7777`) are applied. No-op on non-unix targets.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] if the permissions cannot be changed.
pub fn apply_mode(path: &Path, mode: u32) -> Result<(), DownloadError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
            .map_err(|source| DownloadError::io(path, source))?;
    }
    #[cfg(not(unix))]
    {
        let _ = (path, mode);
    }
    Ok(())
}
