//! Error types for the save routine and local path resolution.
//!
//! These errors carry the local or remote path involved so connector and
//! worker logs point at the exact file that failed.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while materialising a remote file on local disk.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// File system error (create directory, create file, write).
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The local path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Error while reading the remote byte stream.
    #[error("error reading remote stream for {remote_path}: {source}")]
    Stream {
        /// Remote path being copied.
        remote_path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The remote path would resolve outside the job's target directory.
    #[error("remote path {remote_path} resolves outside the target directory")]
    OutsideTarget {
        /// The offending remote path.
        remote_path: String,
    },

    /// Fewer bytes arrived than the remote announced.
    #[error("truncated transfer for {path}: expected {expected_bytes} bytes, got {actual_bytes}")]
    Truncated {
        /// Local destination path.
        path: PathBuf,
        /// Announced size in bytes.
        expected_bytes: u64,
        /// Bytes actually written.
        actual_bytes: u64,
    },
}

impl DownloadError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a remote stream read error.
    pub fn stream(remote_path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Stream {
            remote_path: remote_path.into(),
            source,
        }
    }

    /// Creates an outside-target error.
    pub fn outside_target(remote_path: impl Into<String>) -> Self {
        Self::OutsideTarget {
            remote_path: remote_path.into(),
        }
    }

    /// Creates a truncated-transfer error.
    pub fn truncated(path: impl Into<PathBuf>, expected_bytes: u64, actual_bytes: u64) -> Self {
        Self::Truncated {
            path: path.into(),
            expected_bytes,
            actual_bytes,
        }
    }
}
