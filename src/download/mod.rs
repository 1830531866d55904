//! Local side of a transfer: path resolution, saving, retry and the worker pool.
//!
//! # Features
//!
//! - POSIX remote path cleaning and segment-aware containment checks
//! - Target-directory path resolution that refuses to escape the mirror root
//! - Shared save routine (create parents, truncate, stream to completion)
//! - Bounded linear-backoff retry for connectors that retry internally
//! - Fixed-size worker pool with periodic job autosave
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use dljob_core::download::{clean_remote_path, resolve_local_path};
//!
//! assert_eq!(clean_remote_path("/data//sub/../file.bin"), "/data/file.bin");
//! let local = resolve_local_path("/data/sub/a.txt", "/data", Path::new("/mirror")).unwrap();
//! assert_eq!(local, Path::new("/mirror/sub/a.txt"));
//! ```

mod constants;
mod engine;
mod error;
mod path;
mod retry;
mod save;

pub use constants::{
    AUTOSAVE_INTERVAL, CONNECT_TIMEOUT_SECS, FTP_BACKOFF_STEP, FTP_DEFAULT_PORT, FTP_MAX_ATTEMPTS,
    JOB_FILE_SUFFIX, SSH_DEFAULT_PORT,
};
pub use engine::{
    DEFAULT_WORKERS, MAX_WORKERS, MIN_WORKERS, PoolError, PoolOptions, PoolStats, WorkerPool,
};
pub use error::DownloadError;
pub use path::{
    clean_remote_path, is_within_base, join_remote_path, remote_file_name, resolve_local_path,
};
pub use retry::{RetryDecision, RetryPolicy};
pub use save::{SavedFile, apply_mode, save_remote_file};
