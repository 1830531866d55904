//! Constants for the download module (timeouts, retry, autosave).

use std::time::Duration;

/// Default TCP connect timeout for FTP and SSH sessions (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Interval between periodic job-file saves while workers run.
pub const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(2);

/// Attempts made by the FTP connector for one file before giving up.
pub const FTP_MAX_ATTEMPTS: u32 = 3;

/// Linear backoff step between FTP attempts (1s, then 2s).
pub const FTP_BACKOFF_STEP: Duration = Duration::from_secs(1);

/// Extension appended to timestamp-named job files.
pub const JOB_FILE_SUFFIX: &str = ".dljob";

/// Default port for the remote-copy scheme.
pub const SSH_DEFAULT_PORT: u16 = 22;

/// Default port for FTP.
pub const FTP_DEFAULT_PORT: u16 = 21;
