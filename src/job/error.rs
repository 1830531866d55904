//! Error types for job persistence.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or saving a job file.
#[derive(Debug, Error)]
pub enum JobError {
    /// Reading, writing or renaming the job file failed.
    #[error("job file IO error at {path}: {source}")]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The job file has no source URL line.
    #[error("job file {path} is missing the source URL line")]
    MissingSourceUrl {
        /// The job file.
        path: PathBuf,
    },

    /// The job file has no target directory line.
    #[error("job file {path} is missing the target directory line")]
    MissingTargetDir {
        /// The job file.
        path: PathBuf,
    },

    /// The source URL could not be parsed.
    #[error("invalid source URL '{value}': {source}")]
    InvalidSourceUrl {
        /// The raw URL text.
        value: String,
        /// The parse failure.
        #[source]
        source: url::ParseError,
    },

    /// The source URL parsed but cannot be used as a job root.
    #[error("unusable source URL '{value}': {reason}")]
    UnusableSourceUrl {
        /// The raw URL text.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl JobError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid-URL error.
    pub fn invalid_source_url(value: impl Into<String>, source: url::ParseError) -> Self {
        Self::InvalidSourceUrl {
            value: value.into(),
            source,
        }
    }

    /// Creates an unusable-URL error.
    pub fn unusable_source_url(value: impl Into<String>, reason: &'static str) -> Self {
        Self::UnusableSourceUrl {
            value: value.into(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_io_message() {
        let err = JobError::io(
            "/tmp/20260101120000.dljob",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/20260101120000.dljob"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn test_job_error_invalid_url_message() {
        let err = JobError::invalid_source_url("::nope", url::ParseError::RelativeUrlWithoutBase);
        let msg = err.to_string();
        assert!(msg.contains("invalid source URL"));
        assert!(msg.contains("::nope"));
    }

    #[test]
    fn test_job_error_unusable_url_message() {
        let err = JobError::unusable_source_url("ftp:///data", "missing host");
        assert!(err.to_string().contains("missing host"));
    }
}
