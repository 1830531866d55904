//! Job item types and status definitions.

use std::fmt;

/// Status of a job item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStatus {
    /// Waiting to be claimed by a worker.
    Pending,
    /// Claimed by a worker and currently downloading.
    InProgress,
    /// Downloaded.
    Done,
}

impl ItemStatus {
    /// Returns the job-file status field.
    ///
    /// Only `1` is meaningful on load; `0` and `-1` both read back as pending.
    #[must_use]
    pub fn as_digit(&self) -> &'static str {
        match self {
            Self::Pending => "0",
            Self::InProgress => "-1",
            Self::Done => "1",
        }
    }

    /// Parses a job-file status field. Anything but `1` is pending.
    #[must_use]
    pub fn from_digit(field: &str) -> Self {
        if field.trim() == "1" {
            Self::Done
        } else {
            Self::Pending
        }
    }

    /// Returns a lowercase label for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single remote file tracked by a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobItem {
    /// Remote path, absolute under the job root.
    pub path: String,
    /// Current status.
    pub status: ItemStatus,
}

impl JobItem {
    /// Creates a pending item.
    #[must_use]
    pub fn pending(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: ItemStatus::Pending,
        }
    }

    /// Renders the item as a job-file line (without newline).
    #[must_use]
    pub fn to_line(&self) -> String {
        format!("{}:{}", self.status.as_digit(), self.path)
    }

    /// Parses a job-file item line. Returns `None` if the `:` separator is missing.
    #[must_use]
    pub fn from_line(line: &str) -> Option<Self> {
        let (status, path) = line.split_once(':')?;
        Some(Self {
            path: path.to_string(),
            status: ItemStatus::from_digit(status),
        })
    }
}

impl fmt::Display for JobItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobItem {{ path: {}, status: {} }}", self.path, self.status)
    }
}
