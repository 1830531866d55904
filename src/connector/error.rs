//! Error types for connectors.
//!
//! Variants fall into the groups the worker pool and entry point care about:
//! configuration (`UnsupportedScheme`), connection/authentication (fatal for
//! the connector being built), listing (fatal for the run) and per-file
//! transfer errors (the item is requeued).

use thiserror::Error;

use crate::download::DownloadError;

/// Errors that can occur while connecting, listing or transferring.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// No registered factory accepts the URL scheme.
    #[error("no connector available for scheme: {scheme}")]
    UnsupportedScheme {
        /// The unsupported scheme.
        scheme: String,
    },

    /// TCP connection could not be established.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// `host:port` being dialled.
        address: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Connection attempt exceeded the configured timeout.
    #[error("timed out connecting to {address}")]
    ConnectTimeout {
        /// `host:port` being dialled.
        address: String,
    },

    /// An FTP command failed.
    #[error("FTP {operation} failed for {target}: {source}")]
    Ftp {
        /// Command or phase that failed (login, list, retr...).
        operation: &'static str,
        /// Path or host the command targeted.
        target: String,
        /// The underlying FTP error.
        #[source]
        source: suppaftp::FtpError,
    },

    /// An SSH operation failed.
    #[error("SSH {operation} failed: {source}")]
    Ssh {
        /// Operation that failed (handshake, auth, channel, exec...).
        operation: &'static str,
        /// The underlying libssh2 error.
        #[source]
        source: ssh2::Error,
    },

    /// The credential secret is not in the expected form.
    #[error("invalid credential: {reason}")]
    InvalidCredential {
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The base64 private key blob could not be decoded.
    #[error("failed to decode private key: {source}")]
    KeyDecode {
        /// The underlying decode error.
        #[source]
        source: base64::DecodeError,
    },

    /// The decoded private key could not be parsed.
    #[error("failed to parse private key: {source}")]
    KeyParse {
        /// The underlying parse error.
        #[source]
        source: ssh_key::Error,
    },

    /// The server did not accept the credential.
    #[error("authentication failed for {username}@{host}")]
    Authentication {
        /// User that attempted to log in.
        username: String,
        /// Remote host.
        host: String,
    },

    /// The server presented no host key.
    #[error("host {host} presented no host key")]
    HostKeyUnavailable {
        /// Remote host.
        host: String,
    },

    /// The user declined an unknown host key.
    #[error("host key verification rejected for {host} ({fingerprint})")]
    HostKeyRejected {
        /// Remote host.
        host: String,
        /// Presented fingerprint.
        fingerprint: String,
    },

    /// A host presented a key different from the one accepted earlier.
    #[error("host key for {host} changed: accepted {expected}, presented {presented}")]
    HostKeyMismatch {
        /// Remote host.
        host: String,
        /// Fingerprint accepted earlier in this process.
        expected: String,
        /// Fingerprint presented now.
        presented: String,
    },

    /// Listing the remote tree failed.
    #[error("failed to list {base}: {message}")]
    Listing {
        /// Listing root.
        base: String,
        /// What went wrong.
        message: String,
    },

    /// The remote-copy stream violated the wire protocol.
    #[error("remote-copy protocol error for {path}: {message}")]
    Protocol {
        /// Remote path being transferred.
        path: String,
        /// What was wrong.
        message: String,
    },

    /// The remote side reported an error record instead of data.
    #[error("remote reported error for {path}: {message}")]
    Remote {
        /// Remote path being transferred.
        path: String,
        /// Message sent by the remote.
        message: String,
    },

    /// A remote command exited unsuccessfully.
    #[error("remote command `{command}` exited with status {status}: {stderr}")]
    RemoteExit {
        /// The command that ran.
        command: String,
        /// Exit status.
        status: i32,
        /// Captured stderr (may be empty).
        stderr: String,
    },

    /// Reading from or writing to a session stream failed.
    #[error("stream error during {operation} for {path}: {source}")]
    Stream {
        /// Phase that failed.
        operation: &'static str,
        /// Remote path being transferred.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Saving the remote bytes locally failed.
    #[error(transparent)]
    Save(#[from] DownloadError),

    /// Every attempt allowed by the retry policy failed.
    #[error("failed after {attempts} attempts for {path}: {source}")]
    RetriesExhausted {
        /// Remote path.
        path: String,
        /// Attempts made.
        attempts: u32,
        /// Error from the final attempt.
        #[source]
        source: Box<ConnectorError>,
    },

    /// A blocking task panicked or was cancelled.
    #[error("connector task failed: {source}")]
    Task {
        /// The join error.
        #[source]
        source: tokio::task::JoinError,
    },

    /// The connector was used after `close()`.
    #[error("connector is closed")]
    Closed,
}

impl ConnectorError {
    /// Creates an unsupported-scheme error.
    pub fn unsupported_scheme(scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            scheme: scheme.into(),
        }
    }

    /// Creates a TCP connect error.
    pub fn connect(address: impl Into<String>, source: std::io::Error) -> Self {
        Self::Connect {
            address: address.into(),
            source,
        }
    }

    /// Creates an FTP command error.
    pub fn ftp(operation: &'static str, target: impl Into<String>, source: suppaftp::FtpError) -> Self {
        Self::Ftp {
            operation,
            target: target.into(),
            source,
        }
    }

    /// Creates an SSH error.
    pub fn ssh(operation: &'static str, source: ssh2::Error) -> Self {
        Self::Ssh { operation, source }
    }

    /// Creates a listing error.
    pub fn listing(base: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Listing {
            base: base.into(),
            message: message.into(),
        }
    }

    /// Creates a protocol-format error.
    pub fn protocol(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a remote-reported error.
    pub fn remote(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a stream IO error.
    pub fn stream(operation: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Stream {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Wraps the final error of an exhausted retry loop.
    pub fn retries_exhausted(path: impl Into<String>, attempts: u32, last: ConnectorError) -> Self {
        Self::RetriesExhausted {
            path: path.into(),
            attempts,
            source: Box::new(last),
        }
    }

    /// Returns true for errors raised before any session exists
    /// (connect, credential, authentication, host identity).
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::ConnectTimeout { .. }
                | Self::InvalidCredential { .. }
                | Self::KeyDecode { .. }
                | Self::KeyParse { .. }
                | Self::Authentication { .. }
                | Self::HostKeyUnavailable { .. }
                | Self::HostKeyRejected { .. }
                | Self::HostKeyMismatch { .. }
        )
    }
}
