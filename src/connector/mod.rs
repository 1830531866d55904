//! Protocol connectors for listing and fetching remote files.
//!
//! Every remote protocol is reached through the same pair of traits:
//!
//! - [`ConnectorFactory`] - Claims a URL scheme and opens authenticated sessions
//! - [`Connector`] - One live session: recursive listing, single-file download, close
//! - [`ConnectorRegistry`] - Ordered collection of factories, selected by scheme
//! - [`FtpConnectorFactory`] - `ftp://` via a plain FTP control connection
//! - [`ScpConnectorFactory`] - `scp://` via remote-copy over an SSH session
//!
//! The worker pool opens one connector per worker; a connector is never shared
//! between tasks, so `&mut self` on the session methods is enough.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dljob_core::connector::{build_default_registry, ConnectOptions, HostKeyPrompt, HostKeyVerifier};
//! use dljob_core::Credential;
//!
//! struct AlwaysYes;
//! impl HostKeyPrompt for AlwaysYes {
//!     fn confirm(&self, _host: &str, _key_type: &str, _fingerprint: &str) -> bool { true }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = Arc::new(HostKeyVerifier::new(Arc::new(AlwaysYes)));
//! let registry = build_default_registry(&ConnectOptions::default(), verifier);
//!
//! let url = url::Url::parse("ftp://mirror.example.org/pub")?;
//! let factory = registry.select(&url).ok_or("unsupported scheme")?;
//! let credential = Credential::new("anonymous", b"guest".to_vec());
//! let mut connector = factory.create(&url, &credential).await?;
//! let files = connector.list_files_recursively("/pub").await?;
//! println!("{} files", files.len());
//! connector.close().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod ftp;
mod registry;
pub mod scp;
pub mod walk;

pub use error::ConnectorError;
pub use ftp::{FtpConnector, FtpConnectorFactory};
pub use registry::ConnectorRegistry;
pub use scp::{
    ChannelExit, HostKeyPrompt, HostKeyVerifier, RemoteShell, ScpConnector, ScpConnectorFactory,
    ShellChannel,
};
pub use walk::{DirectoryLister, EntryKind, RemoteEntry, walk_tree};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::credential::Credential;
use crate::download::{CONNECT_TIMEOUT_SECS, SavedFile};

/// What to do with the permission bits a protocol reports for a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModePolicy {
    /// Keep the local default permissions.
    #[default]
    Ignore,
    /// Apply the remote permission bits after the file is written.
    Preserve,
}

/// Options shared by every connector a registry builds.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Upper bound on establishing a session (TCP connect plus handshake).
    pub connect_timeout: Duration,
    /// Handling of remote permission bits.
    pub mode_policy: ModePolicy,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            mode_policy: ModePolicy::Ignore,
        }
    }
}

/// One authenticated session with a remote host.
///
/// # Object Safety
///
/// This trait uses `async_trait` so the worker pool can hold
/// `Box<dyn Connector>` produced by any registered factory.
#[async_trait]
pub trait Connector: Send {
    /// Returns the protocol name (e.g., "ftp", "scp").
    fn name(&self) -> &'static str;

    /// Lists every regular file under `base`, as full remote paths.
    ///
    /// Every returned path is cleaned and lies within `base`.
    async fn list_files_recursively(&mut self, base: &str) -> Result<Vec<String>, ConnectorError>;

    /// Downloads one remote file into `target_dir`, stripping `base_path`.
    ///
    /// The destination is created or truncated; a repeated call overwrites.
    async fn download_file(
        &mut self,
        remote_path: &str,
        target_dir: &Path,
        base_path: &str,
    ) -> Result<SavedFile, ConnectorError>;

    /// Wipes the connector's credential copy and ends the session.
    ///
    /// The credential is wiped even if tearing down the session fails.
    async fn close(&mut self) -> Result<(), ConnectorError>;
}

/// Builds connectors for one URL scheme.
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    /// Returns the scheme this factory serves.
    fn scheme(&self) -> &'static str;

    /// Returns true if this factory can serve `url`.
    fn accepts(&self, url: &Url) -> bool {
        url.scheme() == self.scheme()
    }

    /// Connects and authenticates a new session.
    ///
    /// The connector keeps its own copy of `credential`; the caller's copy is
    /// untouched.
    async fn create(
        &self,
        url: &Url,
        credential: &Credential,
    ) -> Result<Box<dyn Connector>, ConnectorError>;
}

/// Builds the registry used by the CLI: FTP first, then SCP.
#[must_use]
pub fn build_default_registry(
    options: &ConnectOptions,
    host_keys: Arc<HostKeyVerifier>,
) -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    registry.register(Arc::new(FtpConnectorFactory::new(options.clone())));
    registry.register(Arc::new(ScpConnectorFactory::new(options.clone(), host_keys)));
    registry
}

/// `host:port` for dialling, using the scheme's well-known port if absent.
pub(crate) fn socket_address(url: &Url, default_port: u16) -> Result<String, ConnectorError> {
    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| {
            ConnectorError::connect(
                url.as_str(),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "URL has no host"),
            )
        })?;
    let port = url.port().unwrap_or(default_port);
    Ok(format!("{host}:{port}"))
}

/// Runs a blocking protocol call off the async runtime.
pub(crate) async fn run_blocking<T, F>(task: F) -> Result<T, ConnectorError>
where
    F: FnOnce() -> Result<T, ConnectorError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|source| ConnectorError::Task { source })?
}

/// Locks a session mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
    session
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct NeverPrompt;
    impl HostKeyPrompt for NeverPrompt {
        fn confirm(&self, _host: &str, _key_type: &str, _fingerprint: &str) -> bool {
            false
        }
    }

    fn default_registry() -> ConnectorRegistry {
        let verifier = Arc::new(HostKeyVerifier::new(Arc::new(NeverPrompt)));
        build_default_registry(&ConnectOptions::default(), verifier)
    }

    #[test]
    fn test_default_registry_order() {
        let registry = default_registry();
        assert_eq!(registry.schemes(), vec!["ftp", "scp"]);
    }

    #[test]
    fn test_default_registry_selects_by_scheme() {
        let registry = default_registry();
        let ftp = Url::parse("ftp://host/pub").unwrap();
        let scp = Url::parse("scp://user@host/data").unwrap();
        let http = Url::parse("http://host/x").unwrap();

        assert_eq!(registry.select(&ftp).unwrap().scheme(), "ftp");
        assert_eq!(registry.select(&scp).unwrap().scheme(), "scp");
        assert!(registry.select(&http).is_none());
    }

    #[test]
    fn test_socket_address_uses_default_port() {
        let url = Url::parse("scp://user@example.org/data").unwrap();
        assert_eq!(socket_address(&url, 22).unwrap(), "example.org:22");

        let url = Url::parse("ftp://example.org:2121/").unwrap();
        assert_eq!(socket_address(&url, 21).unwrap(), "example.org:2121");
    }

    #[test]
    fn test_default_connect_options() {
        let options = ConnectOptions::default();
        assert_eq!(options.connect_timeout, Duration::from_secs(30));
        assert_eq!(options.mode_policy, ModePolicy::Ignore);
    }

    #[tokio::test]
    async fn test_run_blocking_propagates_errors() {
        let result: Result<(), ConnectorError> = run_blocking(|| Err(ConnectorError::Closed)).await;
        assert!(matches!(result, Err(ConnectorError::Closed)));
    }
}
