//! Remote-copy connector over SSH.
//!
//! Listing runs `find <base> -type f` on the remote host; each download runs
//! `scp -f <path>` and speaks the receiving side of the copy protocol over
//! the command's stdin/stdout (see [`protocol`]). There is no retry here: a
//! failed transfer goes straight back to the worker pool.

mod host_key;
pub mod protocol;
mod session;

pub use host_key::{HostKeyPrompt, HostKeyVerifier, fingerprint_sha256};
pub use session::{ChannelExit, RemoteShell, ShellChannel, SshShell};

use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{info, instrument, warn};
use url::Url;

use super::walk::filter_within_base;
use super::{
    ConnectOptions, Connector, ConnectorError, ConnectorFactory, ModePolicy, lock_session,
    run_blocking, socket_address,
};
use crate::credential::Credential;
use crate::download::{SSH_DEFAULT_PORT, SavedFile, apply_mode, save_remote_file};

/// Builds [`ScpConnector`]s for `scp://` URLs.
#[derive(Debug, Clone)]
pub struct ScpConnectorFactory {
    options: ConnectOptions,
    host_keys: Arc<HostKeyVerifier>,
}

impl ScpConnectorFactory {
    /// Creates a factory; every connector it builds shares `host_keys`.
    #[must_use]
    pub fn new(options: ConnectOptions, host_keys: Arc<HostKeyVerifier>) -> Self {
        Self { options, host_keys }
    }
}

#[async_trait]
impl ConnectorFactory for ScpConnectorFactory {
    fn scheme(&self) -> &'static str {
        "scp"
    }

    #[instrument(skip(self, credential), fields(host = url.host_str().unwrap_or_default()))]
    async fn create(
        &self,
        url: &Url,
        credential: &Credential,
    ) -> Result<Box<dyn Connector>, ConnectorError> {
        let address = socket_address(url, SSH_DEFAULT_PORT)?;
        let host = host_identity(url);
        let session_credential = credential.clone();
        let host_keys = Arc::clone(&self.host_keys);
        let timeout = self.options.connect_timeout;
        let dial_address = address.clone();

        // The host-key prompt may wait on the user, so only the dial and
        // handshake are bounded by the connect timeout inside `SshShell`.
        let shell = run_blocking(move || {
            SshShell::connect(&dial_address, &host, &session_credential, &host_keys, timeout)
        })
        .await?;

        info!(address = %address, "remote-copy connector ready");
        Ok(Box::new(ScpConnector::with_shell(
            Box::new(shell),
            credential.clone(),
            self.options.mode_policy,
        )))
    }
}

/// Host key cache identity: the host, plus the port when it is not 22.
fn host_identity(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) if port != SSH_DEFAULT_PORT => format!("[{host}]:{port}"),
        _ => host.to_string(),
    }
}

/// Quotes `value` for a POSIX shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// A remote-copy session.
pub struct ScpConnector {
    shell: Arc<Mutex<Option<Box<dyn RemoteShell>>>>,
    credential: Credential,
    mode_policy: ModePolicy,
}

impl ScpConnector {
    /// Wraps an already-authenticated shell.
    #[must_use]
    pub fn with_shell(
        shell: Box<dyn RemoteShell>,
        credential: Credential,
        mode_policy: ModePolicy,
    ) -> Self {
        Self {
            shell: Arc::new(Mutex::new(Some(shell))),
            credential,
            mode_policy,
        }
    }

    /// Returns the connector's own credential copy.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

impl std::fmt::Debug for ScpConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScpConnector")
            .field("credential", &self.credential)
            .field("mode_policy", &self.mode_policy)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Connector for ScpConnector {
    fn name(&self) -> &'static str {
        "scp"
    }

    #[instrument(skip(self))]
    async fn list_files_recursively(&mut self, base: &str) -> Result<Vec<String>, ConnectorError> {
        let shell = Arc::clone(&self.shell);
        let base = base.to_string();
        let files = run_blocking(move || {
            let mut guard = lock_session(&shell);
            let shell = guard.as_mut().ok_or(ConnectorError::Closed)?;

            let command = format!("find {} -type f", shell_quote(&base));
            let mut channel = shell.exec(&command)?;
            let mut output = Vec::new();
            let read = channel.read_to_end(&mut output);
            let exit = channel.finish()?;
            read.map_err(|source| ConnectorError::stream("read listing", base.as_str(), source))?;
            if exit.status != 0 {
                return Err(ConnectorError::RemoteExit {
                    command,
                    status: exit.status,
                    stderr: exit.stderr,
                });
            }

            Ok(filter_within_base(
                String::from_utf8_lossy(&output).lines(),
                &base,
            ))
        })
        .await?;
        info!(count = files.len(), "remote listing complete");
        Ok(files)
    }

    async fn download_file(
        &mut self,
        remote_path: &str,
        target_dir: &Path,
        base_path: &str,
    ) -> Result<SavedFile, ConnectorError> {
        let shell = Arc::clone(&self.shell);
        let remote_path = remote_path.to_string();
        let target_dir = target_dir.to_path_buf();
        let base_path = base_path.to_string();
        let mode_policy = self.mode_policy;

        run_blocking(move || {
            let mut guard = lock_session(&shell);
            let shell = guard.as_mut().ok_or(ConnectorError::Closed)?;

            let command = format!("scp -f {}", shell_quote(&remote_path));
            let mut channel = shell.exec(&command)?;
            let received = protocol::receive_file(&mut *channel, &remote_path, |_header, reader| {
                Ok(save_remote_file(&remote_path, &target_dir, &base_path, reader)?)
            });
            let exit = channel.finish();

            let (header, saved) = match (received, exit) {
                (Ok(received), Ok(exit)) if exit.status == 0 => received,
                (Ok(_), Ok(exit)) => {
                    return Err(ConnectorError::RemoteExit {
                        command,
                        status: exit.status,
                        stderr: exit.stderr,
                    });
                }
                (Ok(_), Err(error)) => return Err(error),
                (Err(error), Ok(exit)) if !exit.stderr.is_empty() => {
                    warn!(remote = %remote_path, stderr = %exit.stderr, "remote copy stderr");
                    return Err(error);
                }
                (Err(error), _) => return Err(error),
            };

            if mode_policy == ModePolicy::Preserve {
                apply_mode(&saved.path, header.mode)?;
            }
            Ok(saved)
        })
        .await
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        self.credential.wipe();
        let shell = Arc::clone(&self.shell);
        run_blocking(move || {
            let Some(mut shell) = lock_session(&shell).take() else {
                return Ok(());
            };
            shell.disconnect()
        })
        .await
    }
}
