//! FTP connector.
//!
//! Uses a blocking `suppaftp` control connection in binary mode. Listings go
//! through [`walk_tree`] one directory at a time; each download is retried by
//! the factory's [`RetryPolicy`] (three attempts, 1s then 2s backoff by
//! default) before the failure is handed back to the worker pool.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use suppaftp::FtpStream;
use suppaftp::types::FileType;
use tracing::{debug, info, instrument, warn};
use url::Url;
use zeroize::Zeroizing;

use super::walk::{DirectoryLister, EntryKind, RemoteEntry, walk_tree};
use super::{
    ConnectOptions, Connector, ConnectorError, ConnectorFactory, lock_session, run_blocking,
    socket_address,
};
use crate::credential::Credential;
use crate::download::{FTP_DEFAULT_PORT, RetryPolicy, SavedFile, save_remote_file};

const ANONYMOUS_USER: &str = "anonymous";

/// Builds [`FtpConnector`]s for `ftp://` URLs.
#[derive(Debug, Clone)]
pub struct FtpConnectorFactory {
    options: ConnectOptions,
    retry: RetryPolicy,
}

impl FtpConnectorFactory {
    /// Creates a factory with the default retry policy.
    #[must_use]
    pub fn new(options: ConnectOptions) -> Self {
        Self {
            options,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the per-file retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl ConnectorFactory for FtpConnectorFactory {
    fn scheme(&self) -> &'static str {
        "ftp"
    }

    #[instrument(skip(self, credential), fields(host = url.host_str().unwrap_or_default()))]
    async fn create(
        &self,
        url: &Url,
        credential: &Credential,
    ) -> Result<Box<dyn Connector>, ConnectorError> {
        let address = socket_address(url, FTP_DEFAULT_PORT)?;
        let session_credential = credential.clone();
        let dial_address = address.clone();

        let connect = run_blocking(move || open_session(&dial_address, &session_credential));
        let stream = tokio::time::timeout(self.options.connect_timeout, connect)
            .await
            .map_err(|_| ConnectorError::ConnectTimeout {
                address: address.clone(),
            })??;

        info!(address = %address, "FTP session established");
        Ok(Box::new(FtpConnector {
            stream: Arc::new(Mutex::new(Some(stream))),
            credential: credential.clone(),
            retry: self.retry.clone(),
            address,
        }))
    }
}

/// Dials, logs in and switches to binary transfers.
fn open_session(address: &str, credential: &Credential) -> Result<FtpStream, ConnectorError> {
    let secret = credential
        .secret()
        .ok_or(ConnectorError::InvalidCredential {
            reason: "credential has been wiped",
        })?;
    let password = Zeroizing::new(
        String::from_utf8(secret.to_vec()).map_err(|_| ConnectorError::InvalidCredential {
            reason: "FTP password is not valid UTF-8",
        })?,
    );
    let username = match credential.username() {
        "" => ANONYMOUS_USER,
        name => name,
    };

    let mut stream = FtpStream::connect(address).map_err(|source| match source {
        suppaftp::FtpError::ConnectionError(io) => ConnectorError::connect(address, io),
        other => ConnectorError::ftp("connect", address, other),
    })?;
    stream
        .login(username, password.as_str())
        .map_err(|source| ConnectorError::ftp("login", address, source))?;
    stream
        .transfer_type(FileType::Binary)
        .map_err(|source| ConnectorError::ftp("TYPE I", address, source))?;
    debug!(address, username, "FTP login complete");
    Ok(stream)
}

/// A logged-in FTP session.
pub struct FtpConnector {
    stream: Arc<Mutex<Option<FtpStream>>>,
    credential: Credential,
    retry: RetryPolicy,
    address: String,
}

impl std::fmt::Debug for FtpConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FtpConnector")
            .field("address", &self.address)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}

impl FtpConnector {
    /// Returns the connector's own credential copy.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

#[async_trait]
impl Connector for FtpConnector {
    fn name(&self) -> &'static str {
        "ftp"
    }

    #[instrument(skip(self), fields(address = %self.address))]
    async fn list_files_recursively(&mut self, base: &str) -> Result<Vec<String>, ConnectorError> {
        let stream = Arc::clone(&self.stream);
        let base = base.to_string();
        let files = run_blocking(move || {
            let mut guard = lock_session(&stream);
            let stream = guard.as_mut().ok_or(ConnectorError::Closed)?;
            let mut lister = FtpLister { stream };
            walk_tree(&mut lister, &base)
        })
        .await?;
        info!(count = files.len(), "FTP listing complete");
        Ok(files)
    }

    async fn download_file(
        &mut self,
        remote_path: &str,
        target_dir: &Path,
        base_path: &str,
    ) -> Result<SavedFile, ConnectorError> {
        let outcome = self
            .retry
            .run(remote_path, |attempt| {
                let stream = Arc::clone(&self.stream);
                let remote_path = remote_path.to_string();
                let target_dir = target_dir.to_path_buf();
                let base_path = base_path.to_string();
                async move {
                    debug!(remote = %remote_path, attempt, "FTP RETR");
                    run_blocking(move || {
                        let mut guard = lock_session(&stream);
                        let stream = guard.as_mut().ok_or(ConnectorError::Closed)?;
                        retrieve(stream, &remote_path, &target_dir, &base_path)
                    })
                    .await
                }
            })
            .await;

        outcome.map_err(|(last, attempts)| match last {
            ConnectorError::Closed => ConnectorError::Closed,
            last => ConnectorError::retries_exhausted(remote_path, attempts, last),
        })
    }

    async fn close(&mut self) -> Result<(), ConnectorError> {
        self.credential.wipe();
        let stream = Arc::clone(&self.stream);
        let address = self.address.clone();
        run_blocking(move || {
            let Some(mut stream) = lock_session(&stream).take() else {
                return Ok(());
            };
            stream
                .quit()
                .map_err(|source| ConnectorError::ftp("QUIT", address, source))
        })
        .await
    }
}

/// Streams one file from the server into the target directory.
fn retrieve(
    stream: &mut FtpStream,
    remote_path: &str,
    target_dir: &Path,
    base_path: &str,
) -> Result<SavedFile, ConnectorError> {
    let mut data = stream
        .retr_as_stream(remote_path)
        .map_err(|source| ConnectorError::ftp("RETR", remote_path, source))?;
    let saved = save_remote_file(remote_path, target_dir, base_path, &mut data);
    let finalized = stream.finalize_retr_stream(data);

    let saved = saved?;
    finalized.map_err(|source| ConnectorError::ftp("RETR", remote_path, source))?;
    Ok(saved)
}

/// Adapts a control connection to [`DirectoryLister`].
struct FtpLister<'a> {
    stream: &'a mut FtpStream,
}

impl DirectoryLister for FtpLister<'_> {
    type Error = ConnectorError;

    fn list_directory(&mut self, path: &str) -> Result<Vec<RemoteEntry>, ConnectorError> {
        let lines = self
            .stream
            .list(Some(path))
            .map_err(|source| ConnectorError::ftp("LIST", path, source))?;
        Ok(lines
            .iter()
            .filter_map(|line| {
                let entry = parse_list_line(line);
                if entry.is_none() {
                    warn!(directory = path, line = %line, "unparseable LIST line skipped");
                }
                entry
            })
            .collect())
    }
}

/// Parses one `LIST` response line (UNIX or DOS format).
pub(crate) fn parse_list_line(line: &str) -> Option<RemoteEntry> {
    let file = suppaftp::list::File::from_str(line).ok()?;
    let kind = if file.is_directory() {
        EntryKind::Directory
    } else if file.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    };
    Some(RemoteEntry {
        name: file.name().to_string(),
        kind,
    })
}
