//! Trust-on-first-use host key verification.
//!
//! The first time a host is seen in this process the user is asked to accept
//! its SHA-256 fingerprint. An accepted fingerprint is cached per host so the
//! other workers' sessions proceed silently; a later session that presents a
//! different key is refused. Nothing is persisted between runs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::connector::ConnectorError;

/// Asks the user whether to trust an unknown host key.
pub trait HostKeyPrompt: Send + Sync {
    /// Returns true if the user accepts `fingerprint` for `host`.
    fn confirm(&self, host: &str, key_type: &str, fingerprint: &str) -> bool;
}

/// Formats the OpenSSH-style SHA-256 fingerprint of a raw public key blob.
#[must_use]
pub fn fingerprint_sha256(key: &[u8]) -> String {
    let digest = Sha256::digest(key);
    format!("SHA256:{}", STANDARD_NO_PAD.encode(digest))
}

/// Process-wide cache of accepted host fingerprints.
pub struct HostKeyVerifier {
    accepted: Mutex<HashMap<String, String>>,
    prompt: Arc<dyn HostKeyPrompt>,
}

impl HostKeyVerifier {
    /// Creates an empty cache that asks `prompt` about unknown hosts.
    #[must_use]
    pub fn new(prompt: Arc<dyn HostKeyPrompt>) -> Self {
        Self {
            accepted: Mutex::new(HashMap::new()),
            prompt,
        }
    }

    /// Returns the fingerprint accepted for `host`, if any.
    #[must_use]
    pub fn accepted_fingerprint(&self, host: &str) -> Option<String> {
        self.accepted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(host)
            .cloned()
    }

    /// Checks `key` for `host`, prompting once if the host is unknown.
    ///
    /// The cache lock is held across the prompt so concurrent sessions to the
    /// same host produce a single question.
    ///
    /// # Errors
    ///
    /// - [`ConnectorError::HostKeyMismatch`] if `host` was accepted with another key
    /// - [`ConnectorError::HostKeyRejected`] if the user declines
    pub fn verify(&self, host: &str, key_type: &str, key: &[u8]) -> Result<(), ConnectorError> {
        let presented = fingerprint_sha256(key);
        let mut accepted = self
            .accepted
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(expected) = accepted.get(host) {
            if *expected == presented {
                return Ok(());
            }
            warn!(host, expected = %expected, presented = %presented, "host key changed");
            return Err(ConnectorError::HostKeyMismatch {
                host: host.to_string(),
                expected: expected.clone(),
                presented,
            });
        }

        if !self.prompt.confirm(host, key_type, &presented) {
            return Err(ConnectorError::HostKeyRejected {
                host: host.to_string(),
                fingerprint: presented,
            });
        }

        info!(host, key_type, fingerprint = %presented, "host key accepted");
        accepted.insert(host.to_string(), presented);
        Ok(())
    }
}

impl std::fmt::Debug for HostKeyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hosts = self
            .accepted
            .lock()
            .map(|accepted| accepted.len())
            .unwrap_or_default();
        f.debug_struct("HostKeyVerifier")
            .field("accepted_hosts", &hosts)
            .finish_non_exhaustive()
    }
}
