//! Credential storage with explicit wiping.
//!
//! A [`Credential`] owns the username and secret bytes used to authenticate a
//! connector. For FTP the secret is the password; for SCP it is a base64
//! private key blob. The secret buffer is zeroed in place by [`Credential::wipe`]
//! and again on drop.

use std::fmt;

use zeroize::Zeroize;

/// Username plus a secret byte buffer that is zeroed when no longer needed.
pub struct Credential {
    username: String,
    secret: Box<[u8]>,
    wiped: bool,
}

impl Credential {
    /// Creates a credential, taking ownership of the secret bytes.
    #[must_use]
    pub fn new(username: impl Into<String>, secret: Vec<u8>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into_boxed_slice(),
            wiped: false,
        }
    }

    /// Creates a credential by copying the secret out of a borrowed buffer.
    #[must_use]
    pub fn from_slice(username: impl Into<String>, secret: &[u8]) -> Self {
        Self::new(username, secret.to_vec())
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the secret, or `None` once the credential has been wiped.
    #[must_use]
    pub fn secret(&self) -> Option<&[u8]> {
        (!self.wiped).then_some(&*self.secret)
    }

    /// Overwrites the secret with zeros. The secret is unreadable afterwards.
    pub fn wipe(&mut self) {
        self.secret.zeroize();
        self.wiped = true;
    }

    /// Returns true if the credential has been wiped.
    #[must_use]
    pub fn is_wiped(&self) -> bool {
        self.wiped
    }

    /// Returns true if every byte of the backing buffer is zero.
    #[must_use]
    pub fn is_zeroed(&self) -> bool {
        self.secret.iter().all(|byte| *byte == 0)
    }
}

impl Clone for Credential {
    fn clone(&self) -> Self {
        Self {
            username: self.username.clone(),
            secret: self.secret.clone(),
            wiped: self.wiped,
        }
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

// Never print the secret.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret_len", &self.secret.len())
            .field("wiped", &self.wiped)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_exposes_secret_until_wiped() {
        let mut credential = Credential::new("alice", b"hunter2".to_vec());
        assert_eq!(credential.username(), "alice");
        assert_eq!(credential.secret().unwrap(), b"hunter2");
        assert!(!credential.is_wiped());

        credential.wipe();

        assert!(credential.secret().is_none());
        assert!(credential.is_wiped());
        assert!(credential.is_zeroed());
    }

    #[test]
    fn test_credential_clone_owns_separate_buffer() {
        let original = Credential::from_slice("bob", b"s3cret");
        let mut copy = original.clone();
        copy.wipe();

        assert!(copy.is_zeroed());
        assert_eq!(original.secret().unwrap(), b"s3cret");
    }

    #[test]
    fn test_credential_debug_hides_secret() {
        let credential = Credential::new("carol", b"topsecret".to_vec());
        let rendered = format!("{credential:?}");
        assert!(rendered.contains("carol"));
        assert!(!rendered.contains("topsecret"), "secret leaked: {rendered}");
    }

    #[test]
    fn test_empty_secret_is_zeroed() {
        let credential = Credential::new("anonymous", Vec::new());
        assert!(credential.is_zeroed());
        assert_eq!(credential.secret().unwrap(), b"");
    }
}
