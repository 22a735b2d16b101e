// ABOUTME: SSH key credential used for every git operation against the remote.
// ABOUTME: Also exposes the matching public key so users can register it as a deploy key.

use super::GitError;
use git2::{Cred, CredentialType};
use std::path::{Path, PathBuf};

#[derive(Clone)]
pub struct GitCredential {
    username: String,
    private_key: PathBuf,
    passphrase: Option<String>,
}

impl GitCredential {
    /// Use the PEM private key at `path`. Fails if the key cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, GitError> {
        let private_key = path.into();
        std::fs::metadata(&private_key).map_err(|source| GitError::Credential {
            path: private_key.clone(),
            source,
        })?;

        Ok(Self {
            username: "git".to_string(),
            private_key,
            passphrase: None,
        })
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(passphrase.into());
        self
    }

    pub fn private_key(&self) -> &Path {
        &self.private_key
    }

    /// Contents of `<key>.pub`, if present.
    pub fn public_key(&self) -> Option<String> {
        let mut path = self.private_key.clone().into_os_string();
        path.push(".pub");
        std::fs::read_to_string(path)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    pub(crate) fn to_git2(
        &self,
        username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> Result<Cred, git2::Error> {
        let username = username_from_url.unwrap_or(&self.username);
        if allowed.contains(CredentialType::SSH_KEY) {
            Cred::ssh_key(username, None, &self.private_key, self.passphrase.as_deref())
        } else if allowed.contains(CredentialType::USERNAME) {
            Cred::username(username)
        } else {
            Err(git2::Error::from_str("invalid auth method"))
        }
    }
}

/// Credential callback state for one clone or fetch.
///
/// libgit2 calls back again after the remote rejects a key, forever if allowed.
/// The key is offered once. A username request for a URL without a user is a
/// separate step and does not use up the key attempt.
pub(crate) struct CredentialAttempts<'a> {
    credential: &'a GitCredential,
    username_offered: bool,
    key_offered: bool,
}

impl<'a> CredentialAttempts<'a> {
    pub(crate) fn new(credential: &'a GitCredential) -> Self {
        Self {
            credential,
            username_offered: false,
            key_offered: false,
        }
    }

    pub(crate) fn next(
        &mut self,
        username_from_url: Option<&str>,
        allowed: CredentialType,
    ) -> Result<Cred, git2::Error> {
        let offered = if allowed.contains(CredentialType::SSH_KEY) {
            &mut self.key_offered
        } else {
            &mut self.username_offered
        };
        if *offered {
            return Err(git2::Error::from_str("authorization failed"));
        }
        *offered = true;
        self.credential.to_git2(username_from_url, allowed)
    }
}

impl std::fmt::Debug for GitCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredential")
            .field("username", &self.username)
            .field("private_key", &self.private_key)
            .field("passphrase", &self.passphrase.as_ref().map(|_| "***"))
            .finish()
    }
}
