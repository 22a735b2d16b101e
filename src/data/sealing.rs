// ABOUTME: NaCl box sealing of environment variable values at rest.
// ABOUTME: The daemon's key lives in a 32-byte file, generated on first use.

use crypto_box::aead::{self, Aead, AeadCore, OsRng};
use crypto_box::{PublicKey, SalsaBox, SecretKey};
use std::path::Path;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 24;

#[derive(Debug, thiserror::Error)]
pub enum SealError {
    #[error("failed to access sealing key {path}: {source}")]
    KeyFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sealing key {path} is malformed (expected 32 bytes, found {found})")]
    InvalidKey { path: String, found: usize },

    #[error("failed to seal value")]
    Seal,

    #[error("sealed value could not be opened")]
    Open,
}

/// Key pair used to seal values to ourselves.
pub struct SealingKeys {
    secret: SecretKey,
    public: PublicKey,
}

impl SealingKeys {
    pub fn generate() -> Self {
        Self::from_secret(SecretKey::generate(&mut OsRng))
    }

    fn from_secret(secret: SecretKey) -> Self {
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Read the key at `path`, creating it (mode 0600 on unix) if absent.
    pub fn load_or_generate(path: &Path) -> Result<Self, SealError> {
        let key_file = |source| SealError::KeyFile {
            path: path.display().to_string(),
            source,
        };

        match std::fs::read(path) {
            Ok(bytes) => {
                let secret: [u8; KEY_LEN] =
                    bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| SealError::InvalidKey {
                            path: path.display().to_string(),
                            found: bytes.len(),
                        })?;
                Ok(Self::from_secret(SecretKey::from(secret)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let keys = Self::generate();
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(key_file)?;
                }
                write_private(path, &keys.secret.to_bytes()).map_err(key_file)?;
                tracing::info!(path = %path.display(), "generated new sealing key");
                Ok(keys)
            }
            Err(e) => Err(key_file(e)),
        }
    }

    /// Encrypt `plaintext`; the output is the nonce followed by the ciphertext.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, SealError> {
        let sealer = SalsaBox::new(&self.public, &self.secret);
        let nonce = SalsaBox::generate_nonce(&mut OsRng);
        let ciphertext = sealer
            .encrypt(&nonce, plaintext)
            .map_err(|_| SealError::Seal)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(nonce.as_slice());
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>, SealError> {
        if sealed.len() < NONCE_LEN {
            return Err(SealError::Open);
        }
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce = aead::Nonce::<SalsaBox>::from_slice(nonce);
        SalsaBox::new(&self.public, &self.secret)
            .decrypt(nonce, ciphertext)
            .map_err(|_| SealError::Open)
    }
}

impl std::fmt::Debug for SealingKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealingKeys").finish_non_exhaustive()
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}
