//! Signing Key Provider
//! Mission: Hold the process-wide HMAC key used to sign and verify tokens

use anyhow::{bail, Context, Result};
use jsonwebtoken::{DecodingKey, EncodingKey};
use parking_lot::RwLock;
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Minimum accepted secret length in bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Length of generated ephemeral secrets (HS512 block size)
pub const EPHEMERAL_SECRET_LEN: usize = 64;

/// Symmetric key material plus a short fingerprint used as the JWT `kid`
pub struct KeyMaterial {
    id: String,
    secret: Vec<u8>,
}

impl KeyMaterial {
    pub fn from_secret(secret: impl Into<Vec<u8>>) -> Result<Self> {
        let secret = secret.into();
        if secret.is_empty() {
            bail!("Signing secret is empty");
        }
        if secret.len() < MIN_SECRET_LEN {
            bail!(
                "Signing secret must be at least {} bytes (got {})",
                MIN_SECRET_LEN,
                secret.len()
            );
        }

        let digest = Sha256::digest(&secret);
        let id = hex::encode(&digest[..8]);

        Ok(Self { id, secret })
    }

    /// Generate a fresh random key from the OS RNG
    pub fn generate() -> Result<Self> {
        let mut secret = vec![0u8; EPHEMERAL_SECRET_LEN];
        OsRng
            .try_fill_bytes(&mut secret)
            .context("OS random source unavailable")?;
        Self::from_secret(secret)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn encoding_key(&self) -> EncodingKey {
        EncodingKey::from_secret(&self.secret)
    }

    pub fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.secret)
    }
}

// Secret bytes stay out of logs
impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("id", &self.id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Source of the current signing key
pub trait KeyProvider: Send + Sync {
    fn current_key(&self) -> Arc<KeyMaterial>;
}

/// In-memory key holder.
///
/// Written once at startup; `rotate` swaps the key under the write lock while
/// readers only ever hold the read lock long enough to clone the `Arc`.
pub struct KeyStore {
    current: RwLock<Arc<KeyMaterial>>,
}

impl KeyStore {
    pub fn new(key: KeyMaterial) -> Self {
        Self {
            current: RwLock::new(Arc::new(key)),
        }
    }

    /// Random per-process key. Tokens do not survive a restart.
    pub fn ephemeral() -> Result<Self> {
        let key = KeyMaterial::generate()?;
        info!("🔑 Generated ephemeral signing key (kid={})", key.id());
        Ok(Self::new(key))
    }

    /// Use the configured secret when present, otherwise fall back to an ephemeral key
    pub fn from_config(secret: Option<&str>) -> Result<Self> {
        match secret {
            Some(secret) => {
                let key = KeyMaterial::from_secret(secret.as_bytes())
                    .context("Invalid JWT_SECRET")?;
                info!("🔑 Loaded configured signing key (kid={})", key.id());
                Ok(Self::new(key))
            }
            None => Self::ephemeral(),
        }
    }

    /// Replace the signing key. Tokens signed with the previous key stop validating.
    pub fn rotate(&self, key: KeyMaterial) {
        let kid = key.id().to_string();
        *self.current.write() = Arc::new(key);
        info!("🔑 Signing key rotated (kid={})", kid);
    }
}

impl KeyProvider for KeyStore {
    fn current_key(&self) -> Arc<KeyMaterial> {
        self.current.read().clone()
    }
}
