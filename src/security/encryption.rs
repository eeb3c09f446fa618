//! Sealed session attributes.
//!
//! Sensitive session attributes are stored sealed: AES-256-GCM over the
//! attribute's JSON text, with the random 96-bit nonce prefixed to the
//! ciphertext and the whole container base64-encoded. Opening fails on
//! tampering, truncation, or a wrong key.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, Key, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::errors::{AuthError, Result};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Environment variable holding the base64-encoded 256-bit sealing key.
pub const KEY_ENV: &str = "AUTH_ATTRIBUTE_ENCRYPTION_KEY";

/// A sealed attribute value: base64 over `nonce || ciphertext || tag`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedAttribute(String);

impl SealedAttribute {
    /// The base64 container.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the base64 container.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl From<String> for SealedAttribute {
    fn from(blob: String) -> Self {
        Self(blob)
    }
}

impl From<&str> for SealedAttribute {
    fn from(blob: &str) -> Self {
        Self(blob.to_string())
    }
}

/// Seals and opens sensitive session attributes with AES-256-GCM.
pub struct AttributeEncryption {
    cipher: Aes256Gcm,
}

impl AttributeEncryption {
    /// Create a sealer from the key in [`KEY_ENV`].
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(KEY_ENV)
            .map_err(|_| AuthError::config(format!("{KEY_ENV} environment variable not set")))?;
        Self::from_base64_key(&key)
    }

    /// Create a sealer from a base64-encoded 256-bit key.
    pub fn from_base64_key(key: &str) -> Result<Self> {
        let key_bytes = BASE64
            .decode(key)
            .map_err(|_| AuthError::config("sealing key is not valid base64"))?;
        if key_bytes.len() != KEY_LEN {
            return Err(AuthError::config("sealing key must be 32 bytes (256 bits)"));
        }
        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes)),
        })
    }

    /// Create a sealer with a fresh random key. Values sealed with it cannot
    /// be opened once the sealer is gone.
    pub fn with_random_key() -> Self {
        Self {
            cipher: Aes256Gcm::new(&Aes256Gcm::generate_key(&mut OsRng)),
        }
    }

    /// Generate a new base64-encoded 256-bit sealing key.
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        BASE64.encode(key)
    }

    /// Seal a plaintext attribute value.
    pub fn seal(&self, plaintext: &str) -> Result<SealedAttribute> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|e| AuthError::crypto(format!("sealing failed: {e}")))?;

        let mut container = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        container.extend_from_slice(&nonce);
        container.extend_from_slice(&ciphertext);
        Ok(SealedAttribute(BASE64.encode(container)))
    }

    /// Open a sealed attribute value.
    pub fn open(&self, sealed: &SealedAttribute) -> Result<String> {
        let container = BASE64
            .decode(&sealed.0)
            .map_err(|_| AuthError::crypto("sealed attribute is not valid base64"))?;
        if container.len() <= NONCE_LEN {
            return Err(AuthError::crypto("sealed attribute is truncated"));
        }

        let (nonce, ciphertext) = container.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AuthError::crypto("failed to open sealed attribute"))?;

        String::from_utf8(plaintext)
            .map_err(|_| AuthError::crypto("opened attribute is not valid UTF-8"))
    }
}
