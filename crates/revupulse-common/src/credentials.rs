//! Credential sealing for provider API keys
//!
//! Seals the provider API key with AES-256-GCM before it reaches persistent
//! storage. This protects the key at rest within a single browser-profile
//! style deployment; it is not a substitute for a real secret store.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;

use crate::{Error, Result};

const NONCE_LEN: usize = 12;

/// Seals and opens provider credentials with a 32-byte key
#[derive(Clone)]
pub struct CredentialSealer {
    cipher: Aes256Gcm,
}

impl CredentialSealer {
    /// Create a sealer from a 32-byte key
    pub fn new(key_bytes: &[u8]) -> Result<Self> {
        if key_bytes.len() != 32 {
            return Err(Error::Credential(format!(
                "AES-256 key must be 32 bytes, got {}",
                key_bytes.len()
            )));
        }
        let key = Key::<Aes256Gcm>::clone_from_slice(key_bytes);
        Ok(Self {
            cipher: Aes256Gcm::new(&key),
        })
    }

    /// Seal `plaintext` into base64(nonce || ciphertext)
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| Error::Credential(format!("seal failed: {}", e)))?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Open base64(nonce || ciphertext) back into the plaintext key
    pub fn open(&self, sealed: &str) -> Result<String> {
        let data = BASE64
            .decode(sealed)
            .map_err(|e| Error::Credential(format!("open failed: {}", e)))?;

        if data.len() < NONCE_LEN {
            return Err(Error::Credential(
                "sealed value too short (missing nonce)".to_string(),
            ));
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| Error::Credential(format!("open failed: {}", e)))?;

        String::from_utf8(plaintext).map_err(|e| Error::Credential(format!("open failed: {}", e)))
    }
}
