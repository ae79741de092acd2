//! Secret custody codec.
//!
//! Every key that touches the persistence layer goes through this codec:
//! ChaCha20-Poly1305 under a key derived from the process-wide encryption
//! secret. Plaintext key material never crosses a storage boundary.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum CustodyError {
    #[error("encryption key is not configured")]
    MissingKey,
    #[error("malformed ciphertext: {0}")]
    Malformed(String),
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("encryption failed")]
    EncryptionFailed,
}

pub type CustodyResult<T> = Result<T, CustodyError>;

/// Symmetric codec for secrets at rest.
///
/// The 256-bit cipher key is derived deterministically from the configured
/// secret (SHA-256), so every service instance sharing the secret can read
/// the same records.
pub struct SecretCodec {
    cipher: ChaCha20Poly1305,
}

impl SecretCodec {
    pub fn new(encryption_key: &str) -> CustodyResult<Self> {
        if encryption_key.is_empty() {
            return Err(CustodyError::MissingKey);
        }

        let digest = Sha256::digest(encryption_key.as_bytes());
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&digest));
        Ok(Self { cipher })
    }

    /// Encrypt a secret. Output is base64(nonce || ciphertext) with a fresh
    /// random nonce per call, so encrypting the same secret twice yields
    /// different ciphertexts.
    pub fn encrypt(&self, secret: &str) -> CustodyResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, secret.as_bytes())
            .map_err(|_| CustodyError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> CustodyResult<String> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CustodyError::Malformed(e.to_string()))?;

        if bytes.len() <= NONCE_LEN {
            return Err(CustodyError::Malformed("ciphertext too short".into()));
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CustodyError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|e| CustodyError::Malformed(e.to_string()))
    }
}
