//! Cryptographic primitives for shelfmint.
//!
//! Keypair generation for custodial identities plus the hashing helpers
//! used for idempotency keys.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// A freshly generated custodial keypair.
///
/// The public key is base58 (the address format the minting service
/// expects); the secret key is hex.
pub struct Keypair {
    pub public_key: String,
    pub secret_key: String,
}

/// Generate a new ed25519 keypair from the OS RNG.
pub fn generate_keypair() -> Keypair {
    let signing_key = SigningKey::generate(&mut OsRng);
    let verifying_key = signing_key.verifying_key();

    Keypair {
        public_key: bs58::encode(verifying_key.to_bytes()).into_string(),
        secret_key: hex::encode(signing_key.to_bytes()),
    }
}

/// Compute SHA256 hash of data (hex encoded)
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Deterministic idempotency key for a mint call: the same (owner, isbn)
/// pair always produces the same key, so a retried request cannot create a
/// second token on the external service.
pub fn mint_idempotency_key(owner_public_key: &str, isbn: &str) -> String {
    sha256_hex(format!("{}|{}", owner_public_key, isbn).as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_keypair() {
        let a = generate_keypair();
        let b = generate_keypair();

        assert_ne!(a.public_key, b.public_key);
        assert_ne!(a.secret_key, b.secret_key);
        // 32-byte secret as hex
        assert_eq!(a.secret_key.len(), 64);
        // public key decodes back to 32 bytes
        let decoded = bs58::decode(&a.public_key).into_vec().unwrap();
        assert_eq!(decoded.len(), 32);
    }

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex(b"hello");
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_idempotency_key_deterministic() {
        let k1 = mint_idempotency_key("pubkey", "978-3-16");
        let k2 = mint_idempotency_key("pubkey", "978-3-16");
        let k3 = mint_idempotency_key("pubkey", "978-3-17");

        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }
}
