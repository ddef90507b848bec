//! Key Material Primitives
//!
//! Thin wrappers over `ed25519-dalek`, `argon2` and the OS RNG. Callers treat
//! these as opaque: generate a key pair, hash a password, draw random bytes.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use ed25519_dalek::SigningKey;
use rand::RngCore;
use thiserror::Error;

use crate::secret::{SecretBytes, SecretString};
use crate::wallet::types::KeySet;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Stored password hash is malformed: {0}")]
    MalformedHash(String),
}

/// Generate a fresh ed25519 key set
pub fn key_pair() -> KeySet {
    let signing_key = SigningKey::generate(&mut rand::rngs::OsRng);
    let public_key = hex::encode(signing_key.verifying_key().to_bytes());

    KeySet {
        address: public_key.clone(),
        public_key,
        secret_key: SecretString::new(hex::encode(signing_key.to_bytes())),
    }
}

/// Hash a credential into an argon2 PHC string
pub fn hash_password(password: &SecretString) -> Result<String, CryptoError> {
    let salt = SaltString::generate(&mut OsRng);
    password.expose(|p| {
        Argon2::default()
            .hash_password(p.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| CryptoError::Hash(e.to_string()))
    })
}

/// Check a credential against a stored PHC string
pub fn verify_password(password: &SecretString, phc: &str) -> Result<bool, CryptoError> {
    let parsed = PasswordHash::new(phc).map_err(|e| CryptoError::MalformedHash(e.to_string()))?;
    Ok(password.expose(|p| {
        Argon2::default()
            .verify_password(p.as_bytes(), &parsed)
            .is_ok()
    }))
}

pub fn random_bytes(len: usize) -> SecretBytes {
    let mut buf = vec![0u8; len];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    SecretBytes::new(buf)
}

/// Random wallet identifier: `id_<hex>`
pub fn new_id(bytes: usize) -> SecretString {
    random_bytes(bytes).expose(|b| SecretString::new(format!("id_{}", hex::encode(b))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pair_hex_lengths() {
        let ks = key_pair();
        assert_eq!(ks.public_key.len(), 64);
        assert_eq!(ks.address, ks.public_key);
        assert_eq!(ks.secret_key.len(), 64);
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let pw = SecretString::new("correct horse battery staple");
        let phc = hash_password(&pw).unwrap();
        assert!(phc.starts_with("$argon2"));
        assert!(verify_password(&pw, &phc).unwrap());
        assert!(!verify_password(&SecretString::new("wrong"), &phc).unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        let pw = SecretString::new("x");
        assert!(matches!(
            verify_password(&pw, "not-a-phc"),
            Err(CryptoError::MalformedHash(_))
        ));
    }

    #[test]
    fn test_new_id_format() {
        let id = new_id(16);
        id.expose(|s| {
            assert!(s.starts_with("id_"));
            assert_eq!(s.len(), 3 + 32);
        });
    }
}
