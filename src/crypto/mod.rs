//! Cryptographic primitives for the encrypted hop
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 key stretching from a shared passphrase
//! - AES-256-GCM AEAD with a fresh random nonce per message
//! - Secure random number generation

mod aead;
mod kdf;
mod keys;

pub use aead::Cipher;
pub use kdf::{derive_key, PBKDF2_ITERATIONS};
pub use keys::{Passphrase, Salt, SessionKey};

use thiserror::Error;

/// Length of symmetric key in bytes
pub const KEY_LEN: usize = 32;

/// Length of nonce in bytes
pub const NONCE_LEN: usize = 12;

/// Length of authentication tag in bytes
pub const TAG_LEN: usize = 16;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Secure random source unavailable")]
    RandomSourceUnavailable,

    #[error("Invalid key length")]
    InvalidKeyLength,

    #[error("Encryption failed")]
    EncryptionFailure,

    #[error("Authentication failed")]
    AuthenticationFailure,
}

/// Fill `buf` with cryptographically secure random bytes
pub fn random_bytes(buf: &mut [u8]) -> Result<(), CryptoError> {
    use ring::rand::{SecureRandom, SystemRandom};
    let rng = SystemRandom::new();
    rng.fill(buf).map_err(|_| CryptoError::RandomSourceUnavailable)
}

/// Generate a random nonce
pub fn generate_nonce() -> Result<[u8; NONCE_LEN], CryptoError> {
    let mut nonce = [0u8; NONCE_LEN];
    random_bytes(&mut nonce)?;
    Ok(nonce)
}
