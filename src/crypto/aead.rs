//! AEAD encryption/decryption
//!
//! AES-256-GCM with a random 12-byte nonce per message and no associated
//! data. Every hop has its own key, so random nonces are enough to keep
//! (key, nonce) pairs unique.

use super::{generate_nonce, CryptoError, SessionKey, NONCE_LEN, TAG_LEN};
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};

/// AEAD cipher bound to one session key.
///
/// Holds no mutable state, so one instance can be shared by both
/// directions of a hop.
pub struct Cipher {
    key: LessSafeKey,
}

impl Cipher {
    /// Create a new cipher from a session key
    pub fn new(key: &SessionKey) -> Result<Self, CryptoError> {
        let unbound_key = UnboundKey::new(&AES_256_GCM, key.as_bytes())
            .map_err(|_| CryptoError::InvalidKeyLength)?;

        Ok(Self {
            key: LessSafeKey::new(unbound_key),
        })
    }

    /// Encrypt data under a fresh random nonce
    ///
    /// Returns the ciphertext (plaintext length + TAG_LEN) and the nonce
    pub fn seal(&self, plaintext: &[u8]) -> Result<(Vec<u8>, [u8; NONCE_LEN]), CryptoError> {
        let nonce = generate_nonce()?;
        let mut buffer = Vec::with_capacity(plaintext.len() + TAG_LEN);
        buffer.extend_from_slice(plaintext);

        self.key
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut buffer)
            .map_err(|_| CryptoError::EncryptionFailure)?;

        Ok((buffer, nonce))
    }

    /// Decrypt data in place, verifying and removing the auth tag
    ///
    /// Returns the plaintext length; the plaintext is `buffer[..len]`
    pub fn open_in_place(
        &self,
        nonce: &[u8; NONCE_LEN],
        buffer: &mut [u8],
    ) -> Result<usize, CryptoError> {
        let plaintext = self
            .key
            .open_in_place(Nonce::assume_unique_for_key(*nonce), Aad::empty(), buffer)
            .map_err(|_| CryptoError::AuthenticationFailure)?;

        Ok(plaintext.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KEY_LEN;

    fn cipher(byte: u8) -> Cipher {
        Cipher::new(&SessionKey::from([byte; KEY_LEN])).unwrap()
    }

    fn open(cipher: &Cipher, nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut buffer = ciphertext.to_vec();
        let len = cipher.open_in_place(nonce, &mut buffer)?;
        buffer.truncate(len);
        Ok(buffer)
    }

    #[test]
    fn test_seal_open() {
        let cipher = cipher(0x42);
        let plaintext = b"Hello, World!";

        let (ciphertext, nonce) = cipher.seal(plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len() + TAG_LEN);

        let decrypted = open(&cipher, &nonce, &ciphertext).unwrap();
        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_empty_plaintext() {
        let cipher = cipher(0x42);
        let (ciphertext, nonce) = cipher.seal(&[]).unwrap();
        assert_eq!(ciphertext.len(), TAG_LEN);
        assert!(open(&cipher, &nonce, &ciphertext).unwrap().is_empty());
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let cipher = cipher(0x42);
        let (ct1, nonce1) = cipher.seal(b"same").unwrap();
        let (ct2, nonce2) = cipher.seal(b"same").unwrap();
        assert_ne!(nonce1, nonce2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn test_tamper_detection() {
        let cipher = cipher(0x42);
        let (ciphertext, nonce) = cipher.seal(b"Hello, World!").unwrap();

        for i in 0..ciphertext.len() {
            let mut tampered = ciphertext.clone();
            tampered[i] ^= 0x01;
            assert!(matches!(
                open(&cipher, &nonce, &tampered),
                Err(CryptoError::AuthenticationFailure)
            ));
        }

        let mut bad_nonce = nonce;
        bad_nonce[0] ^= 0xFF;
        assert!(matches!(
            open(&cipher, &bad_nonce, &ciphertext),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_wrong_key() {
        let (ciphertext, nonce) = cipher(0x42).seal(b"secret").unwrap();
        assert!(matches!(
            open(&cipher(0x43), &nonce, &ciphertext),
            Err(CryptoError::AuthenticationFailure)
        ));
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        let nonce = [0u8; NONCE_LEN];
        assert!(open(&cipher(0x42), &nonce, &[0u8; TAG_LEN - 1]).is_err());
    }
}
