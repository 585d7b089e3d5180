//! Key Derivation Functions
//!
//! Provides PBKDF2-HMAC-SHA256 for stretching the shared passphrase into a
//! session key. Both endpoints must agree on the hash and iteration count;
//! a mismatch produces different keys with no negotiation to catch it.

use super::{CryptoError, Passphrase, Salt, SessionKey, KEY_LEN};
use ring::pbkdf2::{self, PBKDF2_HMAC_SHA256};
use std::num::NonZeroU32;

/// PBKDF2 iteration count shared by both ends of a hop
pub const PBKDF2_ITERATIONS: NonZeroU32 = match NonZeroU32::new(4096) {
    Some(n) => n,
    None => unreachable!(),
};

/// Derive a session key from a passphrase and salt
///
/// # Arguments
/// * `passphrase` - Shared secret
/// * `salt` - Salt received from the peer, or `None` to generate a fresh one
///
/// # Returns
/// The derived key and the salt it was derived with
pub fn derive_key(
    passphrase: &Passphrase,
    salt: Option<Salt>,
) -> Result<(SessionKey, Salt), CryptoError> {
    let salt = match salt {
        Some(s) => s,
        None => Salt::generate()?,
    };

    let key = stretch(passphrase.as_bytes(), salt.as_bytes());
    Ok((key, salt))
}

fn stretch(secret: &[u8], salt: &[u8]) -> SessionKey {
    let mut out = [0u8; KEY_LEN];
    pbkdf2::derive(PBKDF2_HMAC_SHA256, PBKDF2_ITERATIONS, salt, secret, &mut out);
    SessionKey::from(out)
}
