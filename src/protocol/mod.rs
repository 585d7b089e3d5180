//! Wire protocol constants
//!
//! The client↔relay hop carries:
//! ```text
//! +-----------+----------------------------------------------+
//! | SALT (16) | FRAME | FRAME | FRAME | ...                  |
//! +-----------+----------------------------------------------+
//!
//! FRAME:
//! +------------+----------+-------------------------------+
//! | NONCE (12) | LEN (2)  | CIPHERTEXT (LEN, incl. tag)   |
//! +------------+----------+-------------------------------+
//! ```
//! Frames flow in both directions independently. The relay↔service hop is
//! a plain TCP passthrough with no framing.

use crate::crypto::{NONCE_LEN, TAG_LEN};

/// Salt sent in the clear as the first bytes of a new hop
pub const SALT_LEN: usize = 16;

/// Size of the big-endian ciphertext length field
pub const LENGTH_FIELD_LEN: usize = 2;

/// Bytes preceding the ciphertext in every frame
pub const FRAME_HEADER_SIZE: usize = NONCE_LEN + LENGTH_FIELD_LEN;

/// Largest ciphertext a frame can carry
pub const MAX_CIPHERTEXT_LEN: usize = u16::MAX as usize;

/// Largest plaintext that fits in one frame
pub const MAX_PLAINTEXT_LEN: usize = MAX_CIPHERTEXT_LEN - TAG_LEN;

/// Default read size for the plaintext side of a direction.
///
/// Any positive value up to [`MAX_PLAINTEXT_LEN`] is valid; each read
/// becomes one frame.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Default timeout for dialing the relay or the destination service (seconds)
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

/// Default timeout for receiving the salt on a fresh relay connection (seconds)
pub const DEFAULT_HANDSHAKE_TIMEOUT: u64 = 30;
