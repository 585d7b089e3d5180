//! Frame encoding/decoding for the encrypted hop
//!
//! Frame format:
//! ```text
//! +--------+--------+--------+--------+
//! |          Nonce (12B)              |
//! |                                   |
//! |                                   |
//! +--------+--------+--------+--------+
//! |   Length (2B)   |                 |
//! +--------+--------+                 |
//! |   Ciphertext (Length bytes,       |
//! |   including 16B auth tag)         |
//! +--------+--------+--------+--------+
//! ```

use super::TunnelError;
use crate::crypto::{Cipher, NONCE_LEN};
use crate::protocol::{FRAME_HEADER_SIZE, MAX_CIPHERTEXT_LEN, MAX_PLAINTEXT_LEN};
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// One sealed unit on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Random per-frame nonce
    pub nonce: [u8; NONCE_LEN],
    /// AEAD output: encrypted payload followed by the tag
    pub ciphertext: Vec<u8>,
}

impl Frame {
    /// Encrypt `plaintext` into a frame
    pub fn seal(plaintext: &[u8], cipher: &Cipher) -> Result<Self, TunnelError> {
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(TunnelError::FrameTooLarge(plaintext.len(), MAX_PLAINTEXT_LEN));
        }

        let (ciphertext, nonce) = cipher.seal(plaintext)?;
        Ok(Self { nonce, ciphertext })
    }

    /// Verify and decrypt the frame
    pub fn open(self, cipher: &Cipher) -> Result<Vec<u8>, TunnelError> {
        let mut buffer = self.ciphertext;
        let len = cipher.open_in_place(&self.nonce, &mut buffer)?;
        buffer.truncate(len);
        Ok(buffer)
    }

    /// Read exactly one frame from `reader`.
    ///
    /// End-of-stream anywhere inside the frame yields
    /// [`TunnelError::StreamClosed`].
    pub async fn read_from<R>(reader: &mut R) -> Result<Self, TunnelError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut nonce = [0u8; NONCE_LEN];
        reader
            .read_exact(&mut nonce)
            .await
            .map_err(TunnelError::from_read)?;

        let len = reader.read_u16().await.map_err(TunnelError::from_read)? as usize;

        let mut ciphertext = vec![0u8; len];
        reader
            .read_exact(&mut ciphertext)
            .await
            .map_err(TunnelError::from_read)?;

        Ok(Self { nonce, ciphertext })
    }

    /// Encode frame to bytes
    pub fn encode(&self) -> BytesMut {
        debug_assert!(self.ciphertext.len() <= MAX_CIPHERTEXT_LEN);

        let mut buf = BytesMut::with_capacity(self.encoded_size());
        buf.extend_from_slice(&self.nonce);
        buf.put_u16(self.ciphertext.len() as u16);
        buf.extend_from_slice(&self.ciphertext);
        buf
    }

    /// Get the total encoded size of this frame
    pub fn encoded_size(&self) -> usize {
        FRAME_HEADER_SIZE + self.ciphertext.len()
    }
}

/// Seal `plaintext` into wire-ready frame bytes
pub fn seal_frame(plaintext: &[u8], cipher: &Cipher) -> Result<BytesMut, TunnelError> {
    Ok(Frame::seal(plaintext, cipher)?.encode())
}

/// Read one frame from `reader` and return its plaintext
pub async fn open_frame<R>(reader: &mut R, cipher: &Cipher) -> Result<Vec<u8>, TunnelError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    Frame::read_from(reader).await?.open(cipher)
}

/// Seal `plaintext` and write it to `writer`, splitting it into as many
/// frames as needed.
///
/// Returns the number of frames written.
pub async fn write_sealed<W>(
    writer: &mut W,
    plaintext: &[u8],
    cipher: &Cipher,
) -> Result<usize, TunnelError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut frames = 0;
    for chunk in plaintext.chunks(MAX_PLAINTEXT_LEN) {
        let frame = seal_frame(chunk, cipher)?;
        writer.write_all(&frame).await?;
        frames += 1;
    }
    writer.flush().await?;
    Ok(frames)
}
