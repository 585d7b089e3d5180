//! Salt handshake for the client↔relay hop
//!
//! The client derives a key under a fresh salt and sends the salt in the
//! clear as the first bytes of the connection. The relay reads it and
//! derives the same key. There is no acknowledgement: a wrong passphrase
//! only shows up when the first frame fails authentication.

use super::TunnelError;
use crate::crypto::{derive_key, Cipher, Passphrase, Salt};
use crate::protocol::SALT_LEN;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Derive the hop cipher on the blocking pool, off the async workers
async fn derive_cipher(passphrase: &Passphrase, salt: Option<Salt>) -> Result<(Cipher, Salt), TunnelError> {
    let passphrase = passphrase.clone();
    tokio::task::spawn_blocking(move || {
        let (key, salt) = derive_key(&passphrase, salt)?;
        Ok::<_, TunnelError>((Cipher::new(&key)?, salt))
    })
    .await
    .map_err(|e| TunnelError::Io(io::Error::other(e)))?
}

/// Initiator side: generate a salt, send it, and return the hop cipher
pub async fn client_handshake<W>(writer: &mut W, passphrase: &Passphrase) -> Result<Cipher, TunnelError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let (cipher, salt) = derive_cipher(passphrase, None).await?;

    writer.write_all(salt.as_bytes()).await?;
    writer.flush().await?;
    debug!(salt = %salt.to_hex(), "Sent session salt");

    Ok(cipher)
}

/// Responder side: read the salt and return the hop cipher
pub async fn relay_handshake<R>(reader: &mut R, passphrase: &Passphrase) -> Result<Cipher, TunnelError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut salt = [0u8; SALT_LEN];
    reader
        .read_exact(&mut salt)
        .await
        .map_err(TunnelError::from_read)?;

    let salt = Salt(salt);
    debug!(salt = %salt.to_hex(), "Received session salt");

    let (cipher, _) = derive_cipher(passphrase, Some(salt)).await?;
    Ok(cipher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::{open_frame, seal_frame};

    #[tokio::test]
    async fn test_handshake_agrees_on_key() {
        let passphrase = Passphrase::new("correct-horse");
        let (mut client, mut relay) = tokio::io::duplex(1024);

        let client_cipher = client_handshake(&mut client, &passphrase).await.unwrap();
        let relay_cipher = relay_handshake(&mut relay, &passphrase).await.unwrap();

        let frame = seal_frame(b"ping\n", &client_cipher).unwrap();
        client.write_all(&frame).await.unwrap();
        assert_eq!(open_frame(&mut relay, &relay_cipher).await.unwrap(), b"ping\n");
    }

    #[tokio::test]
    async fn test_salt_is_first_on_the_wire() {
        let passphrase = Passphrase::new("correct-horse");
        let mut wire = Vec::new();
        client_handshake(&mut wire, &passphrase).await.unwrap();
        assert_eq!(wire.len(), SALT_LEN);
    }

    #[tokio::test]
    async fn test_mismatched_passphrase_fails_first_frame() {
        let (mut client, mut relay) = tokio::io::duplex(1024);

        let client_cipher = client_handshake(&mut client, &Passphrase::new("correct-horse"))
            .await
            .unwrap();
        let relay_cipher = relay_handshake(&mut relay, &Passphrase::new("wrong-horse"))
            .await
            .unwrap();

        let frame = seal_frame(b"ping\n", &client_cipher).unwrap();
        client.write_all(&frame).await.unwrap();
        assert!(matches!(
            open_frame(&mut relay, &relay_cipher).await,
            Err(TunnelError::AuthenticationFailure)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_handshakes_agree() {
        let passphrase = Passphrase::new("correct-horse");

        let pairs: Vec<_> = (0..16)
            .map(|i| {
                let passphrase = passphrase.clone();
                tokio::spawn(async move {
                    let (mut client, mut relay) = tokio::io::duplex(1024);
                    let client_cipher = client_handshake(&mut client, &passphrase).await.unwrap();
                    let relay_cipher = relay_handshake(&mut relay, &passphrase).await.unwrap();

                    let message = format!("session {}", i);
                    let frame = seal_frame(message.as_bytes(), &client_cipher).unwrap();
                    client.write_all(&frame).await.unwrap();
                    let opened = open_frame(&mut relay, &relay_cipher).await.unwrap();
                    assert_eq!(opened, message.as_bytes());
                })
            })
            .collect();

        for pair in pairs {
            pair.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_short_salt_is_stream_closed() {
        let mut reader = &[1u8, 2, 3][..];
        let result = relay_handshake(&mut reader, &Passphrase::new("x")).await;
        assert!(matches!(result, Err(TunnelError::StreamClosed)));
    }
}
