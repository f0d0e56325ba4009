//! The one-line greeting exchanged over a direct peer connection.
//!
//! Message format: a single ASCII line terminated by `\n`, read with one
//! bounded read. No length prefix, no versioning.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Sent by the dialing side.
pub const CLIENT_GREETING: &str = "hello from client\n";

/// Sent back by the accepting side.
pub const PEER_GREETING: &str = "hello from peer\n";

/// Maximum bytes taken from one read.
pub const MAX_MESSAGE_SIZE: usize = 1024;

/// Read one greeting. Returns `None` if the other side closed without sending anything.
pub async fn read_greeting<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; MAX_MESSAGE_SIZE];
    let n = reader.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&buf[..n]).trim().to_string()))
}

pub async fn write_greeting<W>(writer: &mut W, greeting: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(greeting.as_bytes()).await?;
    writer.flush().await
}
