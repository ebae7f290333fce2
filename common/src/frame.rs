use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};

/// Size of the little-endian length header in front of every frame
pub const HEADER_LEN: usize = 4;

/// Validate a frame length against the configured maximum
fn check_len(len: usize, max: u32) -> Result<()> {
    if len == 0 {
        return Err(Error::EmptyFrame);
    }
    if len > max as usize {
        return Err(Error::FrameTooLarge { len, max });
    }
    Ok(())
}

/// Write one length-prefixed frame and flush the stream.
///
/// Payloads over `max` are refused before anything reaches the wire.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8], max: u32) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    check_len(payload.len(), max)?;
    let len = payload.len() as u32;

    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame.
///
/// Returns `Ok(None)` when the peer closed the stream before sending any byte.
/// A header announcing zero bytes or more than `max` bytes is an error and the
/// payload is never read.
pub async fn read_frame<R>(reader: &mut R, max: u32) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; HEADER_LEN];
    let first = reader.read(&mut len_buf).await?;
    if first == 0 {
        return Ok(None);
    }
    reader.read_exact(&mut len_buf[first..]).await?;

    let len = u32::from_le_bytes(len_buf) as usize;
    check_len(len, max)?;

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;

    #[tokio::test]
    async fn frame_crosses_a_stream() {
        let (mut a, mut b) = duplex(4096);
        write_frame(&mut a, b"sealed bytes", 1024).await.unwrap();
        let got = read_frame(&mut b, 1024).await.unwrap();
        assert_eq!(got.as_deref(), Some(&b"sealed bytes"[..]));
    }

    #[tokio::test]
    async fn clean_close_reads_as_none() {
        let (a, mut b) = duplex(64);
        drop(a);
        assert!(read_frame(&mut b, 1024).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn truncated_payload_is_transport_error() {
        let (mut a, mut b) = duplex(64);
        a.write_all(&10u32.to_le_bytes()).await.unwrap();
        a.write_all(b"abc").await.unwrap();
        drop(a);
        assert!(matches!(read_frame(&mut b, 1024).await, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn oversized_header_is_rejected() {
        let (mut a, mut b) = duplex(64);
        a.write_all(&4096u32.to_le_bytes()).await.unwrap();
        assert!(matches!(
            read_frame(&mut b, 1024).await,
            Err(Error::FrameTooLarge { len: 4096, max: 1024 })
        ));
    }

    #[tokio::test]
    async fn zero_length_header_is_rejected() {
        let (mut a, mut b) = duplex(64);
        a.write_all(&0u32.to_le_bytes()).await.unwrap();
        assert!(matches!(read_frame(&mut b, 1024).await, Err(Error::EmptyFrame)));
    }

    #[tokio::test]
    async fn writer_refuses_oversized_payload() {
        let (mut a, _b) = duplex(64);
        let payload = vec![1u8; 2048];
        assert!(matches!(
            write_frame(&mut a, &payload, 1024).await,
            Err(Error::FrameTooLarge { len: 2048, max: 1024 })
        ));
    }
}
