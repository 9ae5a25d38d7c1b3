//! Length-prefixed framing over the peer stream.
//!
//! Every logical message is written as a 4-byte big-endian length followed
//! by that many payload bytes. The original design relied on one write
//! mapping to one read, which breaks the moment the OS coalesces two
//! writes into one read buffer; the explicit prefix makes message
//! boundaries independent of read batching.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Upper bound on a single frame's payload. Anything larger is treated as
/// stream corruption, not a legitimate message; the biggest real frame
/// (a full-stage `MonsterUpdate`) is a few kilobytes.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Writes one framed payload.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), TransportError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| TransportError::FrameTooLarge(payload.len()))?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(payload.len()));
    }

    writer
        .write_all(&len.to_be_bytes())
        .await
        .map_err(TransportError::SendFailed)?;
    writer
        .write_all(payload)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)
}

/// Reads the next framed payload.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly at a frame
/// boundary. EOF in the middle of a frame is an error.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<Vec<u8>>, TransportError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Ok(None);
        }
        Err(e) => return Err(TransportError::ReceiveFailed(e)),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(TransportError::ReceiveFailed)?;
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, b"hello").await.unwrap();
        let frame = read_frame(&mut b).await.unwrap().unwrap();
        assert_eq!(frame, b"hello");
    }

    #[tokio::test]
    async fn test_coalesced_writes_stay_separate_messages() {
        // Two frames written back-to-back arrive in one buffer; the
        // exact situation that broke the unframed original. The prefix
        // must split them correctly.
        let (mut a, mut b) = tokio::io::duplex(1024);
        write_frame(&mut a, b"first").await.unwrap();
        write_frame(&mut a, b"second").await.unwrap();

        assert_eq!(read_frame(&mut b).await.unwrap().unwrap(), b"first");
        assert_eq!(read_frame(&mut b).await.unwrap().unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_empty_frame() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, b"").await.unwrap();
        let frame = read_frame(&mut b).await.unwrap().unwrap();
        assert!(frame.is_empty());
    }

    #[tokio::test]
    async fn test_clean_eof_returns_none() {
        let (a, mut b) = tokio::io::duplex(64);
        drop(a);
        assert!(read_frame(&mut b).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_eof_mid_frame_is_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        // Declare 100 bytes but deliver only 3, then hang up.
        use tokio::io::AsyncWriteExt;
        a.write_all(&100u32.to_be_bytes()).await.unwrap();
        a.write_all(b"abc").await.unwrap();
        drop(a);

        assert!(matches!(
            read_frame(&mut b).await,
            Err(TransportError::ReceiveFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_declared_length_is_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        use tokio::io::AsyncWriteExt;
        let bogus = (MAX_FRAME_LEN as u32 + 1).to_be_bytes();
        a.write_all(&bogus).await.unwrap();

        assert!(matches!(
            read_frame(&mut b).await,
            Err(TransportError::FrameTooLarge(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_outbound_payload_is_error() {
        let (mut a, _b) = tokio::io::duplex(64);
        let huge = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(matches!(
            write_frame(&mut a, &huge).await,
            Err(TransportError::FrameTooLarge(_))
        ));
    }
}
