//! Length-prefixed bincode framing for packets on a byte stream.
//!
//! Each frame is a big-endian `u32` payload length followed by the
//! bincode-encoded [`Packet`].

use crate::Packet;
use bincode::{deserialize, serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bincode error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),
}

/// Serializes a packet into a complete frame, prefix included.
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, CodecError> {
    let payload = serialize(packet)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(payload.len()));
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

pub fn decode_packet(payload: &[u8]) -> Result<Packet, CodecError> {
    Ok(deserialize(payload)?)
}

/// Reads the next frame payload. Returns `Ok(None)` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(packet)?;
    writer.write_all(&frame).await?;
    Ok(())
}
