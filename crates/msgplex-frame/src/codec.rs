use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Frame header: payload length as an unsigned 64-bit big-endian integer.
pub const HEADER_SIZE: usize = 8;

/// Default number of bytes requested per individual socket read: 64 KiB.
pub const DEFAULT_RECV_CHUNK_SIZE: usize = 64 * 1024;

/// Encode a payload into the wire format, appending to `dst`.
///
/// Wire format:
/// ```text
/// ┌────────────────────┬──────────────────────┐
/// │ Length (8B BE u64) │ Payload (Length B)   │
/// └────────────────────┴──────────────────────┘
/// ```
///
/// There is no terminator, version or checksum; the length is authoritative.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u64(payload.len() as u64);
    dst.put_slice(payload);
}

/// Encode a payload into a freshly allocated wire message.
pub fn encode(payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_frame(payload, &mut buf);
    buf.freeze()
}

/// Split a buffer into its declared payload length and the payload bytes
/// that followed the header in the same buffer.
pub fn decode_header(buf: &[u8]) -> Result<(u64, &[u8])> {
    let Some((header, rest)) = buf.split_first_chunk::<HEADER_SIZE>() else {
        return Err(FrameError::MalformedHeader { len: buf.len() });
    };
    Ok((u64::from_be_bytes(*header), rest))
}

/// Decode one complete wire message.
///
/// Bytes beyond the declared length are ignored.
pub fn decode(buf: &[u8]) -> Result<Bytes> {
    let (declared, rest) = decode_header(buf)?;
    if (rest.len() as u64) < declared {
        return Err(FrameError::Incomplete {
            received: rest.len() as u64,
            expected: declared,
        });
    }
    // `declared <= rest.len()`, so it fits in usize.
    Ok(Bytes::copy_from_slice(&rest[..declared as usize]))
}

/// Configuration for the frame reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Bytes requested per read from the transport. Default: 64 KiB.
    pub recv_chunk_size: usize,
    /// Largest declared payload accepted. Default: unlimited.
    pub max_payload_size: Option<u64>,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            recv_chunk_size: DEFAULT_RECV_CHUNK_SIZE,
            max_payload_size: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
