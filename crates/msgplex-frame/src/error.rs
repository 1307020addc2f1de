/// Errors that can occur during frame encoding, decoding and reassembly.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The buffer is shorter than the 8-byte length prefix.
    #[error("malformed frame header ({len} bytes, need 8)")]
    MalformedHeader { len: usize },

    /// The stream ended partway through a length prefix.
    #[error("connection closed inside frame header ({received} of 8 bytes)")]
    ShortHeader { received: usize },

    /// The stream ended before the declared payload arrived.
    #[error("connection closed with incomplete frame ({received} of {expected} payload bytes)")]
    Incomplete { received: u64, expected: u64 },

    /// The declared payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: u64 },

    /// The peer closed the connection before sending any part of a frame.
    ///
    /// This is the normal end of a connection, not a protocol violation.
    #[error("peer closed connection")]
    PeerClosed,

    /// Reading from the transport failed.
    #[error("receive failed: {0}")]
    Receive(std::io::Error),

    /// Writing to the transport failed.
    #[error("send failed: {0}")]
    Send(std::io::Error),
}

impl FrameError {
    /// True for [`FrameError::PeerClosed`], the clean end of a connection.
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, FrameError::PeerClosed)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
