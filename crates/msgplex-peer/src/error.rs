use msgplex_transport::TransportError;

/// Errors that can occur in server and client operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] msgplex_frame::FrameError),

    /// One or more configured listeners could not be set up.
    ///
    /// Listeners that did come up stay live.
    #[error("failed to listen on {} of {total} addresses", .failures.len())]
    ListenFailed {
        total: usize,
        failures: Vec<TransportError>,
    },

    /// The readiness wait failed for a reason other than interruption.
    #[error("readiness wait failed: {0}")]
    Wait(std::io::Error),

    /// `check_messages` was called with no live listener.
    #[error("no listening sockets; call listen() before check_messages()")]
    NotListening,

    /// The client has been disconnected.
    #[error("client is not connected")]
    NotConnected,
}

impl PeerError {
    /// True when the remote side closed the connection between messages.
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, PeerError::Frame(err) if err.is_peer_closed())
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
