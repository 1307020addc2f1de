use std::path::PathBuf;

/// Errors that can occur in transport operations.
///
/// Every socket-level failure names the step that failed (`socket`, `bind`,
/// `listen`, `connect`, `accept`) and carries the underlying system error.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The socket could not be created.
    #[error("socket() failed for {address}: {source}")]
    Create {
        address: String,
        source: std::io::Error,
    },

    /// Failed to bind to the specified address.
    #[error("bind() failed for {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    /// The bound socket could not be put into listening mode.
    #[error("listen() failed for {address}: {source}")]
    Listen {
        address: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("connect() failed for {address}: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("accept() failed: {0}")]
    Accept(std::io::Error),

    /// The host part of an Internet address did not resolve for the requested family.
    #[error("failed to resolve {address}: {source}")]
    Resolve {
        address: String,
        source: std::io::Error,
    },

    /// The address string could not be parsed.
    #[error("invalid socket address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: &'static str },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },
}

impl TransportError {
    /// The underlying system error, if this error wraps one.
    pub fn io_source(&self) -> Option<&std::io::Error> {
        match self {
            TransportError::Create { source, .. }
            | TransportError::Bind { source, .. }
            | TransportError::Listen { source, .. }
            | TransportError::Connect { source, .. }
            | TransportError::Resolve { source, .. } => Some(source),
            TransportError::Accept(err) | TransportError::Io(err) => Some(err),
            TransportError::InvalidAddress { .. } | TransportError::PathTooLong { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
