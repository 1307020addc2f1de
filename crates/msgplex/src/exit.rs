use std::fmt;
use std::io;

use msgplex_frame::FrameError;
use msgplex_peer::PeerError;
use msgplex_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

/// A failure carrying the process exit code it maps to.
#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for CliError {}

fn io_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    }
}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    CliError::new(io_code(&err), format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::InvalidAddress { .. } => USAGE,
        TransportError::PathTooLong { .. } => USAGE,
        TransportError::Resolve { .. } => TRANSPORT_ERROR,
        other => match other.io_source().map(io_code) {
            Some(PERMISSION_DENIED) => PERMISSION_DENIED,
            Some(TIMEOUT) => TIMEOUT,
            _ => TRANSPORT_ERROR,
        },
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    let code = match &err {
        FrameError::Receive(source) | FrameError::Send(source) => io_code(source),
        FrameError::PayloadTooLarge { .. }
        | FrameError::MalformedHeader { .. }
        | FrameError::ShortHeader { .. }
        | FrameError::Incomplete { .. } => DATA_INVALID,
        FrameError::PeerClosed => FAILURE,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn peer_error(context: &str, err: PeerError) -> CliError {
    match err {
        PeerError::Transport(err) => transport_error(context, err),
        PeerError::Frame(err) => frame_error(context, err),
        PeerError::ListenFailed { .. } => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
        PeerError::NotListening | PeerError::NotConnected => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        PeerError::Wait(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
