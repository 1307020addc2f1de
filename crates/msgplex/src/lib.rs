//! Length-prefixed messaging over Unix-domain and TCP stream sockets.
//!
//! Every message is an 8-byte big-endian length followed by that many
//! payload bytes. A single-threaded [`peer::Server`] multiplexes any number
//! of listeners, each with its own handler; [`peer::Client`] is the
//! blocking request/response side.
//!
//! # Crate Structure
//!
//! - [`transport`]: Socket addresses, listeners and streams (Unix, TCP v4/v6)
//! - [`frame`]: Wire codec, reassembly, blocking frame reader/writer
//! - [`peer`]: Handlers, multiplexed server and client (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use msgplex_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use msgplex_frame::*;
}

/// Re-export server and client types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use msgplex_peer::*;
}
