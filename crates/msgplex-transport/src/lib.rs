//! Socket address abstraction and stream transports.
//!
//! Provides a unified interface over the two stream transports msgplex runs on:
//! - Unix domain sockets bound to filesystem paths
//! - TCP over IPv4 or IPv6
//!
//! This is the lowest layer of msgplex. Everything else builds on top of
//! the [`IpcStream`] and [`IpcListener`] types provided here.

pub mod address;
pub mod error;
mod inet;
pub mod listener;
pub mod stream;
mod sys;
pub mod uds;

pub use address::{AddressFamily, Domain, SocketAddress};
pub use error::{Result, TransportError};
pub use listener::IpcListener;
pub use stream::IpcStream;
pub use uds::UnixDomainSocket;

/// Default listen backlog.
pub const DEFAULT_BACKLOG: i32 = 4096;
