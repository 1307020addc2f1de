//! Multiplexed request/response serving over framed stream sockets.
//!
//! A [`Server`] owns any number of listeners, each bound to its own
//! [`Handler`], and answers every complete request on the connections it
//! accepts from a single thread. [`Client`] is the matching blocking
//! request/response side.

pub mod client;
pub mod error;
pub mod handler;
mod readiness;
pub mod server;

pub use client::{Client, ClientConfig};
pub use error::{PeerError, Result};
pub use handler::{EchoHandler, Handler, PrefixHandler, SharedHandler};
pub use server::{Binding, Server, ServerConfig, DEFAULT_MAX_MESSAGES_PER_CHECK};
