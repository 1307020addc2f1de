//! Application message handlers.

use std::sync::Arc;

/// Maps one request's bytes to one response's bytes.
///
/// Called once per fully reassembled request, on the server's thread. A
/// handler cannot fail from the framing layer's point of view; errors must
/// be encoded into the response by the handler itself.
pub trait Handler: Send + Sync {
    fn handle(&self, request: &[u8]) -> Vec<u8>;
}

impl<F> Handler for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    fn handle(&self, request: &[u8]) -> Vec<u8> {
        self(request)
    }
}

/// Shared handle to a handler; inherited by every connection on a listener.
pub type SharedHandler = Arc<dyn Handler>;

/// Responds with the request unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

impl Handler for EchoHandler {
    fn handle(&self, request: &[u8]) -> Vec<u8> {
        request.to_vec()
    }
}

/// Responds with a fixed prefix followed by the request.
#[derive(Debug, Clone)]
pub struct PrefixHandler {
    prefix: Vec<u8>,
}

impl PrefixHandler {
    pub fn new(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// `ACK:` + request.
    pub fn ack() -> Self {
        Self::new(b"ACK:".to_vec())
    }
}

impl Handler for PrefixHandler {
    fn handle(&self, request: &[u8]) -> Vec<u8> {
        let mut response = Vec::with_capacity(self.prefix.len() + request.len());
        response.extend_from_slice(&self.prefix);
        response.extend_from_slice(request);
        response
    }
}
