//! Per-connection reassembly of socket reads into whole messages.
//!
//! State machine:
//! - `AwaitingHeader`: fewer than 8 header bytes buffered
//! - `Accumulating`: header parsed, payload incomplete
//!
//! A message is complete once `declared_length` payload bytes are buffered.
//! Bytes past the end of a message stay buffered as the start of the next one.

use bytes::{Buf, Bytes, BytesMut};

use crate::codec::{decode_header, HEADER_SIZE};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Where the buffer is in the current message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblyState {
    /// No complete length prefix seen yet.
    AwaitingHeader,
    /// Length prefix parsed; waiting for the rest of the payload.
    Accumulating { declared_length: u64 },
}

/// Accumulates raw reads until one complete message is available.
#[derive(Debug)]
pub struct Reassembly {
    buffer: BytesMut,
    state: ReassemblyState,
    max_payload_size: Option<u64>,
}

impl Reassembly {
    pub fn new() -> Self {
        Self::with_max_payload(None)
    }

    /// Reject messages whose declared length exceeds `max_payload_size`.
    pub fn with_max_payload(max_payload_size: Option<u64>) -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: ReassemblyState::AwaitingHeader,
            max_payload_size,
        }
    }

    /// Append one read's worth of bytes and return a message if one is now complete.
    ///
    /// At most one message is returned per call; call
    /// [`next_message`](Self::next_message) to drain any further messages
    /// that arrived in the same read.
    pub fn push(&mut self, data: &[u8]) -> Result<Option<Bytes>> {
        self.extend(data);
        self.next_message()
    }

    /// Append bytes without extracting anything.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete message from bytes already buffered.
    pub fn next_message(&mut self) -> Result<Option<Bytes>> {
        let Some(needed) = self.pending_payload_len()? else {
            return Ok(None);
        };
        if self.buffer.len() < needed {
            return Ok(None);
        }
        let payload = self.buffer.split_to(needed).freeze();
        self.state = ReassemblyState::AwaitingHeader;
        Ok(Some(payload))
    }

    /// True if [`next_message`](Self::next_message) would return a message.
    pub fn has_complete_message(&mut self) -> Result<bool> {
        Ok(self
            .pending_payload_len()?
            .is_some_and(|needed| self.buffer.len() >= needed))
    }

    /// Parse the header if enough bytes are buffered, returning the payload
    /// length of the message in progress.
    fn pending_payload_len(&mut self) -> Result<Option<usize>> {
        if self.state == ReassemblyState::AwaitingHeader {
            if self.buffer.len() < HEADER_SIZE {
                return Ok(None);
            }
            let (declared_length, _) = decode_header(&self.buffer)?;
            if let Some(max) = self.max_payload_size {
                if declared_length > max {
                    return Err(FrameError::PayloadTooLarge {
                        size: declared_length,
                        max,
                    });
                }
            }
            self.buffer.advance(HEADER_SIZE);
            self.state = ReassemblyState::Accumulating { declared_length };
        }

        match self.state {
            ReassemblyState::Accumulating { declared_length } => usize::try_from(declared_length)
                .map(Some)
                .map_err(|_| FrameError::PayloadTooLarge {
                    size: declared_length,
                    max: usize::MAX as u64,
                }),
            ReassemblyState::AwaitingHeader => Ok(None),
        }
    }

    /// Classify an end-of-stream at the current position.
    ///
    /// Returns [`FrameError::PeerClosed`] when nothing of a new message had
    /// arrived, otherwise the protocol violation describing what was cut off.
    pub fn end_of_stream(&self) -> FrameError {
        match self.state {
            ReassemblyState::AwaitingHeader if self.buffer.is_empty() => FrameError::PeerClosed,
            ReassemblyState::AwaitingHeader => FrameError::ShortHeader {
                received: self.buffer.len(),
            },
            ReassemblyState::Accumulating { declared_length } => FrameError::Incomplete {
                received: self.buffer.len() as u64,
                expected: declared_length,
            },
        }
    }

    pub fn state(&self) -> ReassemblyState {
        self.state
    }

    /// True when no part of a message is buffered.
    pub fn is_idle(&self) -> bool {
        self.state == ReassemblyState::AwaitingHeader && self.buffer.is_empty()
    }

    /// Number of buffered bytes not yet handed out.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Drop buffered bytes and start over.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = ReassemblyState::AwaitingHeader;
    }
}

impl Default for Reassembly {
    fn default() -> Self {
        Self::new()
    }
}
