//! Length-prefixed message framing for msgplex.
//!
//! Every message on the wire is:
//! - An 8-byte big-endian unsigned payload length
//! - The payload bytes, exactly that many
//!
//! [`Reassembly`] turns arbitrary socket reads back into whole messages;
//! [`FrameReader`] and [`FrameWriter`] drive it over blocking streams.

pub mod codec;
pub mod error;
pub mod reader;
pub mod reassembly;
pub mod writer;

pub use codec::{
    decode, decode_header, encode, encode_frame, FrameConfig, DEFAULT_RECV_CHUNK_SIZE, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use reassembly::{Reassembly, ReassemblyState};
pub use writer::FrameWriter;
