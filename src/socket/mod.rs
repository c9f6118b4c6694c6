//! Framed socket: multiplexed value frames over a byte stream.
//!
//! An [`OutputSocket`] serializes whole variants into length-prefixed,
//! 8-byte-aligned frames keyed by a stream id; an [`InputSocket`]
//! incrementally reads those frames and routes each to the
//! [`InputStream`] registered for its id. The root stream exists on every
//! socket and is where values sent without an explicit id arrive.
//!
//! The byte stream underneath is anything implementing `std::io::Read` /
//! `std::io::Write`; sockets never block except inside those calls.

mod input;
mod output;

pub use input::{
    BufferInputStream, InputSocket, InputStream, InputStreamFactory, MessageAction, ParsedMessage,
    PushInputStream, StreamConfig, StreamId,
};
pub use output::OutputSocket;

/// Every plankton stream starts with these eight bytes.
pub const STREAM_MAGIC: [u8; 8] = [b'p', b't', 0xF6, b'n', 0, 0, 0, 0];

/// Directive: the varint that follows is the sender's default string
/// encoding.
pub(crate) const SET_DEFAULT_STRING_ENCODING: u8 = 1;

/// Directive: a stream-id frame and a value frame follow.
pub(crate) const SEND_VALUE: u8 = 2;

/// The single byte of the root stream id, the binary opcode for `Null`.
pub(crate) const ROOT_STREAM_ID_BYTE: u8 = crate::binary::opcode::NULL;
