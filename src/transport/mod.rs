//! In-memory transport plumbing.
//!
//! Sockets run over anything that implements `std::io::Read` and
//! `std::io::Write`; this module provides the bounded in-memory pipe the
//! tests and examples connect them with.

mod pipe;

pub use pipe::ByteBufferStream;
