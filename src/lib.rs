//! # plankton
//!
//! A self-describing data-interchange format in three tightly linked
//! layers:
//!
//! - **Variants** ([`variant`]): a dynamically-typed value model with
//!   arena-based ownership and a one-way freezing contract.
//! - **Codecs** ([`binary`], [`text`]): a compact binary wire encoding
//!   that preserves shared structure, and an ASCII companion for
//!   debugging and round-trip comparison.
//! - **Transport** ([`socket`], [`rpc`]): framed, multiplexed value
//!   streams over any byte channel, with request/response correlation
//!   and method dispatch on top.
//!
//! The core is single-threaded and cooperative: every encode/decode step
//! runs synchronously on the calling thread, and the only suspension
//! points are the underlying `Read`/`Write` calls. Different sockets may
//! be driven from different threads.
//!
//! ## Example
//!
//! ```
//! use plankton::binary::{BinaryReader, BinaryWriter};
//! use plankton::variant::{Arena, Variant};
//!
//! let arena = Arena::new();
//! let map = arena.new_map();
//! map.set("status", "ok");
//! map.set("count", 3);
//!
//! let mut writer = BinaryWriter::new();
//! writer.write(&Variant::Map(map));
//!
//! let decoder_arena = Arena::new();
//! let decoded = BinaryReader::new(&decoder_arena).parse(writer.data());
//! assert_eq!(decoded.map_get(&"count".into()), Variant::integer(3));
//! ```

pub mod binary;
pub mod error;
pub mod marshal;
pub mod rpc;
pub mod socket;
pub mod text;
pub mod transport;
pub mod variant;

pub use error::{PlanktonError, Result};
pub use variant::{Arena, Variant};
