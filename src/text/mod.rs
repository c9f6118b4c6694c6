//! Text codec: a 7-bit ASCII form for debugging and round-trip equality.
//!
//! The grammar uses `%f`/`%t`/`%n` for the singletons, bare integers,
//! quoted or unquoted strings, `%[...]` base64 blobs, `[...]` arrays,
//! `{...}` maps, `@header{...}` seeds and `~hex` ids. The reader also
//! accepts `#` comments, trailing commas and whitespace inside blobs.
//!
//! # Example
//!
//! ```
//! use plankton::text::{TextReader, TextWriter};
//! use plankton::variant::{Arena, Variant};
//!
//! let arena = Arena::new();
//! let mut reader = TextReader::new(&arena);
//! let value = reader.parse("{answer: 42}");
//! assert_eq!(value.map_get(&"answer".into()), Variant::integer(42));
//!
//! let mut writer = TextWriter::new();
//! writer.write(&value);
//! assert_eq!(writer.as_str(), "{answer: 42}");
//! ```

mod reader;
mod writer;

pub use reader::{SyntaxError, TextReader};
pub use writer::TextWriter;
