//! Variant data model: arenas, values, and sinks.
//!
//! This module owns value storage. The three pieces fit together like
//! this:
//!
//! - [`Arena`] — reference-counted allocation region; every mutable value
//!   is built through one and lives exactly as long as it does.
//! - [`Variant`] — the discriminated value itself, a cheap handle.
//! - [`Sink`] — a write-once slot a producer fills without knowing where
//!   the value ends up.
//!
//! # Example
//!
//! ```
//! use plankton::variant::{Arena, Variant};
//!
//! let arena = Arena::new();
//! let map = arena.new_map();
//! map.set("status", "ok");
//! map.set("count", 3);
//! map.ensure_frozen();
//! assert!(!map.set("late", 1));
//! assert_eq!(map.get(&"count".into()), Variant::integer(3));
//! ```

mod arena;
mod sink;
mod value;

pub(crate) use arena::WeakArena;

pub use arena::Arena;
pub use sink::Sink;
pub use value::{Array, Blob, Charset, Id, Kind, Map, MapIter, Seed, Text, Variant, VariantMap};
