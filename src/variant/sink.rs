//! Write-once sinks.
//!
//! A [`Sink`] is a slot bound to an arena that accepts exactly one value.
//! Sinks decouple *where* a value will live from *who* produces it: a
//! parser can fill sinks handed to it by the consumer without knowing the
//! final container. A sink is either free-standing (from
//! [`Arena::new_sink`](crate::variant::Arena::new_sink)) or embedded in a
//! container position (from [`Array::add_sink`](crate::variant::Array::add_sink)
//! or [`Map::set_sinks`](crate::variant::Map::set_sinks)), in which case the
//! first write updates the parent container. Second writes return `false`
//! and are silently ignored.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::variant::arena::WeakArena;
use crate::variant::value::{Array, Blob, Map, Seed, Variant};

/// A write-once slot for a variant.
#[derive(Clone)]
pub struct Sink {
    arena: WeakArena,
    dest: SinkDest,
    filled: Rc<Cell<bool>>,
}

#[derive(Clone)]
enum SinkDest {
    /// A free-standing slot, readable back through [`Sink::value`].
    Slot(Rc<RefCell<Variant>>),
    /// An element position in an array.
    Element(Array, usize),
    /// The key of a map entry.
    Key(Map, usize),
    /// The value of a map entry.
    Value(Map, usize),
}

impl Sink {
    pub(crate) fn slot(arena: WeakArena) -> Sink {
        Sink {
            arena,
            dest: SinkDest::Slot(Rc::new(RefCell::new(Variant::Null))),
            filled: Rc::new(Cell::new(false)),
        }
    }

    pub(crate) fn element(arena: WeakArena, array: Array, index: usize) -> Sink {
        Sink {
            arena,
            dest: SinkDest::Element(array, index),
            filled: Rc::new(Cell::new(false)),
        }
    }

    pub(crate) fn map_key(arena: WeakArena, map: Map, index: usize) -> Sink {
        Sink {
            arena,
            dest: SinkDest::Key(map, index),
            filled: Rc::new(Cell::new(false)),
        }
    }

    pub(crate) fn map_value(arena: WeakArena, map: Map, index: usize) -> Sink {
        Sink {
            arena,
            dest: SinkDest::Value(map, index),
            filled: Rc::new(Cell::new(false)),
        }
    }

    /// Whether a `set` would currently succeed.
    pub fn can_be_set(&self) -> bool {
        !self.filled.get()
    }

    /// Bind the slot to `value`. Only the first call succeeds; later calls
    /// return `false` and change nothing. Also fails when the destination
    /// container has been frozen in the meantime.
    pub fn set(&self, value: impl Into<Variant>) -> bool {
        if self.filled.get() {
            return false;
        }
        if !self.write(value.into()) {
            return false;
        }
        self.filled.set(true);
        true
    }

    fn write(&self, value: Variant) -> bool {
        match &self.dest {
            SinkDest::Slot(slot) => {
                *slot.borrow_mut() = value;
                true
            }
            SinkDest::Element(array, index) => array.set_element(*index, value),
            SinkDest::Key(map, index) => map.set_key_at(*index, value),
            SinkDest::Value(map, index) => map.set_value_at(*index, value),
        }
    }

    /// The current value of the destination: the slot contents, the array
    /// element, or the map entry side this sink points at.
    pub fn value(&self) -> Variant {
        match &self.dest {
            SinkDest::Slot(slot) => slot.borrow().clone(),
            SinkDest::Element(array, index) => array.get(*index as u32),
            SinkDest::Key(map, index) => map
                .iter()
                .nth(*index)
                .map(|(key, _)| key)
                .unwrap_or(Variant::Null),
            SinkDest::Value(map, index) => map
                .iter()
                .nth(*index)
                .map(|(_, value)| value)
                .unwrap_or(Variant::Null),
        }
    }

    /// Construct a new array in the sink's arena and bind the slot to it.
    pub fn as_array(&self) -> Option<Array> {
        if !self.can_be_set() {
            return None;
        }
        let arena = self.arena.upgrade()?;
        let array = arena.new_array();
        if self.set(Variant::Array(array.clone())) {
            Some(array)
        } else {
            None
        }
    }

    /// Construct a new map in the sink's arena and bind the slot to it.
    pub fn as_map(&self) -> Option<Map> {
        if !self.can_be_set() {
            return None;
        }
        let arena = self.arena.upgrade()?;
        let map = arena.new_map();
        if self.set(Variant::Map(map.clone())) {
            Some(map)
        } else {
            None
        }
    }

    /// Construct a new seed in the sink's arena and bind the slot to it.
    pub fn as_seed(&self) -> Option<Seed> {
        if !self.can_be_set() {
            return None;
        }
        let arena = self.arena.upgrade()?;
        let seed = arena.new_seed();
        if self.set(Variant::Seed(seed.clone())) {
            Some(seed)
        } else {
            None
        }
    }

    /// Construct a mutable blob of the given size in the sink's arena and
    /// bind the slot to it.
    pub fn as_blob(&self, size: usize) -> Option<Blob> {
        if !self.can_be_set() {
            return None;
        }
        let arena = self.arena.upgrade()?;
        let blob = arena.new_mutable_blob(size);
        if self.set(Variant::Blob(blob.clone())) {
            Some(blob)
        } else {
            None
        }
    }

    /// Copy `value` into a new arena string and bind the slot to it.
    pub fn set_string(&self, value: &str) -> bool {
        if !self.can_be_set() {
            return false;
        }
        let arena = match self.arena.upgrade() {
            Some(arena) => arena,
            None => return false,
        };
        self.set(Variant::String(arena.new_string(value)))
    }
}
