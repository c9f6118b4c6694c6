//! Arena allocation for variants.
//!
//! An [`Arena`] is the factory and owner of every mutable variant built
//! through it. Handles into the arena are cheap reference-counted clones;
//! the arena itself keeps a registry of the composites it created so that
//! teardown can clear their contents, which guarantees that reference
//! cycles between arena values cannot outlive the arena.
//!
//! Arenas also carry two auxiliary ownership mechanisms used by the socket
//! and RPC layers:
//!
//! - *cleanups*: callbacks run in registration order when the last arena
//!   handle is dropped,
//! - *adoption*: an arena may adopt another arena, extending the adoptee's
//!   lifetime to its own. The RPC layer uses this to keep a decoded
//!   response alive inside the promise that carries it.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::marshal::{Native, SeedType};
use crate::variant::sink::Sink;
use crate::variant::value::{Array, Blob, Charset, Map, Seed, Text, Variant};

/// A reference-counted allocation region for variants.
///
/// Cloning an `Arena` produces another handle to the same region. The
/// region is torn down when the last handle is dropped.
///
/// # Example
///
/// ```
/// use plankton::variant::{Arena, Variant};
///
/// let arena = Arena::new();
/// let array = arena.new_array();
/// array.add(8);
/// array.add(Variant::string("foo"));
/// assert_eq!(array.length(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Arena {
    inner: Rc<ArenaInner>,
}

#[derive(Default)]
struct ArenaInner {
    /// Composites allocated here, cleared at teardown to break cycles.
    composites: RefCell<Vec<Variant>>,
    /// Cleanup callbacks, run in registration order at teardown.
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
    /// Arenas whose lifetime this arena extends.
    adopted: RefCell<Vec<Arena>>,
}

impl Drop for ArenaInner {
    fn drop(&mut self) {
        for cleanup in self.cleanups.take() {
            cleanup();
        }
        self.adopted.borrow_mut().clear();
        for value in self.composites.take() {
            value.clear_for_teardown();
        }
    }
}

/// A non-owning arena reference stored inside container values, so the
/// containers themselves do not keep their arena alive.
#[derive(Clone, Default)]
pub(crate) struct WeakArena {
    inner: Weak<ArenaInner>,
}

impl WeakArena {
    pub(crate) fn upgrade(&self) -> Option<Arena> {
        self.inner.upgrade().map(|inner| Arena { inner })
    }
}

impl Arena {
    /// Create a new empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn downgrade(&self) -> WeakArena {
        WeakArena {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn register(&self, value: Variant) {
        self.inner.composites.borrow_mut().push(value);
    }

    /// Create a new mutable array.
    pub fn new_array(&self) -> Array {
        self.new_array_with_capacity(8)
    }

    /// Create a new mutable array with room for `capacity` elements.
    pub fn new_array_with_capacity(&self, capacity: usize) -> Array {
        let array = Array::new_in(self.downgrade(), capacity);
        self.register(Variant::Array(array.clone()));
        array
    }

    /// Create a new mutable map.
    pub fn new_map(&self) -> Map {
        let map = Map::new_in(self.downgrade());
        self.register(Variant::Map(map.clone()));
        map
    }

    /// Create a new mutable seed with a null header and an empty field map.
    pub fn new_seed(&self) -> Seed {
        let fields = self.new_map();
        let seed = Seed::new_with_fields(fields);
        self.register(Variant::Seed(seed.clone()));
        seed
    }

    /// Create a frozen arena-owned string with the default encoding.
    pub fn new_string(&self, value: &str) -> Text {
        self.new_string_with_encoding(value.as_bytes(), Charset::UTF_8)
    }

    /// Create a frozen arena-owned string with the given encoding.
    pub fn new_string_with_encoding(&self, bytes: &[u8], encoding: Charset) -> Text {
        Text::new_arena(bytes.to_vec(), encoding, true)
    }

    /// Create a mutable zero-filled string of the given length. Use
    /// [`Variant::string_set`] to fill it and [`Variant::ensure_frozen`]
    /// once done.
    pub fn new_mutable_string(&self, length: usize) -> Text {
        Text::new_arena(vec![0; length], Charset::UTF_8, false)
    }

    /// Create a frozen arena-owned blob holding a copy of `data`.
    pub fn new_blob(&self, data: &[u8]) -> Blob {
        Blob::new_arena(data.to_vec(), true)
    }

    /// Create a mutable zero-filled blob of the given size.
    pub fn new_mutable_blob(&self, size: usize) -> Blob {
        Blob::new_arena(vec![0; size], false)
    }

    /// Wrap a native object together with its marshalling descriptor.
    pub fn new_native<T: 'static>(&self, object: T, seed_type: Rc<dyn SeedType>) -> Native {
        Native::new(Rc::new(object), seed_type)
    }

    /// Create a write-once sink whose value can be read back with
    /// [`Sink::value`].
    pub fn new_sink(&self) -> Sink {
        Sink::slot(self.downgrade())
    }

    /// Schedule a callback to run when this arena is torn down. Callbacks
    /// run in registration order.
    pub fn register_cleanup(&self, cleanup: impl FnOnce() + 'static) {
        self.inner.cleanups.borrow_mut().push(Box::new(cleanup));
    }

    /// Extend the given arena's lifetime to at least this arena's.
    pub fn adopt_ownership(&self, owner: &Arena) {
        self.inner.adopted.borrow_mut().push(owner.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_cleanups_run_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        {
            let arena = Arena::new();
            for i in 0..3 {
                let log = log.clone();
                arena.register_cleanup(move || log.borrow_mut().push(i));
            }
        }
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_adopted_arena_outlives_adopter_scope() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let adoptee = Arena::new();
        {
            let log = log.clone();
            adoptee.register_cleanup(move || log.borrow_mut().push("adoptee"));
        }
        {
            let owner = Arena::new();
            {
                let log = log.clone();
                owner.register_cleanup(move || log.borrow_mut().push("owner"));
            }
            owner.adopt_ownership(&adoptee);
            drop(adoptee);
            assert!(log.borrow().is_empty());
        }
        // The owner's own cleanup runs before the adopted arena is released.
        assert_eq!(*log.borrow(), vec!["owner", "adoptee"]);
    }

    #[test]
    fn test_teardown_breaks_cycles() {
        let arena = Arena::new();
        let array = arena.new_array();
        assert!(array.add(Variant::Array(array.clone())));
        assert_eq!(array.length(), 1);
        drop(arena);
        // The handle is still usable but the contents are gone and the
        // husk is frozen.
        assert_eq!(array.length(), 0);
        assert!(!array.add(1));
    }

    #[test]
    fn test_clone_is_same_region() {
        let arena = Arena::new();
        let alias = arena.clone();
        let array = alias.new_array();
        drop(alias);
        assert!(array.add(4));
        drop(arena);
        assert!(!array.add(5));
    }
}
