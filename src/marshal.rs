//! Marshalling between seeds and native objects.
//!
//! A [`SeedType`] describes how an application type crosses the wire: which
//! header names it, how to build an instance from a decoded generic seed,
//! and how to render an instance back into a seed. A [`Native`] variant
//! pairs an opaque object with its descriptor; both codecs replace natives
//! with their serialized seed on the way out, and the binary reader
//! consults a [`TypeRegistry`] on the way in to turn recognized seeds back
//! into natives.

use std::any::Any;
use std::rc::Rc;

use crate::variant::{Arena, Variant, VariantMap};

/// Marshalling descriptor for one application type.
pub trait SeedType {
    /// The header that identifies this type on the wire.
    fn header(&self) -> Variant;

    /// Build a native variant from a decoded generic seed. Storage for the
    /// result comes from `arena`.
    fn instantiate(&self, seed: Variant, arena: &Arena) -> Variant;

    /// Render a native instance as the variant that goes on the wire in
    /// its place, usually a seed with this type's header.
    fn serialize(&self, object: &Native, arena: &Arena) -> Variant;
}

/// An opaque application object plus its marshalling descriptor.
#[derive(Clone)]
pub struct Native {
    object: Rc<dyn Any>,
    seed_type: Rc<dyn SeedType>,
}

impl Native {
    pub(crate) fn new(object: Rc<dyn Any>, seed_type: Rc<dyn SeedType>) -> Native {
        Native { object, seed_type }
    }

    /// The marshalling descriptor.
    pub fn seed_type(&self) -> &Rc<dyn SeedType> {
        &self.seed_type
    }

    /// Downcast the wrapped object.
    pub fn downcast<T: 'static>(&self) -> Option<Rc<T>> {
        Rc::downcast::<T>(self.object.clone()).ok()
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.object) as *const u8 as usize
    }
}

/// A mapping from seed headers to marshalling descriptors, with an
/// optional fallback registry consulted when a header is not found here.
#[derive(Default)]
pub struct TypeRegistry {
    types: VariantMap<Rc<dyn SeedType>>,
    fallback: Option<Rc<TypeRegistry>>,
}

impl TypeRegistry {
    pub fn new() -> TypeRegistry {
        TypeRegistry::default()
    }

    /// Register a descriptor under its own header.
    pub fn register_type(&mut self, seed_type: Rc<dyn SeedType>) {
        self.types.set(seed_type.header(), seed_type);
    }

    /// Chain another registry behind this one.
    pub fn set_fallback(&mut self, fallback: Rc<TypeRegistry>) {
        self.fallback = Some(fallback);
    }

    /// Resolve a header to a descriptor, consulting the fallback chain.
    pub fn resolve_type(&self, header: &Variant) -> Option<Rc<dyn SeedType>> {
        if let Some(found) = self.types.get(header) {
            return Some(found.clone());
        }
        self.fallback
            .as_ref()
            .and_then(|fallback| fallback.resolve_type(header))
    }
}
