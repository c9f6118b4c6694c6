//! The variant value model.
//!
//! A [`Variant`] is a discriminated value: a scalar (`Null`, `Bool`,
//! `Integer`, `Id`), a byte sequence (`String`, `Blob`), a composite
//! (`Array`, `Map`, `Seed`), or an opaque [`Native`] wrapper. Composites
//! are handles into an [`Arena`](crate::variant::Arena); cloning a variant
//! clones the handle, not the value, so composites compare by identity
//! while scalars and byte sequences compare by content.
//!
//! Strings and blobs come in two flavors: *external* values wrap
//! caller-supplied [`Bytes`] and are permanently frozen; *arena* values
//! own their storage and stay mutable until frozen. Freezing is a one-way
//! transition; once a value is frozen every mutating operation returns
//! `false` and leaves it unchanged.
//!
//! Kind-specific accessors return a typed default on kind mismatch rather
//! than failing: `integer_value` of a string is 0, `array_length` of an
//! integer is 0, and so on. This keeps decoding pipelines total; callers
//! that care check [`Variant::kind`] first.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bytes::Bytes;

use crate::marshal::Native;
use crate::variant::arena::WeakArena;
use crate::variant::sink::Sink;

/// A string encoding, by IANA MIB enum value. The set is open; only the
/// constants below are named.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Charset(pub u32);

impl Charset {
    /// No valid charset. Zero is reserved so it can double as a null value.
    pub const NONE: Charset = Charset(0);
    pub const US_ASCII: Charset = Charset(3);
    pub const SHIFT_JIS: Charset = Charset(17);
    pub const UTF_8: Charset = Charset(106);

    /// The encoding assumed for strings that do not carry one.
    pub fn default_string_encoding() -> Charset {
        Charset::UTF_8
    }
}

/// An identity token: a declared bit size (8, 16, 32 or 64) and a 64-bit
/// payload. Ids of different sizes are distinct even when the payloads
/// match.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Id {
    size: u32,
    value: u64,
}

impl Id {
    pub fn new(size: u32, value: u64) -> Id {
        Id { size, value }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }
}

/// The kind of a variant, as reported by [`Variant::kind`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Kind {
    Null,
    Bool,
    Integer,
    Id,
    String,
    Blob,
    Array,
    Map,
    Seed,
    Native,
}

// ---------------------------------------------------------------------------
// Strings and blobs
// ---------------------------------------------------------------------------

pub(crate) struct TextData {
    bytes: Vec<u8>,
    encoding: Charset,
    frozen: bool,
}

/// A string variant: length-delimited bytes plus a character set.
#[derive(Clone)]
pub struct Text {
    repr: TextRepr,
}

#[derive(Clone)]
enum TextRepr {
    /// Caller-owned bytes in the default encoding; always frozen.
    External(Bytes),
    /// Arena-owned storage, mutable until frozen.
    Arena(Rc<RefCell<TextData>>),
}

impl Text {
    pub(crate) fn external(bytes: Bytes) -> Text {
        Text {
            repr: TextRepr::External(bytes),
        }
    }

    pub(crate) fn new_arena(bytes: Vec<u8>, encoding: Charset, frozen: bool) -> Text {
        Text {
            repr: TextRepr::Arena(Rc::new(RefCell::new(TextData {
                bytes,
                encoding,
                frozen,
            }))),
        }
    }

    /// Length in bytes.
    pub fn length(&self) -> u32 {
        match &self.repr {
            TextRepr::External(bytes) => bytes.len() as u32,
            TextRepr::Arena(data) => data.borrow().bytes.len() as u32,
        }
    }

    pub fn encoding(&self) -> Charset {
        match &self.repr {
            TextRepr::External(_) => Charset::default_string_encoding(),
            TextRepr::Arena(data) => data.borrow().encoding,
        }
    }

    /// The contents as a cheap or copied byte handle.
    pub fn bytes(&self) -> Bytes {
        match &self.repr {
            TextRepr::External(bytes) => bytes.clone(),
            TextRepr::Arena(data) => Bytes::copy_from_slice(&data.borrow().bytes),
        }
    }

    /// Replace the contents. Fails on frozen strings.
    pub fn set(&self, bytes: &[u8]) -> bool {
        match &self.repr {
            TextRepr::External(_) => false,
            TextRepr::Arena(data) => {
                let mut data = data.borrow_mut();
                if data.frozen {
                    return false;
                }
                data.bytes.clear();
                data.bytes.extend_from_slice(bytes);
                true
            }
        }
    }

    pub fn is_frozen(&self) -> bool {
        match &self.repr {
            TextRepr::External(_) => true,
            TextRepr::Arena(data) => data.borrow().frozen,
        }
    }

    pub fn ensure_frozen(&self) {
        if let TextRepr::Arena(data) = &self.repr {
            data.borrow_mut().frozen = true;
        }
    }

    pub(crate) fn identity(&self) -> Option<usize> {
        match &self.repr {
            TextRepr::External(_) => None,
            TextRepr::Arena(data) => Some(Rc::as_ptr(data) as usize),
        }
    }
}

pub(crate) struct BlobData {
    bytes: Vec<u8>,
    frozen: bool,
}

/// A blob variant: an opaque byte sequence.
#[derive(Clone)]
pub struct Blob {
    repr: BlobRepr,
}

#[derive(Clone)]
enum BlobRepr {
    External(Bytes),
    Arena(Rc<RefCell<BlobData>>),
}

impl Blob {
    pub(crate) fn external(bytes: Bytes) -> Blob {
        Blob {
            repr: BlobRepr::External(bytes),
        }
    }

    pub(crate) fn new_arena(bytes: Vec<u8>, frozen: bool) -> Blob {
        Blob {
            repr: BlobRepr::Arena(Rc::new(RefCell::new(BlobData { bytes, frozen }))),
        }
    }

    /// Size in bytes.
    pub fn size(&self) -> u32 {
        match &self.repr {
            BlobRepr::External(bytes) => bytes.len() as u32,
            BlobRepr::Arena(data) => data.borrow().bytes.len() as u32,
        }
    }

    /// The contents as a cheap or copied byte handle.
    pub fn data(&self) -> Bytes {
        match &self.repr {
            BlobRepr::External(bytes) => bytes.clone(),
            BlobRepr::Arena(data) => Bytes::copy_from_slice(&data.borrow().bytes),
        }
    }

    /// Replace the contents. Fails on frozen blobs.
    pub fn set(&self, bytes: &[u8]) -> bool {
        match &self.repr {
            BlobRepr::External(_) => false,
            BlobRepr::Arena(data) => {
                let mut data = data.borrow_mut();
                if data.frozen {
                    return false;
                }
                data.bytes.clear();
                data.bytes.extend_from_slice(bytes);
                true
            }
        }
    }

    pub fn is_frozen(&self) -> bool {
        match &self.repr {
            BlobRepr::External(_) => true,
            BlobRepr::Arena(data) => data.borrow().frozen,
        }
    }

    pub fn ensure_frozen(&self) {
        if let BlobRepr::Arena(data) = &self.repr {
            data.borrow_mut().frozen = true;
        }
    }

    pub(crate) fn identity(&self) -> Option<usize> {
        match &self.repr {
            BlobRepr::External(_) => None,
            BlobRepr::Arena(data) => Some(Rc::as_ptr(data) as usize),
        }
    }
}

// ---------------------------------------------------------------------------
// Arrays
// ---------------------------------------------------------------------------

pub(crate) struct ArrayData {
    elements: Vec<Variant>,
    frozen: bool,
    arena: WeakArena,
}

/// An ordered sequence of variants. Compares by identity.
#[derive(Clone)]
pub struct Array {
    data: Rc<RefCell<ArrayData>>,
}

impl Array {
    pub(crate) fn new_in(arena: WeakArena, capacity: usize) -> Array {
        Array {
            data: Rc::new(RefCell::new(ArrayData {
                elements: Vec::with_capacity(capacity),
                frozen: false,
                arena,
            })),
        }
    }

    pub fn length(&self) -> u32 {
        self.data.borrow().elements.len() as u32
    }

    /// The element at `index`, or `Null` when out of range.
    pub fn get(&self, index: u32) -> Variant {
        self.data
            .borrow()
            .elements
            .get(index as usize)
            .cloned()
            .unwrap_or(Variant::Null)
    }

    /// Append an element. Fails on frozen arrays.
    pub fn add(&self, value: impl Into<Variant>) -> bool {
        let mut data = self.data.borrow_mut();
        if data.frozen {
            return false;
        }
        data.elements.push(value.into());
        true
    }

    /// Append a null element and return a write-once sink for it. The sink
    /// updates this array on its first (and only) write.
    pub fn add_sink(&self) -> Option<Sink> {
        let arena = self.data.borrow().arena.clone();
        let index = {
            let mut data = self.data.borrow_mut();
            if data.frozen {
                return None;
            }
            data.elements.push(Variant::Null);
            data.elements.len() - 1
        };
        Some(Sink::element(arena, self.clone(), index))
    }

    pub(crate) fn set_element(&self, index: usize, value: Variant) -> bool {
        let mut data = self.data.borrow_mut();
        if data.frozen || index >= data.elements.len() {
            return false;
        }
        data.elements[index] = value;
        true
    }

    pub fn is_frozen(&self) -> bool {
        self.data.borrow().frozen
    }

    pub fn ensure_frozen(&self) {
        self.data.borrow_mut().frozen = true;
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.data) as usize
    }

    pub(crate) fn clear_for_teardown(&self) {
        let mut data = self.data.borrow_mut();
        data.elements.clear();
        data.frozen = true;
    }
}

// ---------------------------------------------------------------------------
// Maps
// ---------------------------------------------------------------------------

pub(crate) struct MapData {
    entries: Vec<(Variant, Variant)>,
    frozen: bool,
    arena: WeakArena,
}

/// An insertion-ordered sequence of key/value pairs. Duplicate keys are
/// permitted; lookup returns the first match. Compares by identity.
#[derive(Clone)]
pub struct Map {
    data: Rc<RefCell<MapData>>,
}

impl Map {
    pub(crate) fn new_in(arena: WeakArena) -> Map {
        Map {
            data: Rc::new(RefCell::new(MapData {
                entries: Vec::new(),
                frozen: false,
                arena,
            })),
        }
    }

    pub fn size(&self) -> u32 {
        self.data.borrow().entries.len() as u32
    }

    /// First-match lookup; `Null` when the key is absent.
    pub fn get(&self, key: &Variant) -> Variant {
        self.get_or(key, Variant::Null)
    }

    /// First-match lookup with an explicit default.
    pub fn get_or(&self, key: &Variant, default: Variant) -> Variant {
        self.data
            .borrow()
            .entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or(default)
    }

    pub fn has(&self, key: &Variant) -> bool {
        self.data.borrow().entries.iter().any(|(k, _)| k == key)
    }

    /// Append an entry. Fails on frozen maps. A duplicate key shadows, it
    /// does not replace.
    pub fn set(&self, key: impl Into<Variant>, value: impl Into<Variant>) -> bool {
        let mut data = self.data.borrow_mut();
        if data.frozen {
            return false;
        }
        data.entries.push((key.into(), value.into()));
        true
    }

    /// Append a null entry and return write-once sinks for its key and
    /// value.
    pub fn set_sinks(&self) -> Option<(Sink, Sink)> {
        let arena = self.data.borrow().arena.clone();
        let index = {
            let mut data = self.data.borrow_mut();
            if data.frozen {
                return None;
            }
            data.entries.push((Variant::Null, Variant::Null));
            data.entries.len() - 1
        };
        Some((
            Sink::map_key(arena.clone(), self.clone(), index),
            Sink::map_value(arena, self.clone(), index),
        ))
    }

    pub(crate) fn set_key_at(&self, index: usize, key: Variant) -> bool {
        let mut data = self.data.borrow_mut();
        if data.frozen || index >= data.entries.len() {
            return false;
        }
        data.entries[index].0 = key;
        true
    }

    pub(crate) fn set_value_at(&self, index: usize, value: Variant) -> bool {
        let mut data = self.data.borrow_mut();
        if data.frozen || index >= data.entries.len() {
            return false;
        }
        data.entries[index].1 = value;
        true
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> MapIter {
        MapIter {
            map: self.clone(),
            cursor: 0,
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.data.borrow().frozen
    }

    pub fn ensure_frozen(&self) {
        self.data.borrow_mut().frozen = true;
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.data) as usize
    }

    pub(crate) fn clear_for_teardown(&self) {
        let mut data = self.data.borrow_mut();
        data.entries.clear();
        data.frozen = true;
    }
}

/// Iterator over map entries, insertion order.
pub struct MapIter {
    map: Map,
    cursor: usize,
}

impl Iterator for MapIter {
    type Item = (Variant, Variant);

    fn next(&mut self) -> Option<(Variant, Variant)> {
        let data = self.map.data.borrow();
        let entry = data.entries.get(self.cursor).cloned();
        drop(data);
        if entry.is_some() {
            self.cursor += 1;
        }
        entry
    }
}

// ---------------------------------------------------------------------------
// Seeds
// ---------------------------------------------------------------------------

pub(crate) struct SeedData {
    header: Variant,
    fields: Map,
    frozen: bool,
}

/// A named record: a header variant plus an ordered field map. Compares by
/// identity.
#[derive(Clone)]
pub struct Seed {
    data: Rc<RefCell<SeedData>>,
}

impl Seed {
    pub(crate) fn new_with_fields(fields: Map) -> Seed {
        Seed {
            data: Rc::new(RefCell::new(SeedData {
                header: Variant::Null,
                fields,
                frozen: false,
            })),
        }
    }

    pub fn header(&self) -> Variant {
        self.data.borrow().header.clone()
    }

    /// Replace the header. Fails once the seed is frozen.
    pub fn set_header(&self, value: impl Into<Variant>) -> bool {
        let mut data = self.data.borrow_mut();
        if data.frozen {
            return false;
        }
        data.header = value.into();
        true
    }

    pub fn get_field(&self, key: &Variant) -> Variant {
        self.data.borrow().fields.get(key)
    }

    pub fn set_field(&self, key: impl Into<Variant>, value: impl Into<Variant>) -> bool {
        self.data.borrow().fields.set(key, value)
    }

    pub fn field_count(&self) -> u32 {
        self.data.borrow().fields.size()
    }

    /// The field map itself.
    pub fn fields(&self) -> Map {
        self.data.borrow().fields.clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.data.borrow().frozen
    }

    /// Freeze this seed and, transitively, its field map.
    pub fn ensure_frozen(&self) {
        let mut data = self.data.borrow_mut();
        data.fields.ensure_frozen();
        data.frozen = true;
    }

    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.data) as usize
    }

    pub(crate) fn clear_for_teardown(&self) {
        let mut data = self.data.borrow_mut();
        data.header = Variant::Null;
        data.frozen = true;
    }
}

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

/// A discriminated value, the currency of the format.
#[derive(Clone, Default)]
pub enum Variant {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Id(Id),
    String(Text),
    Blob(Blob),
    Array(Array),
    Map(Map),
    Seed(Seed),
    Native(Native),
}

impl Variant {
    /// The null singleton.
    pub fn null() -> Variant {
        Variant::Null
    }

    pub fn boolean(value: bool) -> Variant {
        Variant::Bool(value)
    }

    pub fn integer(value: i64) -> Variant {
        Variant::Integer(value)
    }

    /// An external string. The bytes are borrowed as-is and the value is
    /// permanently frozen.
    pub fn string(value: impl Into<Bytes>) -> Variant {
        Variant::String(Text::external(value.into()))
    }

    /// An external blob. `Bytes::from_static` input keeps its address.
    pub fn blob(data: impl Into<Bytes>) -> Variant {
        Variant::Blob(Blob::external(data.into()))
    }

    /// A 64-bit id.
    pub fn id64(value: u64) -> Variant {
        Variant::Id(Id::new(64, value))
    }

    /// A 32-bit id.
    pub fn id32(value: u32) -> Variant {
        Variant::Id(Id::new(32, value as u64))
    }

    /// An id of the given declared bit size.
    pub fn id(size: u32, value: u64) -> Variant {
        Variant::Id(Id::new(size, value))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Variant::Null => Kind::Null,
            Variant::Bool(_) => Kind::Bool,
            Variant::Integer(_) => Kind::Integer,
            Variant::Id(_) => Kind::Id,
            Variant::String(_) => Kind::String,
            Variant::Blob(_) => Kind::Blob,
            Variant::Array(_) => Kind::Array,
            Variant::Map(_) => Kind::Map,
            Variant::Seed(_) => Kind::Seed,
            Variant::Native(_) => Kind::Native,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    /// Bool payload; `false` for anything that is not a bool.
    pub fn bool_value(&self) -> bool {
        matches!(self, Variant::Bool(true))
    }

    /// Integer payload; 0 for anything that is not an integer.
    pub fn integer_value(&self) -> i64 {
        match self {
            Variant::Integer(value) => *value,
            _ => 0,
        }
    }

    /// Declared id bit size; 0 for non-ids.
    pub fn id_size(&self) -> u32 {
        match self {
            Variant::Id(id) => id.size(),
            _ => 0,
        }
    }

    /// Id payload; 0 for non-ids.
    pub fn id64_value(&self) -> u64 {
        match self {
            Variant::Id(id) => id.value(),
            _ => 0,
        }
    }

    /// String length in bytes; 0 for non-strings.
    pub fn string_length(&self) -> u32 {
        match self {
            Variant::String(text) => text.length(),
            _ => 0,
        }
    }

    /// String encoding; [`Charset::NONE`] for non-strings.
    pub fn string_encoding(&self) -> Charset {
        match self {
            Variant::String(text) => text.encoding(),
            _ => Charset::NONE,
        }
    }

    /// String contents; empty for non-strings.
    pub fn string_bytes(&self) -> Bytes {
        match self {
            Variant::String(text) => text.bytes(),
            _ => Bytes::new(),
        }
    }

    /// Replace a mutable string's contents.
    pub fn string_set(&self, bytes: &[u8]) -> bool {
        match self {
            Variant::String(text) => text.set(bytes),
            _ => false,
        }
    }

    /// Blob size in bytes; 0 for non-blobs.
    pub fn blob_size(&self) -> u32 {
        match self {
            Variant::Blob(blob) => blob.size(),
            _ => 0,
        }
    }

    /// Blob contents; empty for non-blobs.
    pub fn blob_data(&self) -> Bytes {
        match self {
            Variant::Blob(blob) => blob.data(),
            _ => Bytes::new(),
        }
    }

    /// Replace a mutable blob's contents.
    pub fn blob_set(&self, bytes: &[u8]) -> bool {
        match self {
            Variant::Blob(blob) => blob.set(bytes),
            _ => false,
        }
    }

    /// Array length; 0 for non-arrays.
    pub fn array_length(&self) -> u32 {
        match self {
            Variant::Array(array) => array.length(),
            _ => 0,
        }
    }

    /// Array element; `Null` for non-arrays and out-of-range indexes.
    pub fn array_get(&self, index: u32) -> Variant {
        match self {
            Variant::Array(array) => array.get(index),
            _ => Variant::Null,
        }
    }

    /// Append to an array. Fails for non-arrays and frozen arrays.
    pub fn array_add(&self, value: impl Into<Variant>) -> bool {
        match self {
            Variant::Array(array) => array.add(value),
            _ => false,
        }
    }

    /// Map size; 0 for non-maps.
    pub fn map_size(&self) -> u32 {
        match self {
            Variant::Map(map) => map.size(),
            _ => 0,
        }
    }

    /// First-match map lookup; `Null` for non-maps and absent keys.
    pub fn map_get(&self, key: &Variant) -> Variant {
        match self {
            Variant::Map(map) => map.get(key),
            _ => Variant::Null,
        }
    }

    /// First-match map lookup with an explicit default.
    pub fn map_get_or(&self, key: &Variant, default: Variant) -> Variant {
        match self {
            Variant::Map(map) => map.get_or(key, default),
            _ => default,
        }
    }

    pub fn map_has(&self, key: &Variant) -> bool {
        match self {
            Variant::Map(map) => map.has(key),
            _ => false,
        }
    }

    /// Append a map entry. Fails for non-maps and frozen maps.
    pub fn map_set(&self, key: impl Into<Variant>, value: impl Into<Variant>) -> bool {
        match self {
            Variant::Map(map) => map.set(key, value),
            _ => false,
        }
    }

    /// Seed header; `Null` for non-seeds.
    pub fn seed_header(&self) -> Variant {
        match self {
            Variant::Seed(seed) => seed.header(),
            _ => Variant::Null,
        }
    }

    pub fn seed_set_header(&self, value: impl Into<Variant>) -> bool {
        match self {
            Variant::Seed(seed) => seed.set_header(value),
            _ => false,
        }
    }

    pub fn seed_get_field(&self, key: &Variant) -> Variant {
        match self {
            Variant::Seed(seed) => seed.get_field(key),
            _ => Variant::Null,
        }
    }

    pub fn seed_set_field(&self, key: impl Into<Variant>, value: impl Into<Variant>) -> bool {
        match self {
            Variant::Seed(seed) => seed.set_field(key, value),
            _ => false,
        }
    }

    pub fn seed_field_count(&self) -> u32 {
        match self {
            Variant::Seed(seed) => seed.field_count(),
            _ => 0,
        }
    }

    /// Downcast a native variant's payload.
    pub fn native_as<T: 'static>(&self) -> Option<Rc<T>> {
        match self {
            Variant::Native(native) => native.downcast::<T>(),
            _ => None,
        }
    }

    /// Whether this value rejects mutation. Scalars, ids, external strings
    /// and blobs, and natives are always frozen.
    pub fn is_frozen(&self) -> bool {
        match self {
            Variant::Null | Variant::Bool(_) | Variant::Integer(_) | Variant::Id(_) => true,
            Variant::String(text) => text.is_frozen(),
            Variant::Blob(blob) => blob.is_frozen(),
            Variant::Array(array) => array.is_frozen(),
            Variant::Map(map) => map.is_frozen(),
            Variant::Seed(seed) => seed.is_frozen(),
            Variant::Native(_) => true,
        }
    }

    /// Freeze this value. For seeds the field map freezes too. One-way.
    pub fn ensure_frozen(&self) {
        match self {
            Variant::String(text) => text.ensure_frozen(),
            Variant::Blob(blob) => blob.ensure_frozen(),
            Variant::Array(array) => array.ensure_frozen(),
            Variant::Map(map) => map.ensure_frozen(),
            Variant::Seed(seed) => seed.ensure_frozen(),
            _ => {}
        }
    }

    /// The identity key used by the binary codec's sharing table. External
    /// strings and blobs have no identity; scalars never share.
    pub(crate) fn composite_identity(&self) -> Option<usize> {
        match self {
            Variant::String(text) => text.identity(),
            Variant::Blob(blob) => blob.identity(),
            Variant::Array(array) => Some(array.identity()),
            Variant::Map(map) => Some(map.identity()),
            Variant::Seed(seed) => Some(seed.identity()),
            _ => None,
        }
    }

    pub(crate) fn clear_for_teardown(&self) {
        match self {
            Variant::Array(array) => array.clear_for_teardown(),
            Variant::Map(map) => map.clear_for_teardown(),
            Variant::Seed(seed) => seed.clear_for_teardown(),
            _ => {}
        }
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Variant) -> bool {
        match (self, other) {
            (Variant::Null, Variant::Null) => true,
            (Variant::Bool(a), Variant::Bool(b)) => a == b,
            (Variant::Integer(a), Variant::Integer(b)) => a == b,
            (Variant::Id(a), Variant::Id(b)) => a == b,
            // Strings and blobs compare by content regardless of flavor.
            (Variant::String(a), Variant::String(b)) => a.bytes() == b.bytes(),
            (Variant::Blob(a), Variant::Blob(b)) => a.data() == b.data(),
            // Composites compare by identity.
            (Variant::Array(a), Variant::Array(b)) => a.identity() == b.identity(),
            (Variant::Map(a), Variant::Map(b)) => a.identity() == b.identity(),
            (Variant::Seed(a), Variant::Seed(b)) => a.identity() == b.identity(),
            (Variant::Native(a), Variant::Native(b)) => a.identity() == b.identity(),
            _ => false,
        }
    }
}

impl Eq for Variant {}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Null => write!(f, "%n"),
            Variant::Bool(true) => write!(f, "%t"),
            Variant::Bool(false) => write!(f, "%f"),
            Variant::Integer(value) => write!(f, "{}", value),
            Variant::Id(id) => write!(f, "~{}:{:x}", id.size(), id.value()),
            Variant::String(text) => {
                write!(f, "{:?}", String::from_utf8_lossy(&text.bytes()))
            }
            Variant::Blob(blob) => write!(f, "blob[{}]", blob.size()),
            Variant::Array(array) => write!(f, "array[{}]", array.length()),
            Variant::Map(map) => write!(f, "map{{{}}}", map.size()),
            Variant::Seed(seed) => write!(f, "seed({:?})", seed.header()),
            Variant::Native(_) => write!(f, "native"),
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Variant {
        Variant::Bool(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Variant {
        Variant::Integer(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Variant {
        Variant::Integer(value as i64)
    }
}

impl From<u32> for Variant {
    fn from(value: u32) -> Variant {
        Variant::Integer(value as i64)
    }
}

impl From<&'static str> for Variant {
    fn from(value: &'static str) -> Variant {
        Variant::string(value)
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Variant {
        Variant::string(value)
    }
}

impl From<Id> for Variant {
    fn from(value: Id) -> Variant {
        Variant::Id(value)
    }
}

impl From<Text> for Variant {
    fn from(value: Text) -> Variant {
        Variant::String(value)
    }
}

impl From<Blob> for Variant {
    fn from(value: Blob) -> Variant {
        Variant::Blob(value)
    }
}

impl From<Array> for Variant {
    fn from(value: Array) -> Variant {
        Variant::Array(value)
    }
}

impl From<Map> for Variant {
    fn from(value: Map) -> Variant {
        Variant::Map(value)
    }
}

impl From<Seed> for Variant {
    fn from(value: Seed) -> Variant {
        Variant::Seed(value)
    }
}

impl From<Native> for Variant {
    fn from(value: Native) -> Variant {
        Variant::Native(value)
    }
}

// ---------------------------------------------------------------------------
// VariantMap
// ---------------------------------------------------------------------------

/// An insertion-ordered map from variant keys to arbitrary values, keyed by
/// variant equality (so string keys match by content). Used for method and
/// type tables.
pub struct VariantMap<T> {
    entries: Vec<(Variant, T)>,
}

impl<T> Default for VariantMap<T> {
    fn default() -> Self {
        VariantMap {
            entries: Vec::new(),
        }
    }
}

impl<T> VariantMap<T> {
    pub fn new() -> VariantMap<T> {
        VariantMap::default()
    }

    /// Insert or replace the entry for `key`.
    pub fn set(&mut self, key: impl Into<Variant>, value: T) {
        let key = key.into();
        for (existing, slot) in self.entries.iter_mut() {
            if *existing == key {
                *slot = value;
                return;
            }
        }
        self.entries.push((key, value));
    }

    pub fn get(&self, key: &Variant) -> Option<&T> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
