//! Encoding variant graphs to binary.

use std::collections::HashMap;

use bytes::Bytes;

use crate::binary::Assembler;
use crate::marshal::Native;
use crate::variant::{Arena, Charset, Map, Seed, Variant};

/// Serializes variants to the binary wire form.
///
/// Shared structure is preserved: each composite takes an index in
/// emission order, and a second occurrence of the same arena-owned
/// composite is emitted as a back-reference to its first occurrence. This
/// also lets cyclic graphs encode in finite space.
///
/// # Example
///
/// ```
/// use plankton::binary::{BinaryReader, BinaryWriter};
/// use plankton::variant::{Arena, Variant};
///
/// let mut writer = BinaryWriter::new();
/// writer.write(&Variant::integer(42));
///
/// let arena = Arena::new();
/// let decoded = BinaryReader::new(&arena).parse(writer.data());
/// assert_eq!(decoded, Variant::integer(42));
/// ```
#[derive(Default)]
pub struct BinaryWriter {
    bytes: Bytes,
}

impl BinaryWriter {
    pub fn new() -> BinaryWriter {
        BinaryWriter::default()
    }

    /// Encode one variant, replacing any previously written output.
    pub fn write(&mut self, value: &Variant) {
        let mut assm = Assembler::new();
        {
            let mut encoder = VariantEncoder::new(&mut assm);
            encoder.encode(value);
        }
        self.bytes = assm.into_code();
    }

    /// The encoded bytes.
    pub fn data(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Per-write encoding state: the assembler plus the sharing table.
struct VariantEncoder<'a> {
    assm: &'a mut Assembler,
    /// Identity key of arena-owned composites -> emission index.
    seen: HashMap<usize, u64>,
    /// Index the next fully-emitted composite will take.
    next_index: u64,
    /// Holds native replacement values while they are being encoded.
    scratch: Arena,
}

impl<'a> VariantEncoder<'a> {
    fn new(assm: &'a mut Assembler) -> VariantEncoder<'a> {
        VariantEncoder {
            assm,
            seen: HashMap::new(),
            next_index: 0,
            scratch: Arena::new(),
        }
    }

    fn encode(&mut self, value: &Variant) {
        if let Some(key) = value.composite_identity() {
            if let Some(&index) = self.seen.get(&key) {
                self.assm.emit_reference(index);
                return;
            }
        }
        match value {
            Variant::Null => {
                self.assm.emit_null();
            }
            Variant::Bool(value) => {
                self.assm.emit_bool(*value);
            }
            Variant::Integer(value) => {
                self.assm.emit_int64(*value);
            }
            Variant::Id(id) => {
                self.assm.emit_id64(id.size(), id.value());
            }
            Variant::String(_) => self.encode_string(value),
            Variant::Blob(_) => self.encode_blob(value),
            Variant::Array(_) => self.encode_array(value),
            Variant::Map(_) => self.encode_map(value),
            Variant::Seed(_) => self.encode_seed(value),
            Variant::Native(native) => self.encode_native(native),
        }
    }

    /// Claim the next emission index for a composite about to be written
    /// in full. The reader numbers composites the same way, so indexes
    /// line up without being carried on the wire.
    fn note_composite(&mut self, value: &Variant) {
        let index = self.next_index;
        self.next_index += 1;
        if let Some(key) = value.composite_identity() {
            self.seen.insert(key, index);
        }
    }

    fn encode_string(&mut self, value: &Variant) {
        self.note_composite(value);
        let bytes = value.string_bytes();
        let encoding = value.string_encoding();
        if encoding == Charset::default_string_encoding() {
            self.assm.emit_default_string(&bytes);
        } else {
            self.assm.emit_string_with_encoding(encoding, &bytes);
        }
    }

    fn encode_blob(&mut self, value: &Variant) {
        self.note_composite(value);
        self.assm.emit_blob(&value.blob_data());
    }

    fn encode_array(&mut self, value: &Variant) {
        self.note_composite(value);
        let length = value.array_length();
        self.assm.begin_array(length);
        for i in 0..length {
            let element = value.array_get(i);
            self.encode(&element);
        }
    }

    fn encode_map(&mut self, value: &Variant) {
        self.note_composite(value);
        let map: &Map = match value {
            Variant::Map(map) => map,
            _ => return,
        };
        self.assm.begin_map(map.size());
        for (key, entry) in map.iter() {
            self.encode(&key);
            self.encode(&entry);
        }
    }

    fn encode_seed(&mut self, value: &Variant) {
        self.note_composite(value);
        let seed: &Seed = match value {
            Variant::Seed(seed) => seed,
            _ => return,
        };
        self.assm.begin_seed(1, seed.field_count());
        let header = seed.header();
        self.encode(&header);
        for (key, field) in seed.fields().iter() {
            self.encode(&key);
            self.encode(&field);
        }
    }

    fn encode_native(&mut self, native: &Native) {
        let replacement = native.seed_type().serialize(native, &self.scratch);
        self.encode(&replacement);
    }
}
