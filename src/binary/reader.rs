//! Decoding binary plankton into variants.

use std::rc::Rc;

use crate::binary::{opcode, varint};
use crate::marshal::{SeedType, TypeRegistry};
use crate::variant::{Arena, Charset, Variant};

/// Deserializes binary plankton against an arena.
///
/// Parsing never fails at the arena level: malformed input yields `Null`
/// (or, in the worst case, a partial value); downstream code discovers
/// problems through kind checks. Composites come out frozen.
pub struct BinaryReader<'a> {
    factory: &'a Arena,
    registry: Option<Rc<TypeRegistry>>,
}

impl<'a> BinaryReader<'a> {
    /// Create a reader allocating from `factory`.
    pub fn new(factory: &'a Arena) -> BinaryReader<'a> {
        BinaryReader {
            factory,
            registry: None,
        }
    }

    /// Install the type registry consulted when decoding seeds.
    pub fn set_type_registry(&mut self, registry: Rc<TypeRegistry>) {
        self.registry = Some(registry);
    }

    /// Decode one value from `data`.
    pub fn parse(&self, data: &[u8]) -> Variant {
        let mut decoder = Decoder {
            data,
            cursor: 0,
            factory: self.factory,
            registry: self.registry.as_deref(),
            table: Vec::new(),
        };
        decoder.decode().unwrap_or(Variant::Null)
    }
}

struct Decoder<'d> {
    data: &'d [u8],
    cursor: usize,
    factory: &'d Arena,
    registry: Option<&'d TypeRegistry>,
    /// Composites in decode order; the dual of the writer's sharing table.
    table: Vec<Variant>,
}

impl<'d> Decoder<'d> {
    fn read_byte(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.cursor)?;
        self.cursor += 1;
        Some(byte)
    }

    fn read_uint64(&mut self) -> Option<u64> {
        varint::read_uint64(self.data, &mut self.cursor)
    }

    fn read_uint32(&mut self) -> Option<u32> {
        varint::read_uint32(self.data, &mut self.cursor)
    }

    fn read_bytes(&mut self, size: usize) -> Option<&'d [u8]> {
        let end = self.cursor.checked_add(size)?;
        let bytes = self.data.get(self.cursor..end)?;
        self.cursor = end;
        Some(bytes)
    }

    fn decode(&mut self) -> Option<Variant> {
        match self.read_byte()? {
            opcode::NULL => Some(Variant::Null),
            opcode::TRUE => Some(Variant::Bool(true)),
            opcode::FALSE => Some(Variant::Bool(false)),
            opcode::INTEGER => {
                let value = varint::read_int64(self.data, &mut self.cursor)?;
                Some(Variant::Integer(value))
            }
            opcode::DEFAULT_STRING => {
                let length = self.read_uint32()?;
                let bytes = self.read_bytes(length as usize)?;
                let text = self
                    .factory
                    .new_string_with_encoding(bytes, Charset::default_string_encoding());
                let value = Variant::String(text);
                self.table.push(value.clone());
                Some(value)
            }
            opcode::STRING_WITH_ENCODING => {
                let encoding = self.read_uint64()?;
                let length = self.read_uint32()?;
                let bytes = self.read_bytes(length as usize)?;
                let text = self
                    .factory
                    .new_string_with_encoding(bytes, Charset(encoding as u32));
                let value = Variant::String(text);
                self.table.push(value.clone());
                Some(value)
            }
            opcode::BLOB => {
                let size = self.read_uint32()?;
                let bytes = self.read_bytes(size as usize)?;
                let value = Variant::Blob(self.factory.new_blob(bytes));
                self.table.push(value.clone());
                Some(value)
            }
            opcode::ARRAY => {
                let length = self.read_uint32()?;
                self.decode_array(length)
            }
            opcode::MAP => {
                let size = self.read_uint32()?;
                self.decode_map(size)
            }
            opcode::SEED => {
                let headerc = self.read_uint32()?;
                let fieldc = self.read_uint32()?;
                self.decode_seed(headerc, fieldc)
            }
            opcode::ID => {
                let size = (self.read_byte()? as u32) << 3;
                let width = match size {
                    8 | 16 | 32 | 64 => (size >> 3) as usize,
                    _ => return None,
                };
                let bytes = self.read_bytes(width)?;
                let mut raw = [0u8; 8];
                raw[..width].copy_from_slice(bytes);
                Some(Variant::id(size, u64::from_le_bytes(raw)))
            }
            opcode::REFERENCE => {
                let offset = self.read_uint64()?;
                self.table.get(offset as usize).cloned()
            }
            _ => None,
        }
    }

    fn decode_array(&mut self, length: u32) -> Option<Variant> {
        let array = self.factory.new_array_with_capacity(length as usize);
        // Register before the children decode so back-references into the
        // array (including cycles) resolve.
        self.table.push(Variant::Array(array.clone()));
        for _ in 0..length {
            let element = self.decode()?;
            array.add(element);
        }
        array.ensure_frozen();
        Some(Variant::Array(array))
    }

    fn decode_map(&mut self, size: u32) -> Option<Variant> {
        let map = self.factory.new_map();
        self.table.push(Variant::Map(map.clone()));
        for _ in 0..size {
            let key = self.decode()?;
            let value = self.decode()?;
            map.set(key, value);
        }
        map.ensure_frozen();
        Some(Variant::Map(map))
    }

    fn decode_seed(&mut self, headerc: u32, fieldc: u32) -> Option<Variant> {
        let seed = self.factory.new_seed();
        self.table.push(Variant::Seed(seed.clone()));
        let mut seed_type: Option<Rc<dyn SeedType>> = None;
        for i in 0..headerc {
            // Scan the headers, resolving them to a type as we go. The
            // first, most specific one becomes the seed's own header.
            let header = self.decode()?;
            if i == 0 {
                seed.set_header(header.clone());
            }
            if seed_type.is_none() {
                if let Some(registry) = self.registry {
                    seed_type = registry.resolve_type(&header);
                }
            }
        }
        for _ in 0..fieldc {
            let key = self.decode()?;
            let value = self.decode()?;
            seed.set_field(key, value);
        }
        seed.ensure_frozen();
        match seed_type {
            Some(seed_type) => Some(seed_type.instantiate(Variant::Seed(seed), self.factory)),
            None => Some(Variant::Seed(seed)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::BinaryWriter;
    use crate::text::TextWriter;

    fn roundtrip(value: &Variant) -> (Arena, Variant) {
        let mut writer = BinaryWriter::new();
        writer.write(value);
        let arena = Arena::new();
        let decoded = BinaryReader::new(&arena).parse(writer.data());
        (arena, decoded)
    }

    fn check_binary(value: &Variant) {
        let (_arena, decoded) = roundtrip(value);
        assert!(decoded.is_frozen());
        let mut expected = TextWriter::new();
        expected.write(value);
        let mut found = TextWriter::new();
        found.write(&decoded);
        assert_eq!(expected.as_str(), found.as_str());
    }

    #[test]
    fn test_scalar_roundtrip() {
        check_binary(&Variant::null());
        check_binary(&Variant::boolean(true));
        check_binary(&Variant::boolean(false));
        check_binary(&Variant::integer(0));
        check_binary(&Variant::integer(-1));
        check_binary(&Variant::integer(3));
        check_binary(&Variant::integer(0xFFFF_FFFF));
    }

    #[test]
    fn test_dense_integer_sweep() {
        for i in (-655..655).step_by(1) {
            let (_a, decoded) = roundtrip(&Variant::integer(i));
            assert_eq!(decoded, Variant::integer(i));
        }
        for i in (-6553..6553).step_by(12) {
            let (_a, decoded) = roundtrip(&Variant::integer(i));
            assert_eq!(decoded, Variant::integer(i));
        }
        for i in (-65536..65536).step_by(112) {
            let (_a, decoded) = roundtrip(&Variant::integer(i));
            assert_eq!(decoded, Variant::integer(i));
        }
        for i in (-6_553_600..6_553_600).step_by(11112) {
            let (_a, decoded) = roundtrip(&Variant::integer(i));
            assert_eq!(decoded, Variant::integer(i));
        }
    }

    #[test]
    fn test_map_roundtrip() {
        let arena = Arena::new();
        let map = arena.new_map();
        check_binary(&Variant::Map(map.clone()));
        assert!(map.set(4, 5));
        check_binary(&Variant::Map(map.clone()));
        assert!(map.set(Variant::boolean(true), Variant::boolean(false)));
        check_binary(&Variant::Map(map.clone()));
        let inner = arena.new_map();
        assert!(map.set(8, inner));
        check_binary(&Variant::Map(map));
    }

    #[test]
    fn test_id_roundtrip() {
        check_binary(&Variant::id64(0xFABA_CAEA));
        check_binary(&Variant::id32(0xFABA_CAEA));
        check_binary(&Variant::id64(0));
        check_binary(&Variant::id64(u64::MAX));
    }

    #[test]
    fn test_string_encoding_survives() {
        let arena = Arena::new();
        let text = arena.new_string_with_encoding(b"foo", Charset::SHIFT_JIS);
        let mut writer = BinaryWriter::new();
        writer.write(&Variant::String(text));
        let decoder_arena = Arena::new();
        let decoded = BinaryReader::new(&decoder_arena).parse(writer.data());
        assert_eq!(decoded.string_encoding(), Charset::SHIFT_JIS);
        assert_eq!(decoded.string_bytes().as_ref(), b"foo");
    }

    #[test]
    fn test_sharing_preserves_identity() {
        let arena = Arena::new();
        let inner = arena.new_array();
        inner.add(1);
        let outer = arena.new_array();
        outer.add(inner.clone());
        outer.add(inner);

        let (_decoded_arena, decoded) = roundtrip(&Variant::Array(outer));
        assert_eq!(decoded.array_length(), 2);
        // Identity equality: both elements are the same object.
        assert_eq!(decoded.array_get(0), decoded.array_get(1));
    }

    #[test]
    fn test_cycle_roundtrip() {
        let arena = Arena::new();
        let array = arena.new_array();
        array.add(Variant::Array(array.clone()));

        let (_decoded_arena, decoded) = roundtrip(&Variant::Array(array));
        assert_eq!(decoded.array_length(), 1);
        assert_eq!(decoded.array_get(0), decoded);
    }

    #[test]
    fn test_seed_roundtrip_generic() {
        let arena = Arena::new();
        let seed = arena.new_seed();
        seed.set_header("point");
        seed.set_field("x", 1);
        seed.set_field("y", 2);
        let (_a, decoded) = roundtrip(&Variant::Seed(seed));
        assert_eq!(decoded.seed_header(), Variant::string("point"));
        assert_eq!(decoded.seed_field_count(), 2);
        assert_eq!(decoded.seed_get_field(&"y".into()).integer_value(), 2);
        assert!(decoded.is_frozen());
    }

    #[test]
    fn test_malformed_input_yields_null() {
        let arena = Arena::new();
        let reader = BinaryReader::new(&arena);
        assert!(reader.parse(&[]).is_null());
        assert!(reader.parse(&[0xEE]).is_null());
        // Array that promises more elements than the input holds.
        assert!(reader.parse(&[opcode::ARRAY, 2, opcode::NULL]).is_null());
        // Reference to a composite that was never decoded.
        assert!(reader.parse(&[opcode::REFERENCE, 0]).is_null());
    }
}
