//! Raw binary emission.
//!
//! The [`Assembler`] is a stateless stream emitter: each call appends one
//! instruction to an internal buffer and nothing checks that the result is
//! a well-formed value. It is the primitive both for [`BinaryWriter`]
//! (which drives it from a variant graph) and for callers building custom
//! encodings by hand.
//!
//! [`BinaryWriter`]: crate::binary::BinaryWriter

use bytes::{BufMut, Bytes, BytesMut};

use crate::binary::{opcode, varint};
use crate::variant::Charset;

/// A stateless emitter of binary plankton instructions.
#[derive(Default)]
pub struct Assembler {
    code: BytesMut,
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler::default()
    }

    /// Begin an array of `length` elements. The caller emits the elements
    /// next.
    pub fn begin_array(&mut self, length: u32) -> bool {
        self.code.put_u8(opcode::ARRAY);
        varint::write_uint64(&mut self.code, length as u64);
        true
    }

    /// Begin a map of `size` entries. The caller emits alternating keys
    /// and values next.
    pub fn begin_map(&mut self, size: u32) -> bool {
        self.code.put_u8(opcode::MAP);
        varint::write_uint64(&mut self.code, size as u64);
        true
    }

    /// Begin a seed with `headerc` headers and `fieldc` fields.
    pub fn begin_seed(&mut self, headerc: u32, fieldc: u32) -> bool {
        self.code.put_u8(opcode::SEED);
        varint::write_uint64(&mut self.code, headerc as u64);
        varint::write_uint64(&mut self.code, fieldc as u64);
        true
    }

    pub fn emit_bool(&mut self, value: bool) -> bool {
        self.code
            .put_u8(if value { opcode::TRUE } else { opcode::FALSE });
        true
    }

    pub fn emit_null(&mut self) -> bool {
        self.code.put_u8(opcode::NULL);
        true
    }

    pub fn emit_int64(&mut self, value: i64) -> bool {
        self.code.put_u8(opcode::INTEGER);
        varint::write_int64(&mut self.code, value);
        true
    }

    /// Emit a string in the default encoding.
    pub fn emit_default_string(&mut self, chars: &[u8]) -> bool {
        self.code.put_u8(opcode::DEFAULT_STRING);
        varint::write_uint64(&mut self.code, chars.len() as u64);
        self.code.put_slice(chars);
        true
    }

    /// Emit a string tagged with an explicit encoding.
    pub fn emit_string_with_encoding(&mut self, encoding: Charset, chars: &[u8]) -> bool {
        self.code.put_u8(opcode::STRING_WITH_ENCODING);
        varint::write_uint64(&mut self.code, encoding.0 as u64);
        varint::write_uint64(&mut self.code, chars.len() as u64);
        self.code.put_slice(chars);
        true
    }

    pub fn emit_blob(&mut self, data: &[u8]) -> bool {
        self.code.put_u8(opcode::BLOB);
        varint::write_uint64(&mut self.code, data.len() as u64);
        self.code.put_slice(data);
        true
    }

    /// Emit an id of the given declared bit size. Only 8, 16, 32 and 64
    /// are encodable; anything else fails without emitting.
    pub fn emit_id64(&mut self, size: u32, value: u64) -> bool {
        let width = match size {
            8 | 16 | 32 | 64 => (size >> 3) as usize,
            _ => return false,
        };
        self.code.put_u8(opcode::ID);
        self.code.put_u8((size >> 3) as u8);
        self.code.put_slice(&value.to_le_bytes()[..width]);
        true
    }

    /// Emit a back-reference to the `offset`th composite already encoded.
    pub fn emit_reference(&mut self, offset: u64) -> bool {
        self.code.put_u8(opcode::REFERENCE);
        varint::write_uint64(&mut self.code, offset);
        true
    }

    /// The bytes emitted so far.
    pub fn peek_code(&self) -> &[u8] {
        &self.code
    }

    /// Consume the assembler, yielding the emitted bytes.
    pub fn into_code(self) -> Bytes {
        self.code.freeze()
    }
}
