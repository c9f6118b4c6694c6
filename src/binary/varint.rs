//! Biased variable-length integers and zig-zag signed mapping.
//!
//! The unsigned encoding is a protobuf-style varint with a twist: each
//! continuation byte's 7-bit payload carries an implicit `+1`. A plain
//! varint allows leading zeros, so `[0x00]`, `[0x80, 0x00]` and so on
//! would all denote 0; the bias makes every value's encoding unique and
//! the range packed per added byte contiguous. Two bytes reach 16511
//! instead of 16383.
//!
//! Signed integers map through zig-zag first: `n >= 0` becomes `2n`,
//! `n < 0` becomes `-2n - 1`, so small magnitudes of either sign stay
//! short.

use bytes::{BufMut, BytesMut};

/// Map a signed integer to its zig-zag unsigned form.
#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Invert [`zigzag_encode`].
#[inline]
pub fn zigzag_decode(encoded: u64) -> i64 {
    ((encoded >> 1) as i64) ^ -((encoded & 1) as i64)
}

/// Append the biased varint encoding of `value`.
pub fn write_uint64(out: &mut BytesMut, value: u64) {
    let mut current = value;
    while current >= 0x80 {
        out.put_u8(((current & 0x7F) | 0x80) as u8);
        current = (current >> 7) - 1;
    }
    out.put_u8(current as u8);
}

/// Append the zig-zagged biased varint encoding of `value`.
pub fn write_int64(out: &mut BytesMut, value: i64) {
    write_uint64(out, zigzag_encode(value));
}

/// Decode a biased varint starting at `*cursor`, advancing the cursor past
/// it. Returns `None` on truncated or over-long input.
pub fn read_uint64(data: &[u8], cursor: &mut usize) -> Option<u64> {
    let mut next = *data.get(*cursor)?;
    *cursor += 1;
    let mut result = (next & 0x7F) as u64;
    let mut offset = 7u32;
    while next >= 0x80 {
        next = *data.get(*cursor)?;
        *cursor += 1;
        if offset >= 64 {
            return None;
        }
        let payload = ((next & 0x7F) as u64) + 1;
        result = result.wrapping_add(payload << offset);
        offset += 7;
    }
    Some(result)
}

/// Decode a zig-zagged biased varint.
pub fn read_int64(data: &[u8], cursor: &mut usize) -> Option<i64> {
    read_uint64(data, cursor).map(zigzag_decode)
}

/// Decode a biased varint that must fit in 32 bits.
pub fn read_uint32(data: &[u8], cursor: &mut usize) -> Option<u32> {
    let full = read_uint64(data, cursor)?;
    if full > u32::MAX as u64 {
        return None;
    }
    Some(full as u32)
}
