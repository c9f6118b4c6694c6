//! The writing half of a framed socket.

use std::io::Write;

use crate::binary::BinaryWriter;
use crate::error::Result;
use crate::socket::{SEND_VALUE, SET_DEFAULT_STRING_ENCODING, STREAM_MAGIC};
use crate::variant::{Charset, Variant};

/// Frames variants onto a byte stream.
///
/// The wire begins with the eight-byte magic followed by a
/// default-string-encoding directive; after that each
/// [`send_value`](OutputSocket::send_value) emits a `SendValue` directive
/// with two length-prefixed frames, the encoded stream id and the encoded
/// value. Every directive is padded so the absolute byte cursor lands on
/// an 8-byte boundary, and flushed, so a frame is either fully on the
/// stream or not there at all.
pub struct OutputSocket<W: Write> {
    dest: W,
    cursor: u64,
    default_encoding: Charset,
    has_been_inited: bool,
}

impl<W: Write> OutputSocket<W> {
    /// Create a socket writing to `dest`. Call [`init`](OutputSocket::init)
    /// before sending values.
    pub fn new(dest: W) -> OutputSocket<W> {
        OutputSocket {
            dest,
            cursor: 0,
            default_encoding: Charset::UTF_8,
            has_been_inited: false,
        }
    }

    /// Set the default encoding advertised in the stream header. Only
    /// callable before `init`; later calls fail and change nothing.
    pub fn set_default_string_encoding(&mut self, value: Charset) -> bool {
        if self.has_been_inited {
            return false;
        }
        self.default_encoding = value;
        true
    }

    /// Write the stream header: magic, encoding directive, padding.
    pub fn init(&mut self) -> Result<()> {
        self.write_blob(&STREAM_MAGIC)?;
        self.write_byte(SET_DEFAULT_STRING_ENCODING)?;
        self.write_uint64(self.default_encoding.0 as u64)?;
        self.write_padding()?;
        self.dest.flush()?;
        self.has_been_inited = true;
        Ok(())
    }

    /// Send a value on the root stream.
    pub fn send_value(&mut self, value: &Variant) -> Result<()> {
        self.send_value_to(&Variant::Null, value)
    }

    /// Send a value on the stream keyed by the encoding of `stream_id`.
    pub fn send_value_to(&mut self, stream_id: &Variant, value: &Variant) -> Result<()> {
        self.write_byte(SEND_VALUE)?;
        self.write_value(stream_id)?;
        self.write_value(value)?;
        self.write_padding()?;
        self.dest.flush()?;
        Ok(())
    }

    fn write_value(&mut self, value: &Variant) -> Result<()> {
        let mut writer = BinaryWriter::new();
        writer.write(value);
        self.write_uint64(writer.len() as u64)?;
        self.write_blob(writer.data())
    }

    fn write_blob(&mut self, data: &[u8]) -> Result<()> {
        self.cursor += data.len() as u64;
        self.dest.write_all(data)?;
        Ok(())
    }

    fn write_byte(&mut self, value: u8) -> Result<()> {
        self.write_blob(&[value])
    }

    fn write_uint64(&mut self, value: u64) -> Result<()> {
        // Same biased varint as the binary codec, but cursor-tracked so
        // padding comes out right.
        let mut current = value;
        while current >= 0x80 {
            self.write_byte(((current & 0x7F) | 0x80) as u8)?;
            current = (current >> 7) - 1;
        }
        self.write_byte(current as u8)
    }

    fn write_padding(&mut self) -> Result<()> {
        while self.cursor % 8 != 0 {
            self.write_byte(0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bytes() {
        let mut out = Vec::new();
        {
            let mut socket = OutputSocket::new(&mut out);
            socket.init().unwrap();
            // Too late to change the encoding now.
            assert!(!socket.set_default_string_encoding(Charset::UTF_8));
        }
        assert_eq!(
            out,
            vec![112, 116, 246, 110, 0, 0, 0, 0, 1, 106, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_encoding_can_change_before_init() {
        let mut out = Vec::new();
        {
            let mut socket = OutputSocket::new(&mut out);
            assert!(socket.set_default_string_encoding(Charset::SHIFT_JIS));
            socket.init().unwrap();
        }
        assert_eq!(out[9], 17);
    }

    #[test]
    fn test_directives_are_padded() {
        let mut out = Vec::new();
        {
            let mut socket = OutputSocket::new(&mut out);
            socket.init().unwrap();
            socket.send_value(&Variant::integer(1)).unwrap();
            socket.send_value(&Variant::null()).unwrap();
        }
        assert_eq!(out.len() % 8, 0);
        // SendValue, id frame [1 byte: null], value frame [2 bytes].
        assert_eq!(&out[16..22], &[2, 1, 2, 2, 3, 0x02]);
    }
}
