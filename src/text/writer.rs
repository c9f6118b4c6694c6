//! Rendering variants as 7-bit ASCII text.

use crate::variant::{Arena, Kind, Variant};

/// Lengths up to (but not including) this are considered short. Longer
/// values switch to the indented multi-line layout.
const SHORT_LENGTH_LIMIT: usize = 80;

const BASE64_CHARS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const BASE64_PADDING: char = '=';

/// Renders variants in the ASCII text form.
///
/// The text form exists for debugging and for round-trip comparison; it
/// reads back through [`TextReader`](crate::text::TextReader) to an equal
/// value for everything this writer produces.
///
/// # Example
///
/// ```
/// use plankton::text::TextWriter;
/// use plankton::variant::Variant;
///
/// let mut writer = TextWriter::new();
/// writer.write(&Variant::integer(-10));
/// assert_eq!(writer.as_str(), "-10");
/// ```
#[derive(Default)]
pub struct TextWriter {
    text: String,
}

impl TextWriter {
    pub fn new() -> TextWriter {
        TextWriter::default()
    }

    /// Render one value, replacing any previous output.
    pub fn write(&mut self, value: &Variant) {
        let mut writer = WriterImpl::new();
        writer.write(value);
        self.text = writer.finish();
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

struct WriterImpl {
    out: String,
    indent: usize,
    pending_newline: bool,
    scratch: Arena,
}

impl WriterImpl {
    fn new() -> WriterImpl {
        WriterImpl {
            out: String::new(),
            indent: 0,
            pending_newline: false,
            scratch: Arena::new(),
        }
    }

    fn finish(mut self) -> String {
        self.flush_pending_newline();
        self.out
    }

    fn write(&mut self, value: &Variant) {
        match value {
            Variant::Bool(true) => self.raw_str("%t"),
            Variant::Bool(false) => self.raw_str("%f"),
            Variant::Null => self.raw_str("%n"),
            Variant::Integer(value) => {
                let text = value.to_string();
                self.raw_str(&text);
            }
            Variant::String(_) => self.write_string(&value.string_bytes()),
            Variant::Id(id) => self.write_id(id.size(), id.value()),
            Variant::Blob(_) => self.write_blob(&value.blob_data()),
            Variant::Array(_) => self.write_array(value),
            Variant::Map(_) => self.write_map(value),
            Variant::Seed(_) => self.write_seed(value),
            Variant::Native(native) => {
                let replacement = native.seed_type().serialize(native, &self.scratch);
                self.write(&replacement);
            }
        }
    }

    // -- raw output ----------------------------------------------------

    fn raw_char(&mut self, c: char) {
        self.flush_pending_newline();
        self.out.push(c);
    }

    fn raw_str(&mut self, text: &str) {
        self.flush_pending_newline();
        self.out.push_str(text);
    }

    fn flush_pending_newline(&mut self) {
        if !self.pending_newline {
            return;
        }
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push(' ');
        }
        self.pending_newline = false;
    }

    fn schedule_newline(&mut self) {
        self.pending_newline = true;
    }

    fn indent(&mut self) {
        self.indent += 2;
    }

    fn deindent(&mut self) {
        self.indent -= 2;
    }

    // -- layout --------------------------------------------------------

    /// The flat length of `value` added to `offset`, with the short limit
    /// treated as infinity so the calculation stays cheap on deep trees.
    fn short_length(value: &Variant, offset: usize) -> usize {
        match value.kind() {
            Kind::Integer => offset + 5,
            Kind::Bool | Kind::Null => offset + 2,
            Kind::String => offset + value.string_length() as usize,
            Kind::Array => {
                let mut current = offset + 2;
                let length = value.array_length();
                for i in 0..length {
                    if current >= SHORT_LENGTH_LIMIT {
                        break;
                    }
                    current = Self::short_length(&value.array_get(i), current + 2);
                }
                current
            }
            Kind::Map => {
                let mut current = offset + 2;
                if let Variant::Map(map) = value {
                    for (key, entry) in map.iter() {
                        if current >= SHORT_LENGTH_LIMIT {
                            break;
                        }
                        current = Self::short_length(&key, current + 2);
                        current = Self::short_length(&entry, current);
                    }
                }
                current
            }
            Kind::Seed => {
                let mut current = Self::short_length(&value.seed_header(), offset + 2);
                if let Variant::Seed(seed) = value {
                    for (key, field) in seed.fields().iter() {
                        if current >= SHORT_LENGTH_LIMIT {
                            break;
                        }
                        current = Self::short_length(&key, current + 3);
                        current = Self::short_length(&field, current);
                    }
                }
                current
            }
            _ => SHORT_LENGTH_LIMIT,
        }
    }

    fn write_long(&self, value: &Variant) -> bool {
        Self::short_length(value, self.indent) >= SHORT_LENGTH_LIMIT
    }

    // -- strings -------------------------------------------------------

    fn is_unquoted_string_start(c: u8) -> bool {
        c.is_ascii_alphabetic()
    }

    fn is_unquoted_string_part(c: u8) -> bool {
        Self::is_unquoted_string_start(c) || c.is_ascii_digit() || b"_-/.".contains(&c)
    }

    fn is_unquoted(chars: &[u8]) -> bool {
        match chars.split_first() {
            None => false,
            Some((first, rest)) => {
                Self::is_unquoted_string_start(*first)
                    && rest.iter().all(|c| Self::is_unquoted_string_part(*c))
            }
        }
    }

    fn is_unescaped_char(c: u8) -> bool {
        (0x20..=0x7E).contains(&c) && c != b'"' && c != b'\\'
    }

    fn encode_short_escape(c: u8) -> Option<char> {
        match c {
            0x07 => Some('a'),
            0x08 => Some('b'),
            0x0C => Some('f'),
            b'\n' => Some('n'),
            b'\t' => Some('t'),
            b'\r' => Some('r'),
            0x0B => Some('v'),
            0 => Some('0'),
            b'\\' => Some('\\'),
            b'"' => Some('"'),
            _ => None,
        }
    }

    fn write_hex_byte(&mut self, c: u8) {
        const HEX: &[u8; 16] = b"0123456789abcdef";
        self.raw_char(HEX[(c >> 4) as usize] as char);
        self.raw_char(HEX[(c & 0xF) as usize] as char);
    }

    fn write_string(&mut self, chars: &[u8]) {
        if Self::is_unquoted(chars) {
            self.flush_pending_newline();
            for c in chars {
                self.out.push(*c as char);
            }
            return;
        }
        self.raw_char('"');
        for &c in chars {
            if Self::is_unescaped_char(c) {
                self.raw_char(c as char);
            } else {
                self.raw_char('\\');
                match Self::encode_short_escape(c) {
                    Some(short) => self.raw_char(short),
                    None => {
                        self.raw_char('x');
                        self.write_hex_byte(c);
                    }
                }
            }
        }
        self.raw_char('"');
    }

    // -- blobs ---------------------------------------------------------

    fn write_blob(&mut self, data: &[u8]) {
        self.raw_char('%');
        self.raw_char('[');
        let mut chunks = data.chunks_exact(3);
        for chunk in &mut chunks {
            let word =
                ((chunk[0] as u32) << 16) | ((chunk[1] as u32) << 8) | (chunk[2] as u32);
            self.raw_char(BASE64_CHARS[((word >> 18) & 0x3F) as usize] as char);
            self.raw_char(BASE64_CHARS[((word >> 12) & 0x3F) as usize] as char);
            self.raw_char(BASE64_CHARS[((word >> 6) & 0x3F) as usize] as char);
            self.raw_char(BASE64_CHARS[(word & 0x3F) as usize] as char);
        }
        match chunks.remainder() {
            [] => {}
            [a] => {
                let word = (*a as u32) << 16;
                self.raw_char(BASE64_CHARS[((word >> 18) & 0x3F) as usize] as char);
                self.raw_char(BASE64_CHARS[((word >> 12) & 0x3F) as usize] as char);
                self.raw_char(BASE64_PADDING);
                self.raw_char(BASE64_PADDING);
            }
            [a, b] => {
                let word = ((*a as u32) << 16) | ((*b as u32) << 8);
                self.raw_char(BASE64_CHARS[((word >> 18) & 0x3F) as usize] as char);
                self.raw_char(BASE64_CHARS[((word >> 12) & 0x3F) as usize] as char);
                self.raw_char(BASE64_CHARS[((word >> 6) & 0x3F) as usize] as char);
                self.raw_char(BASE64_PADDING);
            }
            _ => unreachable!(),
        }
        self.raw_char(']');
    }

    // -- ids -----------------------------------------------------------

    fn write_id(&mut self, size: u32, value: u64) {
        let text = match size {
            64 => format!("~{:016x}", value),
            32 => format!("~{:08x}", value),
            16 => format!("~{:04x}", value),
            8 => format!("~{:02x}", value),
            _ => format!("~{}:{:x}", size, value),
        };
        self.raw_str(&text);
    }

    // -- composites ----------------------------------------------------

    fn write_array(&mut self, value: &Variant) {
        let is_long = self.write_long(value);
        self.raw_char('[');
        if is_long {
            self.indent();
            self.schedule_newline();
        }
        let length = value.array_length();
        for i in 0..length {
            let element = value.array_get(i);
            self.write(&element);
            if i + 1 < length {
                self.raw_char(',');
                if !is_long {
                    self.raw_char(' ');
                }
            }
            if is_long {
                self.schedule_newline();
            }
        }
        if is_long {
            self.deindent();
        }
        self.raw_char(']');
    }

    fn write_entries(&mut self, entries: &[(Variant, Variant)], is_long: bool) {
        for (i, (key, value)) in entries.iter().enumerate() {
            self.write(key);
            self.raw_char(':');
            self.raw_char(' ');
            self.write(value);
            if i + 1 < entries.len() {
                self.raw_char(',');
                if !is_long {
                    self.raw_char(' ');
                }
            }
            if is_long {
                self.schedule_newline();
            }
        }
    }

    fn write_map(&mut self, value: &Variant) {
        let is_long = self.write_long(value);
        let entries: Vec<(Variant, Variant)> = match value {
            Variant::Map(map) => map.iter().collect(),
            _ => Vec::new(),
        };
        self.raw_char('{');
        if is_long {
            self.indent();
            self.schedule_newline();
        }
        self.write_entries(&entries, is_long);
        if is_long {
            self.deindent();
        }
        self.raw_char('}');
    }

    fn write_seed(&mut self, value: &Variant) {
        let is_long = self.write_long(value);
        let entries: Vec<(Variant, Variant)> = match value {
            Variant::Seed(seed) => seed.fields().iter().collect(),
            _ => Vec::new(),
        };
        self.raw_char('@');
        let header = value.seed_header();
        self.write(&header);
        self.raw_char('{');
        if is_long {
            self.indent();
            self.schedule_newline();
        }
        self.write_entries(&entries, is_long);
        if is_long {
            self.deindent();
        }
        self.raw_char('}');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn written(value: &Variant) -> String {
        let mut writer = TextWriter::new();
        writer.write(value);
        writer.as_str().to_string()
    }

    #[test]
    fn test_primitives() {
        assert_eq!(written(&Variant::boolean(false)), "%f");
        assert_eq!(written(&Variant::boolean(true)), "%t");
        assert_eq!(written(&Variant::null()), "%n");
        assert_eq!(written(&Variant::integer(0)), "0");
        assert_eq!(written(&Variant::integer(10)), "10");
        assert_eq!(written(&Variant::integer(-10)), "-10");
    }

    #[test]
    fn test_strings() {
        assert_eq!(written(&Variant::string("fooBAR123")), "fooBAR123");
        assert_eq!(written(&Variant::string("")), "\"\"");
        assert_eq!(written(&Variant::string("123")), "\"123\"");
        assert_eq!(written(&Variant::string("a b c")), "\"a b c\"");
        assert_eq!(written(&Variant::string("a\nb")), "\"a\\nb\"");
        assert_eq!(written(&Variant::string("a\"b\"c")), "\"a\\\"b\\\"c\"");
        assert_eq!(
            written(&Variant::string(&b"a\x01b\xa2c"[..])),
            "\"a\\x01b\\xa2c\""
        );
    }

    #[test]
    fn test_blobs() {
        assert_eq!(written(&Variant::blob(&b"Man"[..])), "%[TWFu]");
        assert_eq!(written(&Variant::blob(&b"pleasure."[..])), "%[cGxlYXN1cmUu]");
        assert_eq!(written(&Variant::blob(&b"leasure."[..])), "%[bGVhc3VyZS4=]");
        assert_eq!(written(&Variant::blob(&b"easure."[..])), "%[ZWFzdXJlLg==]");
        assert_eq!(written(&Variant::blob(&b"asure."[..])), "%[YXN1cmUu]");
        assert_eq!(written(&Variant::blob(&b"sure."[..])), "%[c3VyZS4=]");
        assert_eq!(written(&Variant::blob(&b""[..])), "%[]");
    }

    #[test]
    fn test_ids() {
        assert_eq!(written(&Variant::id64(0xFABACAEA)), "~00000000fabacaea");
        assert_eq!(written(&Variant::id32(0xFABACAEA)), "~fabacaea");
        assert_eq!(written(&Variant::id(16, 0xBEEF)), "~beef");
        assert_eq!(written(&Variant::id(8, 0x7F)), "~7f");
    }

    #[test]
    fn test_short_arrays() {
        let arena = Arena::new();
        let a0 = arena.new_array();
        a0.add(8);
        a0.add("foo");
        assert_eq!(written(&Variant::Array(a0.clone())), "[8, foo]");
        for _ in 0..3 {
            a0.add("blahblahblah");
        }
        assert_eq!(
            written(&Variant::Array(a0.clone())),
            "[8, foo, blahblahblah, blahblahblah, blahblahblah]"
        );
        let a1 = arena.new_array();
        assert_eq!(written(&Variant::Array(a1.clone())), "[]");
        let a2 = arena.new_array();
        a2.add(a1.clone());
        a2.add(a1);
        assert_eq!(written(&Variant::Array(a2)), "[[], []]");
    }

    #[test]
    fn test_long_array_layout() {
        let arena = Arena::new();
        let a0 = arena.new_array();
        a0.add(8);
        a0.add("foo");
        for _ in 0..5 {
            a0.add("blahblahblah");
        }
        assert_eq!(
            written(&Variant::Array(a0)),
            "[\n  8,\n  foo,\n  blahblahblah,\n  blahblahblah,\n  blahblahblah,\n  blahblahblah,\n  blahblahblah\n]"
        );
    }

    #[test]
    fn test_maps() {
        let arena = Arena::new();
        let m0 = arena.new_map();
        m0.set("foo", "bar");
        assert_eq!(written(&Variant::Map(m0.clone())), "{foo: bar}");
        m0.set(8, 16);
        assert_eq!(written(&Variant::Map(m0.clone())), "{foo: bar, 8: 16}");
        m0.set(arena.new_array(), arena.new_map());
        assert_eq!(written(&Variant::Map(m0)), "{foo: bar, 8: 16, []: {}}");
    }

    #[test]
    fn test_seeds() {
        let arena = Arena::new();
        let seed = arena.new_seed();
        seed.set_header("point");
        seed.set_field("x", 1);
        seed.set_field("y", 2);
        assert_eq!(written(&Variant::Seed(seed)), "@point{x: 1, y: 2}");
    }
}
