//! Parsing the ASCII text form back into variants.

use crate::variant::{Arena, Variant};

/// Where and on what character a parse failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxError {
    offender: char,
    offset: usize,
}

impl SyntaxError {
    /// The character the parser choked on; `'\0'` when the input ended
    /// too early.
    pub fn offender(&self) -> char {
        self.offender
    }

    /// Byte offset of the offender.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Parses the text form, populating variants in a caller-provided arena.
///
/// On error the reader records the offending character and returns
/// `Null`; inspect [`TextReader::error`] afterwards.
pub struct TextReader<'a> {
    factory: &'a Arena,
    error: Option<SyntaxError>,
}

impl<'a> TextReader<'a> {
    pub fn new(factory: &'a Arena) -> TextReader<'a> {
        TextReader {
            factory,
            error: None,
        }
    }

    /// Parse one complete value; trailing non-whitespace input is an
    /// error.
    pub fn parse(&mut self, input: &str) -> Variant {
        self.error = None;
        let mut reader = ReaderImpl {
            bytes: input.as_bytes(),
            cursor: 0,
            factory: self.factory,
            error: None,
        };
        reader.skip_whitespace();
        let result = reader.decode_full();
        self.error = reader.error;
        result.unwrap_or(Variant::Null)
    }

    pub fn has_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&SyntaxError> {
        self.error.as_ref()
    }

    /// The offending character of the last parse, `'\0'` if it succeeded.
    pub fn offender(&self) -> char {
        self.error.map(|error| error.offender).unwrap_or('\0')
    }
}

const INV: u8 = 255;
const PAD: u8 = 254;

/// Base64 alphabet to sextet; `PAD` for `'='`, `INV` for everything else.
fn sextet(c: u8) -> u8 {
    match c {
        b'A'..=b'Z' => c - b'A',
        b'a'..=b'z' => c - b'a' + 26,
        b'0'..=b'9' => c - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        b'=' => PAD,
        _ => INV,
    }
}

struct ReaderImpl<'x> {
    bytes: &'x [u8],
    cursor: usize,
    factory: &'x Arena,
    error: Option<SyntaxError>,
}

impl<'x> ReaderImpl<'x> {
    fn has_more(&self) -> bool {
        self.cursor < self.bytes.len()
    }

    /// The current byte, `0` past the end.
    fn current(&self) -> u8 {
        self.bytes.get(self.cursor).copied().unwrap_or(0)
    }

    /// The byte after the current one, `0` past the end.
    fn next(&self) -> u8 {
        self.bytes.get(self.cursor + 1).copied().unwrap_or(0)
    }

    fn advance(&mut self) -> bool {
        self.cursor += 1;
        self.has_more()
    }

    fn advance_and_skip(&mut self) -> bool {
        self.advance();
        self.skip_whitespace();
        self.has_more()
    }

    fn is_whitespace(c: u8) -> bool {
        matches!(c, b' ' | b'\n' | b'\t' | 0x0C | b'\r')
    }

    fn is_newline(c: u8) -> bool {
        matches!(c, b'\n' | 0x0C)
    }

    fn skip_whitespace(&mut self) {
        loop {
            while self.has_more() && Self::is_whitespace(self.current()) {
                self.advance();
            }
            if self.current() == b'#' {
                self.advance();
                self.skip_comments();
            } else {
                break;
            }
        }
    }

    /// Called just past a `#`. End-of-line comments run to the newline;
    /// `#{ ... #}` blocks nest with EOL comments taking precedence.
    fn skip_comments(&mut self) {
        if self.current() == b'{' {
            loop {
                while self.has_more() && self.current() != b'#' {
                    self.advance();
                }
                if self.current() != b'#' {
                    break;
                }
                self.advance();
                if self.current() == b'}' {
                    self.advance();
                    break;
                }
                self.skip_comments();
            }
        } else {
            while self.has_more() && !Self::is_newline(self.current()) {
                self.advance();
            }
        }
    }

    /// Record the first failure and propagate `None`.
    fn fail<T>(&mut self) -> Option<T> {
        if self.error.is_none() {
            self.error = Some(SyntaxError {
                offender: self.current() as char,
                offset: self.cursor,
            });
        }
        None
    }

    fn decode_full(&mut self) -> Option<Variant> {
        let result = self.decode()?;
        if self.has_more() {
            return self.fail();
        }
        Some(result)
    }

    fn decode(&mut self) -> Option<Variant> {
        match self.current() {
            b'%' => {
                self.advance();
                match self.current() {
                    b'f' => {
                        self.advance_and_skip();
                        Some(Variant::Bool(false))
                    }
                    b't' => {
                        self.advance_and_skip();
                        Some(Variant::Bool(true))
                    }
                    b'n' => {
                        self.advance_and_skip();
                        Some(Variant::Null)
                    }
                    b'[' => self.decode_blob(),
                    _ => self.fail(),
                }
            }
            b'[' => self.decode_array(),
            b'{' => self.decode_map(),
            b'@' => self.decode_seed(),
            b'"' => self.decode_quoted_string(),
            b'~' => self.decode_id(),
            b'-' => {
                if self.next() == b'-' {
                    self.fail()
                } else {
                    self.decode_integer()
                }
            }
            c if c.is_ascii_digit() => self.decode_integer(),
            c if Self::is_unquoted_string_start(c) => self.decode_unquoted_string(),
            _ => self.fail(),
        }
    }

    fn decode_integer(&mut self) -> Option<Variant> {
        let is_negative = self.current() == b'-';
        if is_negative {
            self.advance();
        }
        let mut result: i64 = 0;
        while self.current().is_ascii_digit() {
            result = result
                .wrapping_mul(10)
                .wrapping_add((self.current() - b'0') as i64);
            self.advance();
        }
        self.skip_whitespace();
        Some(Variant::integer(if is_negative { -result } else { result }))
    }

    fn decode_id(&mut self) -> Option<Variant> {
        self.advance();
        let mut digits = String::new();
        while self.current().is_ascii_hexdigit() {
            digits.push(self.current() as char);
            self.advance();
        }
        if digits.is_empty() {
            return self.fail();
        }
        let (size, value) = if self.current() == b':' {
            // The explicit form, `~size:payload`, with a decimal size.
            let size: u32 = match digits.parse() {
                Ok(size) => size,
                Err(_) => return self.fail(),
            };
            self.advance();
            let mut payload = String::new();
            while self.current().is_ascii_hexdigit() {
                payload.push(self.current() as char);
                self.advance();
            }
            match u64::from_str_radix(&payload, 16) {
                Ok(value) => (size, value),
                Err(_) => return self.fail(),
            }
        } else {
            let size = match digits.len() {
                16 => 64,
                8 => 32,
                4 => 16,
                2 => 8,
                _ => return self.fail(),
            };
            match u64::from_str_radix(&digits, 16) {
                Ok(value) => (size, value),
                Err(_) => return self.fail(),
            }
        };
        self.skip_whitespace();
        Some(Variant::id(size, value))
    }

    fn is_unquoted_string_start(c: u8) -> bool {
        c.is_ascii_alphabetic() || c == b'\\'
    }

    fn is_unquoted_string_part(c: u8) -> bool {
        Self::is_unquoted_string_start(c) || c.is_ascii_digit() || b"_-/.".contains(&c)
    }

    fn decode_short_escape(c: u8) -> Option<u8> {
        match c {
            b'a' => Some(0x07),
            b'b' => Some(0x08),
            b'f' => Some(0x0C),
            b'n' => Some(b'\n'),
            b't' => Some(b'\t'),
            b'r' => Some(b'\r'),
            b'v' => Some(0x0B),
            b'0' => Some(0),
            b'\\' | b'"' => Some(c),
            _ => None,
        }
    }

    fn parse_hex_digit(c: u8) -> Option<u8> {
        match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        }
    }

    /// One possibly-escaped character of a string, quoted or not.
    fn decode_character(&mut self) -> Option<u8> {
        if self.current() != b'\\' {
            let c = self.current();
            self.advance();
            return Some(c);
        }
        if !self.advance() {
            return None;
        }
        if self.current() == b'x' {
            if !self.advance() {
                return None;
            }
            let high = Self::parse_hex_digit(self.current())?;
            if !self.advance() {
                return None;
            }
            let low = Self::parse_hex_digit(self.current())?;
            self.advance();
            Some((high << 4) | low)
        } else {
            let decoded = Self::decode_short_escape(self.current())?;
            self.advance();
            Some(decoded)
        }
    }

    fn new_string(&self, bytes: &[u8]) -> Variant {
        Variant::String(self.factory.new_string_with_encoding(
            bytes,
            crate::variant::Charset::default_string_encoding(),
        ))
    }

    fn decode_unquoted_string(&mut self) -> Option<Variant> {
        let mut buf = Vec::new();
        while self.has_more() && Self::is_unquoted_string_part(self.current()) {
            match self.decode_character() {
                Some(c) => buf.push(c),
                None => return self.fail(),
            }
        }
        self.skip_whitespace();
        Some(self.new_string(&buf))
    }

    fn decode_quoted_string(&mut self) -> Option<Variant> {
        self.advance();
        let mut buf = Vec::new();
        while self.has_more() && self.current() != b'"' {
            match self.decode_character() {
                Some(c) => buf.push(c),
                None => return self.fail(),
            }
        }
        if self.current() != b'"' {
            return self.fail();
        }
        self.advance_and_skip();
        Some(self.new_string(&buf))
    }

    fn decode_blob(&mut self) -> Option<Variant> {
        // Current is the '[' that followed '%'.
        self.advance_and_skip();
        let mut data = Vec::new();
        while self.has_more() && self.current() != b']' {
            // Padding is mandatory, so blocks of four characters at a
            // time regardless of content. Whitespace may fall anywhere
            // between them.
            let a = sextet(self.current());
            if a == INV || a == PAD || !self.advance_and_skip() {
                return self.fail();
            }
            let b = sextet(self.current());
            if b == INV || b == PAD || !self.advance_and_skip() {
                return self.fail();
            }
            let c = sextet(self.current());
            if c == INV || !self.advance_and_skip() {
                return self.fail();
            }
            let d = sextet(self.current());
            if d == INV || !self.advance_and_skip() {
                return self.fail();
            }
            data.push((a << 2) | (b >> 4));
            if c != PAD {
                data.push((b << 4) | (c >> 2));
                if d != PAD {
                    data.push((c << 6) | d);
                }
            }
        }
        if self.current() != b']' {
            return self.fail();
        }
        self.advance_and_skip();
        Some(Variant::Blob(self.factory.new_blob(&data)))
    }

    fn decode_array(&mut self) -> Option<Variant> {
        self.advance_and_skip();
        let result = self.factory.new_array();
        while self.has_more() && self.current() != b']' {
            let element = self.decode()?;
            result.add(element);
            if self.current() == b',' {
                self.advance_and_skip();
            } else {
                break;
            }
        }
        if self.current() != b']' {
            return self.fail();
        }
        self.advance_and_skip();
        result.ensure_frozen();
        Some(Variant::Array(result))
    }

    fn decode_map(&mut self) -> Option<Variant> {
        self.advance_and_skip();
        let result = self.factory.new_map();
        while self.has_more() && self.current() != b'}' {
            let key = self.decode()?;
            if self.current() != b':' {
                return self.fail();
            }
            self.advance_and_skip();
            let value = self.decode()?;
            result.set(key, value);
            if self.current() == b',' {
                self.advance_and_skip();
            } else {
                break;
            }
        }
        if self.current() != b'}' {
            return self.fail();
        }
        self.advance_and_skip();
        result.ensure_frozen();
        Some(Variant::Map(result))
    }

    fn decode_seed(&mut self) -> Option<Variant> {
        self.advance_and_skip();
        let header = self.decode()?;
        let end = match self.current() {
            b'(' => b')',
            b'{' => b'}',
            _ => return self.fail(),
        };
        self.advance_and_skip();
        let result = self.factory.new_seed();
        result.set_header(header);
        while self.has_more() && self.current() != end {
            let key = self.decode()?;
            if self.current() != b':' {
                return self.fail();
            }
            self.advance_and_skip();
            let value = self.decode()?;
            result.set_field(key, value);
            if self.current() == b',' {
                self.advance_and_skip();
            } else {
                break;
            }
        }
        if self.current() != end {
            return self.fail();
        }
        self.advance_and_skip();
        result.ensure_frozen();
        Some(Variant::Seed(result))
    }
}
