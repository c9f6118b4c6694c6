//! The reading half of a framed socket: streams, ids, incremental decode.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::rc::Rc;

use bytes::Bytes;

use crate::binary::BinaryReader;
use crate::error::{PlanktonError, Result};
use crate::marshal::TypeRegistry;
use crate::socket::{ROOT_STREAM_ID_BYTE, SEND_VALUE, SET_DEFAULT_STRING_ENCODING, STREAM_MAGIC};
use crate::variant::{Arena, Charset, Variant};

/// An opaque byte key selecting a logical inbound stream on a socket. The
/// key is the binary encoding of the id variant the sender used; equality
/// and hashing are by byte content.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct StreamId {
    key: Bytes,
}

impl StreamId {
    pub fn from_bytes(key: Bytes) -> StreamId {
        StreamId { key }
    }

    /// The root stream id: the one-byte encoding of `Null`.
    pub fn root() -> StreamId {
        StreamId {
            key: Bytes::from_static(&[ROOT_STREAM_ID_BYTE]),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }
}

/// Everything a stream needs to know at creation time.
pub struct StreamConfig {
    pub id: StreamId,
    pub type_registry: Option<Rc<TypeRegistry>>,
}

/// A polymorphic sink for the blocks a socket routes to one stream id.
pub trait InputStream {
    /// Called by the socket for each value frame addressed to this
    /// stream. The block holds the binary encoding of one value.
    fn receive_block(&mut self, block: Bytes);
}

/// Factory invoked by the socket to build the stream for a new id.
pub type InputStreamFactory = Box<dyn Fn(&StreamConfig) -> Rc<RefCell<dyn InputStream>>>;

/// An input stream that buffers blocks and lets clients pull messages one
/// at a time, decoded lazily against a caller-provided factory arena.
pub struct BufferInputStream {
    pending: VecDeque<Bytes>,
    type_registry: Option<Rc<TypeRegistry>>,
}

impl BufferInputStream {
    pub fn new(config: &StreamConfig) -> BufferInputStream {
        BufferInputStream {
            pending: VecDeque::new(),
            type_registry: config.type_registry.clone(),
        }
    }

    /// Set the registry used when decoding values on this stream.
    pub fn set_type_registry(&mut self, value: Rc<TypeRegistry>) {
        self.type_registry = Some(value);
    }

    /// Decode and return the next pending message, acquiring storage from
    /// `factory`. `Null` when nothing is pending.
    pub fn pull_message(&mut self, factory: &Arena) -> Variant {
        let block = match self.pending.pop_front() {
            Some(block) => block,
            None => return Variant::Null,
        };
        let mut reader = BinaryReader::new(factory);
        if let Some(registry) = &self.type_registry {
            reader.set_type_registry(registry.clone());
        }
        reader.parse(&block)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl InputStream for BufferInputStream {
    fn receive_block(&mut self, block: Bytes) {
        self.pending.push_back(block);
    }
}

/// A message decoded by a push stream, together with the arena that owns
/// it. The value is valid for as long as someone keeps the owner alive.
pub struct ParsedMessage {
    owner: Arena,
    value: Variant,
}

impl ParsedMessage {
    pub fn owner(&self) -> &Arena {
        &self.owner
    }

    pub fn value(&self) -> &Variant {
        &self.value
    }
}

/// Callback invoked by a [`PushInputStream`] for each parsed message.
pub type MessageAction = Box<dyn FnMut(&ParsedMessage)>;

/// An input stream that decodes each block eagerly against a private
/// arena and hands the parsed value to every registered action.
pub struct PushInputStream {
    actions: Vec<MessageAction>,
    type_registry: Option<Rc<TypeRegistry>>,
}

impl PushInputStream {
    pub fn new(config: &StreamConfig) -> PushInputStream {
        PushInputStream {
            actions: Vec::new(),
            type_registry: config.type_registry.clone(),
        }
    }

    /// Set the registry used when decoding values on this stream.
    pub fn set_type_registry(&mut self, value: Rc<TypeRegistry>) {
        self.type_registry = Some(value);
    }

    pub fn type_registry(&self) -> Option<Rc<TypeRegistry>> {
        self.type_registry.clone()
    }

    /// Add an action to run on each message, after those already
    /// registered.
    pub fn add_action(&mut self, action: MessageAction) {
        self.actions.push(action);
    }
}

impl InputStream for PushInputStream {
    fn receive_block(&mut self, block: Bytes) {
        let arena = Arena::new();
        let mut reader = BinaryReader::new(&arena);
        if let Some(registry) = &self.type_registry {
            reader.set_type_registry(registry.clone());
        }
        let value = reader.parse(&block);
        let parsed = ParsedMessage {
            owner: arena,
            value,
        };
        for action in self.actions.iter_mut() {
            action(&parsed);
        }
    }
}

/// Reads directives from a byte stream and routes value frames to the
/// registered input streams.
///
/// Processing is incremental: [`process_next_instruction`] consumes one
/// directive per call and distinguishes progress, clean end-of-input, and
/// structural errors, so a caller can multiplex several sockets on one
/// thread by polling each in turn.
///
/// [`process_next_instruction`]: InputSocket::process_next_instruction
pub struct InputSocket<R: Read> {
    src: R,
    cursor: u64,
    at_eof: bool,
    has_been_inited: bool,
    stream_factory: InputStreamFactory,
    streams: HashMap<StreamId, Rc<RefCell<dyn InputStream>>>,
    default_type_registry: Option<Rc<TypeRegistry>>,
    peer_encoding: Charset,
}

impl<R: Read> InputSocket<R> {
    /// Create a socket reading from `src`. The default stream factory
    /// builds [`BufferInputStream`]s.
    pub fn new(src: R) -> InputSocket<R> {
        InputSocket {
            src,
            cursor: 0,
            at_eof: false,
            has_been_inited: false,
            stream_factory: Box::new(|config| {
                let stream: Rc<RefCell<dyn InputStream>> =
                    Rc::new(RefCell::new(BufferInputStream::new(config)));
                stream
            }),
            streams: HashMap::new(),
            default_type_registry: None,
            peer_encoding: Charset::UTF_8,
        }
    }

    /// Replace the stream factory. Only callable before `init`; later
    /// calls fail and change nothing.
    pub fn set_stream_factory(&mut self, factory: InputStreamFactory) -> bool {
        if self.has_been_inited {
            return false;
        }
        self.stream_factory = factory;
        true
    }

    /// Registry handed to streams created after this point.
    pub fn set_default_type_registry(&mut self, value: Rc<TypeRegistry>) {
        self.default_type_registry = Some(value);
    }

    /// Consume and verify the stream header, then install the root
    /// stream.
    pub fn init(&mut self) -> Result<()> {
        let mut header = [0u8; 8];
        self.read_blob(&mut header)?;
        if header != STREAM_MAGIC {
            return Err(PlanktonError::BadHeader);
        }
        let id = StreamId::root();
        let config = StreamConfig {
            id: id.clone(),
            type_registry: self.default_type_registry.clone(),
        };
        let stream = (self.stream_factory)(&config);
        self.streams.insert(id, stream);
        self.has_been_inited = true;
        Ok(())
    }

    /// The stream produced by the factory for the root id.
    pub fn root_stream(&self) -> Option<Rc<RefCell<dyn InputStream>>> {
        self.streams.get(&StreamId::root()).cloned()
    }

    /// The default string encoding most recently advertised by the peer.
    pub fn peer_encoding(&self) -> Charset {
        self.peer_encoding
    }

    /// Read and process one directive.
    ///
    /// Returns `Ok(true)` when a directive was processed, `Ok(false)` on
    /// clean end-of-input, and an error for structural problems (unknown
    /// directive, input ending inside a directive). Pending state is left
    /// untouched on error.
    pub fn process_next_instruction(&mut self) -> Result<bool> {
        let opcode = match self.read_byte_opt()? {
            Some(byte) => byte,
            None => return Ok(false),
        };
        match opcode {
            SET_DEFAULT_STRING_ENCODING => {
                let encoding = self.read_uint64()?;
                self.read_padding()?;
                self.peer_encoding = Charset(encoding as u32);
                Ok(true)
            }
            SEND_VALUE => {
                let id_bytes = self.read_value()?;
                let value = self.read_value()?;
                self.read_padding()?;
                let id = StreamId::from_bytes(id_bytes);
                match self.streams.get(&id) {
                    Some(stream) => stream.borrow_mut().receive_block(value),
                    None => {
                        // No such stream; the value is dropped.
                        tracing::warn!(id = ?id, "value for unknown stream");
                    }
                }
                Ok(true)
            }
            other => Err(PlanktonError::UnknownDirective(other)),
        }
    }

    /// Keep processing directives until clean end-of-input or an error.
    pub fn process_all_instructions(&mut self) -> Result<()> {
        assert!(self.has_been_inited, "input socket not inited");
        while self.process_next_instruction()? {}
        Ok(())
    }

    // -- cursored reading ----------------------------------------------

    /// One byte, or `None` at end-of-input. EOF is sticky.
    fn read_byte_opt(&mut self) -> Result<Option<u8>> {
        if self.at_eof {
            return Ok(None);
        }
        let mut byte = [0u8; 1];
        loop {
            match self.src.read(&mut byte) {
                Ok(0) => {
                    self.at_eof = true;
                    return Ok(None);
                }
                Ok(_) => {
                    self.cursor += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// One byte in the middle of a directive, where end-of-input is a
    /// structural error.
    fn read_byte(&mut self) -> Result<u8> {
        self.read_byte_opt()?.ok_or(PlanktonError::Truncated)
    }

    fn read_blob(&mut self, dest: &mut [u8]) -> Result<()> {
        for slot in dest.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(())
    }

    fn read_uint64(&mut self) -> Result<u64> {
        let mut next = self.read_byte()?;
        let mut result = (next & 0x7F) as u64;
        let mut offset = 7u32;
        while next >= 0x80 {
            next = self.read_byte()?;
            if offset >= 64 {
                return Err(PlanktonError::Protocol("varint too wide".to_string()));
            }
            let payload = ((next & 0x7F) as u64) + 1;
            result = result.wrapping_add(payload << offset);
            offset += 7;
        }
        Ok(result)
    }

    fn read_value(&mut self) -> Result<Bytes> {
        let size = self.read_uint64()? as usize;
        let mut data = vec![0u8; size];
        self.read_blob(&mut data)?;
        Ok(Bytes::from(data))
    }

    fn read_padding(&mut self) -> Result<()> {
        while self.cursor % 8 != 0 {
            self.read_byte()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::OutputSocket;

    /// A stream that records the blocks it receives.
    struct RecordingStream {
        blocks: Rc<RefCell<Vec<Bytes>>>,
    }

    impl InputStream for RecordingStream {
        fn receive_block(&mut self, block: Bytes) {
            self.blocks.borrow_mut().push(block);
        }
    }

    fn wire_with_values(values: &[Variant]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut socket = OutputSocket::new(&mut out);
        socket.init().unwrap();
        for value in values {
            socket.send_value(value).unwrap();
        }
        out
    }

    #[test]
    fn test_init_rejects_bad_magic() {
        let bytes = vec![0u8; 16];
        let mut socket = InputSocket::new(&bytes[..]);
        assert!(matches!(socket.init(), Err(PlanktonError::BadHeader)));
    }

    #[test]
    fn test_framing_order_and_count() {
        let values = [
            Variant::integer(1),
            Variant::string("two"),
            Variant::boolean(true),
        ];
        let wire = wire_with_values(&values);

        let blocks = Rc::new(RefCell::new(Vec::new()));
        let factory_blocks = blocks.clone();
        let mut socket = InputSocket::new(&wire[..]);
        assert!(socket.set_stream_factory(Box::new(move |_config| {
            let stream: Rc<RefCell<dyn InputStream>> = Rc::new(RefCell::new(RecordingStream {
                blocks: factory_blocks.clone(),
            }));
            stream
        })));
        socket.init().unwrap();
        socket.process_all_instructions().unwrap();

        let blocks = blocks.borrow();
        assert_eq!(blocks.len(), values.len());
        for (block, value) in blocks.iter().zip(&values) {
            let mut writer = crate::binary::BinaryWriter::new();
            writer.write(value);
            assert_eq!(block.as_ref(), writer.data());
        }
    }

    #[test]
    fn test_buffer_stream_pull() {
        let wire = wire_with_values(&[Variant::integer(42), Variant::string("done")]);
        let mut socket = InputSocket::new(&wire[..]);
        // Keep a typed handle on the root stream by building it ourselves.
        let created: Rc<RefCell<Option<Rc<RefCell<BufferInputStream>>>>> =
            Rc::new(RefCell::new(None));
        let factory_created = created.clone();
        socket.set_stream_factory(Box::new(move |config| {
            let stream = Rc::new(RefCell::new(BufferInputStream::new(config)));
            *factory_created.borrow_mut() = Some(stream.clone());
            let erased: Rc<RefCell<dyn InputStream>> = stream;
            erased
        }));
        socket.init().unwrap();
        socket.process_all_instructions().unwrap();

        let root = created.borrow().clone().unwrap();
        let arena = Arena::new();
        let mut stream = root.borrow_mut();
        assert_eq!(stream.pull_message(&arena), Variant::integer(42));
        assert_eq!(stream.pull_message(&arena), Variant::string("done"));
        assert!(stream.is_empty());
        assert!(stream.pull_message(&arena).is_null());
    }

    #[test]
    fn test_clean_eof_after_last_directive() {
        let wire = wire_with_values(&[Variant::integer(1)]);
        let mut socket = InputSocket::new(&wire[..]);
        socket.init().unwrap();
        // The encoding directive, then the value.
        assert!(socket.process_next_instruction().unwrap());
        assert!(socket.process_next_instruction().unwrap());
        assert!(!socket.process_next_instruction().unwrap());
        // EOF is sticky.
        assert!(!socket.process_next_instruction().unwrap());
    }

    #[test]
    fn test_peer_encoding_is_recorded() {
        let mut wire = Vec::new();
        {
            let mut output = OutputSocket::new(&mut wire);
            output.set_default_string_encoding(Charset::SHIFT_JIS);
            output.init().unwrap();
        }
        let mut socket = InputSocket::new(&wire[..]);
        socket.init().unwrap();
        assert!(socket.process_next_instruction().unwrap());
        assert_eq!(socket.peer_encoding(), Charset::SHIFT_JIS);
    }

    #[test]
    fn test_truncated_directive_is_error() {
        let wire = wire_with_values(&[Variant::string("truncate me please")]);
        let cut = &wire[..wire.len() - 6];
        let mut socket = InputSocket::new(cut);
        socket.init().unwrap();
        // The encoding directive is intact; the value frame is not.
        assert!(socket.process_next_instruction().unwrap());
        assert!(matches!(
            socket.process_next_instruction(),
            Err(PlanktonError::Truncated)
        ));
    }

    #[test]
    fn test_unknown_directive_is_error() {
        let mut wire = wire_with_values(&[]);
        wire.extend_from_slice(&[9, 0, 0, 0, 0, 0, 0, 0]);
        let mut socket = InputSocket::new(&wire[..]);
        socket.init().unwrap();
        assert!(socket.process_next_instruction().unwrap());
        assert!(matches!(
            socket.process_next_instruction(),
            Err(PlanktonError::UnknownDirective(9))
        ));
    }

    #[test]
    fn test_factory_locked_after_init() {
        let wire = wire_with_values(&[]);
        let mut socket = InputSocket::new(&wire[..]);
        socket.init().unwrap();
        assert!(!socket.set_stream_factory(Box::new(|config| {
            let stream: Rc<RefCell<dyn InputStream>> =
                Rc::new(RefCell::new(BufferInputStream::new(config)));
            stream
        })));
    }

    #[test]
    fn test_values_for_unknown_streams_are_dropped() {
        let mut out = Vec::new();
        {
            let mut output = OutputSocket::new(&mut out);
            output.init().unwrap();
            output
                .send_value_to(&Variant::id32(7), &Variant::integer(1))
                .unwrap();
            output.send_value(&Variant::integer(2)).unwrap();
        }
        let blocks = Rc::new(RefCell::new(Vec::new()));
        let factory_blocks = blocks.clone();
        let mut socket = InputSocket::new(&out[..]);
        socket.set_stream_factory(Box::new(move |_config| {
            let stream: Rc<RefCell<dyn InputStream>> = Rc::new(RefCell::new(RecordingStream {
                blocks: factory_blocks.clone(),
            }));
            stream
        }));
        socket.init().unwrap();
        socket.process_all_instructions().unwrap();
        // Only the root-stream value arrived.
        assert_eq!(blocks.borrow().len(), 1);
    }
}
