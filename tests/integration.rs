//! End-to-end scenarios across the variant, codec, socket and rpc layers.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Barrier;
use std::thread;

use std::io::{Read, Write};

use plankton::rpc::{
    MessageSocket, OutgoingRequest, OutgoingResponse, RequestCallback, ResponseCallback, Service,
    StreamServiceConnector,
};
use plankton::socket::{
    BufferInputStream, InputSocket, InputStream, OutputSocket, PushInputStream,
};
use plankton::text::TextWriter;
use plankton::transport::ByteBufferStream;
use plankton::variant::{Arena, Variant};

/// A message socket looped back over an in-memory pipe: everything it
/// sends arrives as its own input.
struct RpcChannel {
    insock: InputSocket<ByteBufferStream>,
    socket: MessageSocket<ByteBufferStream>,
}

impl RpcChannel {
    fn new(handler: RequestCallback) -> RpcChannel {
        let pipe = ByteBufferStream::new(1024);
        let out = Rc::new(RefCell::new(OutputSocket::new(pipe.clone())));
        out.borrow_mut().init().unwrap();

        let mut insock = InputSocket::new(pipe);
        let created: Rc<RefCell<Option<Rc<RefCell<PushInputStream>>>>> =
            Rc::new(RefCell::new(None));
        let factory_created = created.clone();
        insock.set_stream_factory(Box::new(move |config| {
            let stream = Rc::new(RefCell::new(PushInputStream::new(config)));
            *factory_created.borrow_mut() = Some(stream.clone());
            let erased: Rc<RefCell<dyn InputStream>> = stream;
            erased
        }));
        insock.init().unwrap();

        let root = created.borrow().clone().unwrap();
        let socket = MessageSocket::new(&root, out, handler);
        RpcChannel { insock, socket }
    }

    fn process_next_instruction(&mut self) -> bool {
        self.insock.process_next_instruction().unwrap()
    }
}

/// Request travels to the handler literally; the response settles the
/// promise only once the handler chooses to send it.
#[test]
fn test_rpc_roundtrip() {
    let saved: Rc<RefCell<Option<ResponseCallback>>> = Rc::new(RefCell::new(None));
    let handler_saved = saved.clone();
    let handler: RequestCallback = Rc::new(move |request, respond| {
        assert_eq!(request.subject(), &Variant::string("test_subject"));
        assert_eq!(request.selector(), &Variant::string("test_selector"));
        assert_eq!(request.arguments(), &Variant::string("test_arguments"));
        *handler_saved.borrow_mut() = Some(respond);
    });
    let mut channel = RpcChannel::new(handler);

    let mut request = OutgoingRequest::new("test_subject", "test_selector");
    request.set_arguments("test_arguments");
    let incoming = channel.socket.send_request(&request).unwrap();
    assert!(!incoming.is_settled());

    while saved.borrow().is_none() {
        assert!(channel.process_next_instruction());
    }
    // The handler ran but has not responded yet.
    assert!(!incoming.is_settled());

    let respond = saved.borrow_mut().take().unwrap();
    respond(OutgoingResponse::success(Variant::integer(18)));
    while !incoming.is_settled() {
        assert!(channel.process_next_instruction());
    }
    assert!(incoming.is_fulfilled());
    assert_eq!(incoming.peek_value(Variant::Null), Variant::integer(18));
}

/// Registered methods dispatch by selector; anything else lands in the
/// fallback.
#[test]
fn test_rpc_service_dispatch() {
    let mut service = Service::new();
    service.register_method("echo", |data, respond| {
        respond(OutgoingResponse::success(data.argument(0, Variant::Null)));
    });
    service.register_method("ping", |_data, respond| {
        respond(OutgoingResponse::success("pong"));
    });
    let fallback_count = Rc::new(Cell::new(0u32));
    let counted = fallback_count.clone();
    service.set_fallback(move |_data, respond| {
        counted.set(counted.get() + 1);
        respond(OutgoingResponse::success("you sunk my battleship"));
    });

    let mut channel = RpcChannel::new(service.handler());

    let req0 = OutgoingRequest::with_arguments(Variant::Null, "echo", &[Variant::integer(43)]);
    let inc0 = channel.socket.send_request(&req0).unwrap();
    let req1 = OutgoingRequest::new(Variant::Null, "echo");
    let inc1 = channel.socket.send_request(&req1).unwrap();
    let req2 = OutgoingRequest::new(Variant::Null, "ping");
    let inc2 = channel.socket.send_request(&req2).unwrap();
    let req3 = OutgoingRequest::new(Variant::Null, "foobeliboo");
    let inc3 = channel.socket.send_request(&req3).unwrap();

    while !inc3.is_settled() {
        channel.process_next_instruction();
    }
    assert_eq!(inc0.peek_value(Variant::Null).integer_value(), 43);
    assert!(inc1.peek_value(Variant::integer(10)).is_null());
    assert_eq!(inc2.peek_value(Variant::integer(10)), Variant::string("pong"));
    assert_eq!(
        inc3.peek_value(Variant::Null),
        Variant::string("you sunk my battleship")
    );
    assert_eq!(fallback_count.get(), 1);
}

/// The connector wires socket, streams and message socket in one call and
/// can drive the input to clean end-of-stream.
#[test]
fn test_stream_service_connector() {
    let pipe = ByteBufferStream::new(2048);
    let mut connector = StreamServiceConnector::new(pipe.clone(), pipe.clone());

    let mut service = Service::new();
    service.register_method("echo", |data, respond| {
        respond(OutgoingResponse::success(data.argument(0, Variant::Null)));
    });
    connector.init(service.handler()).unwrap();

    let request =
        OutgoingRequest::with_arguments(Variant::Null, "echo", &[Variant::string("hello")]);
    let response = connector.socket().send_request(&request).unwrap();
    while !response.is_settled() {
        assert!(connector.process_next_instruction().unwrap());
    }
    assert_eq!(response.peek_value(Variant::Null), Variant::string("hello"));

    // After close, the remaining input drains and processing ends cleanly.
    pipe.close();
    connector.process_all_messages().unwrap();
}

/// Serials correlate responses with requests regardless of the order in
/// which the handler answers them.
#[test]
fn test_rpc_responses_settle_out_of_order() {
    let saved: Rc<RefCell<Vec<ResponseCallback>>> = Rc::new(RefCell::new(Vec::new()));
    let handler_saved = saved.clone();
    let handler: RequestCallback = Rc::new(move |_request, respond| {
        handler_saved.borrow_mut().push(respond);
    });
    let mut channel = RpcChannel::new(handler);

    let first = channel
        .socket
        .send_request(&OutgoingRequest::new(Variant::Null, "first"))
        .unwrap();
    let second = channel
        .socket
        .send_request(&OutgoingRequest::new(Variant::Null, "second"))
        .unwrap();
    while saved.borrow().len() < 2 {
        assert!(channel.process_next_instruction());
    }

    // Answer in reverse order.
    let callbacks = saved.borrow_mut().split_off(0);
    callbacks[1](OutgoingResponse::success(2));
    callbacks[0](OutgoingResponse::success(1));
    while !first.is_settled() || !second.is_settled() {
        assert!(channel.process_next_instruction());
    }
    assert_eq!(first.peek_value(Variant::Null), Variant::integer(1));
    assert_eq!(second.peek_value(Variant::Null), Variant::integer(2));
}

/// Binary round trip compared through the text form, across a socket
/// frame boundary.
#[test]
fn test_value_survives_socket_frame() {
    let arena = Arena::new();
    let value = {
        let map = arena.new_map();
        map.set("list", {
            let list = arena.new_array();
            list.add(1);
            list.add("two");
            list.add(Variant::boolean(false));
            list
        });
        map.set("blob", Variant::blob(&b"\x00\x01\x02"[..]));
        Variant::Map(map)
    };

    let mut wire = Vec::new();
    {
        let mut output = OutputSocket::new(&mut wire);
        output.init().unwrap();
        output.send_value(&value).unwrap();
    }

    let mut input = InputSocket::new(&wire[..]);
    let created: Rc<RefCell<Option<Rc<RefCell<BufferInputStream>>>>> = Rc::new(RefCell::new(None));
    let factory_created = created.clone();
    input.set_stream_factory(Box::new(move |config| {
        let stream = Rc::new(RefCell::new(BufferInputStream::new(config)));
        *factory_created.borrow_mut() = Some(stream.clone());
        let erased: Rc<RefCell<dyn InputStream>> = stream;
        erased
    }));
    input.init().unwrap();
    input.process_all_instructions().unwrap();

    // The root stream buffered the block; decode it into a fresh arena.
    let root = created.borrow().clone().unwrap();
    let decode_arena = Arena::new();
    let decoded = root.borrow_mut().pull_message(&decode_arena);

    let mut expected = TextWriter::new();
    expected.write(&value);
    let mut found = TextWriter::new();
    found.write(&decoded);
    assert_eq!(expected.as_str(), found.as_str());
}

/// Sixteen producers write tagged bytes into one shared pipe; sixteen
/// distributors demultiplex them by origin nibble into per-slice pipes;
/// each validator checks its slice saw exactly its own bytes with a
/// uniform step histogram.
#[test]
fn test_concurrent_pipe_demultiplex() {
    const SLICE_COUNT: usize = 16;
    const STEP_COUNT: usize = 1600;

    let nexus = ByteBufferStream::new(41);
    let slices: Vec<ByteBufferStream> = (0..SLICE_COUNT)
        .map(|index| ByteBufferStream::new(57 + index))
        .collect();
    let lets_go = std::sync::Arc::new(Barrier::new(SLICE_COUNT));

    let mut handles = Vec::new();
    for index in 0..SLICE_COUNT {
        let mut producer_nexus = nexus.clone();
        let barrier = lets_go.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            for step in 0..STEP_COUNT {
                let value = ((index << 4) | (step & 0xF)) as u8;
                producer_nexus.write_all(&[value]).unwrap();
            }
        }));

        let mut distributor_nexus = nexus.clone();
        let mut distributor_slices: Vec<ByteBufferStream> = slices.to_vec();
        handles.push(thread::spawn(move || {
            for _ in 0..STEP_COUNT {
                let mut value = [0u8; 1];
                assert_eq!(distributor_nexus.read(&mut value).unwrap(), 1);
                let origin = (value[0] >> 4) as usize;
                distributor_slices[origin].write_all(&value).unwrap();
            }
        }));

        let mut validator_slice = slices[index].clone();
        handles.push(thread::spawn(move || {
            let mut counts = [0usize; SLICE_COUNT];
            for _ in 0..STEP_COUNT {
                let mut value = [0u8; 1];
                assert_eq!(validator_slice.read(&mut value).unwrap(), 1);
                assert_eq!((value[0] >> 4) as usize, index);
                counts[(value[0] & 0xF) as usize] += 1;
            }
            for count in counts {
                assert_eq!(count, STEP_COUNT / SLICE_COUNT);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}
