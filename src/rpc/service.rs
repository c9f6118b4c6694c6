//! Method dispatch and the stream-to-service plumbing.

use std::cell::RefCell;
use std::io::{Read, Write};
use std::rc::Rc;

use crate::error::Result;
use crate::marshal::TypeRegistry;
use crate::rpc::socket::{
    IncomingRequest, MessageSocket, OutgoingResponse, RequestCallback, ResponseCallback,
};
use crate::socket::{InputSocket, InputStream, OutputSocket, PushInputStream};
use crate::variant::{Variant, VariantMap};

/// What a method handler sees of a request: the subject, the selector,
/// and indexed access to the arguments.
pub struct RequestData {
    subject: Variant,
    selector: Variant,
    arguments: Variant,
}

impl RequestData {
    pub fn subject(&self) -> &Variant {
        &self.subject
    }

    pub fn selector(&self) -> &Variant {
        &self.selector
    }

    pub fn arguments(&self) -> &Variant {
        &self.arguments
    }

    /// The `index`th positional argument, or `default` when the argument
    /// vector does not reach that far (or is not a vector at all).
    pub fn argument(&self, index: u32, default: Variant) -> Variant {
        match &self.arguments {
            Variant::Array(array) if index < array.length() => array.get(index),
            _ => default,
        }
    }
}

/// One registered method implementation.
pub type Method = Rc<dyn Fn(&RequestData, ResponseCallback)>;

/// A selector-to-method dispatch table with a fallback for unknown
/// selectors.
///
/// # Example
///
/// ```
/// use plankton::rpc::{OutgoingResponse, Service};
///
/// let mut service = Service::new();
/// service.register_method("ping", |_data, respond| {
///     respond(OutgoingResponse::success("pong"));
/// });
/// let handler = service.handler();
/// ```
pub struct Service {
    methods: Rc<RefCell<VariantMap<Method>>>,
    fallback: Rc<RefCell<Method>>,
}

impl Default for Service {
    fn default() -> Service {
        Service {
            methods: Rc::new(RefCell::new(VariantMap::new())),
            fallback: Rc::new(RefCell::new(Rc::new(Service::default_fallback) as Method)),
        }
    }
}

impl Service {
    pub fn new() -> Service {
        Service::default()
    }

    /// Add a method to the set understood by this service.
    pub fn register_method(
        &mut self,
        selector: impl Into<Variant>,
        method: impl Fn(&RequestData, ResponseCallback) + 'static,
    ) {
        self.methods
            .borrow_mut()
            .set(selector, Rc::new(method) as Method);
    }

    /// Replace the handler run for selectors with no registered method.
    pub fn set_fallback(&mut self, fallback: impl Fn(&RequestData, ResponseCallback) + 'static) {
        *self.fallback.borrow_mut() = Rc::new(fallback) as Method;
    }

    /// The callback to install on a message socket to dispatch requests
    /// to this service.
    pub fn handler(&self) -> RequestCallback {
        let methods = self.methods.clone();
        let fallback = self.fallback.clone();
        Rc::new(move |request: &IncomingRequest, respond: ResponseCallback| {
            let data = RequestData {
                subject: request.subject().clone(),
                selector: request.selector().clone(),
                arguments: request.arguments().clone(),
            };
            let method = methods.borrow().get(request.selector()).cloned();
            match method {
                Some(method) => method(&data, respond),
                None => {
                    let fallback = fallback.borrow().clone();
                    fallback(&data, respond);
                }
            }
        })
    }

    fn default_fallback(data: &RequestData, respond: ResponseCallback) {
        tracing::warn!(selector = ?data.selector(), "unhandled message");
        respond(OutgoingResponse::failure(Variant::Null));
    }
}

/// Binds an input and an output byte stream into a ready-to-serve RPC
/// endpoint: output socket, input socket with a push-stream factory, and
/// the message socket on top.
pub struct StreamServiceConnector<R: Read, W: Write> {
    insock: InputSocket<R>,
    outsock: Rc<RefCell<OutputSocket<W>>>,
    socket: Option<MessageSocket<W>>,
}

impl<R: Read, W: Write + 'static> StreamServiceConnector<R, W> {
    pub fn new(input: R, output: W) -> StreamServiceConnector<R, W> {
        StreamServiceConnector {
            insock: InputSocket::new(input),
            outsock: Rc::new(RefCell::new(OutputSocket::new(output))),
            socket: None,
        }
    }

    /// Registry for application seed types decoded on this connection.
    pub fn set_default_type_registry(&mut self, value: Rc<TypeRegistry>) {
        self.insock.set_default_type_registry(value);
    }

    /// Write the output header, read the input header, and wire the
    /// message socket to `handler`.
    pub fn init(&mut self, handler: RequestCallback) -> Result<()> {
        self.outsock.borrow_mut().init()?;
        let created: Rc<RefCell<Option<Rc<RefCell<PushInputStream>>>>> =
            Rc::new(RefCell::new(None));
        let factory_created = created.clone();
        self.insock.set_stream_factory(Box::new(move |config| {
            let stream = Rc::new(RefCell::new(PushInputStream::new(config)));
            *factory_created.borrow_mut() = Some(stream.clone());
            let erased: Rc<RefCell<dyn InputStream>> = stream;
            erased
        }));
        self.insock.init()?;
        let root = created
            .borrow()
            .clone()
            .expect("init did not create the root stream");
        self.socket = Some(MessageSocket::new(&root, self.outsock.clone(), handler));
        Ok(())
    }

    /// The message socket. Panics before a successful `init`.
    pub fn socket(&self) -> &MessageSocket<W> {
        self.socket.as_ref().expect("connector not initialised")
    }

    /// Process one inbound directive; see
    /// [`InputSocket::process_next_instruction`].
    pub fn process_next_instruction(&mut self) -> Result<bool> {
        self.insock.process_next_instruction()
    }

    /// Drive the input until end-of-stream or error.
    pub fn process_all_messages(&mut self) -> Result<()> {
        self.insock.process_all_instructions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn request_data(selector: &'static str, arguments: Variant) -> RequestData {
        RequestData {
            subject: Variant::Null,
            selector: Variant::string(selector),
            arguments,
        }
    }

    #[test]
    fn test_argument_indexing() {
        let data = request_data("m", Variant::string("not an array"));
        assert_eq!(data.argument(0, Variant::integer(5)), Variant::integer(5));
    }

    #[test]
    fn test_dispatch_to_registered_method() {
        let mut service = Service::new();
        let hits = Rc::new(Cell::new(0));
        let method_hits = hits.clone();
        service.register_method("echo", move |data, respond| {
            method_hits.set(method_hits.get() + 1);
            respond(OutgoingResponse::success(data.argument(0, Variant::Null)));
        });
        let handler = service.handler();

        let request = IncomingRequest::new(
            Variant::Null,
            Variant::string("echo"),
            Variant::string("ignored"),
        );
        let responded = Rc::new(Cell::new(false));
        let callback_responded = responded.clone();
        handler(
            &request,
            Rc::new(move |response| {
                assert!(response.is_success());
                callback_responded.set(true);
            }),
        );
        assert_eq!(hits.get(), 1);
        assert!(responded.get());
    }

    #[test]
    fn test_unknown_selector_hits_fallback() {
        let mut service = Service::new();
        service.register_method("known", |_data, respond| {
            respond(OutgoingResponse::success(Variant::Null));
        });
        let fallback_count = Rc::new(Cell::new(0));
        let counted = fallback_count.clone();
        service.set_fallback(move |_data, respond| {
            counted.set(counted.get() + 1);
            respond(OutgoingResponse::failure("no such method"));
        });
        let handler = service.handler();

        let request = IncomingRequest::new(
            Variant::Null,
            Variant::string("unknown"),
            Variant::Null,
        );
        let saw_failure = Rc::new(Cell::new(false));
        let saw = saw_failure.clone();
        handler(
            &request,
            Rc::new(move |response| {
                assert!(!response.is_success());
                saw.set(true);
            }),
        );
        assert_eq!(fallback_count.get(), 1);
        assert!(saw_failure.get());
    }
}
