//! Request/response correlation over a framed socket.
//!
//! Data you receive is *incoming*, data you construct and transmit is
//! *outgoing*: you send an [`OutgoingRequest`] and get back an
//! [`IncomingResponse`], and you receive an [`IncomingRequest`] and
//! answer it with an [`OutgoingResponse`]. The [`MessageSocket`] in the
//! middle tags each request with a serial, keeps the map of pending
//! promises, and invokes the installed request callback for the peer's
//! requests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use crate::error::Result;
use crate::marshal::TypeRegistry;
use crate::rpc::message::{
    RequestMessage, RequestMessageType, ResponseMessage, ResponseMessageType,
};
use crate::socket::{OutputSocket, ParsedMessage, PushInputStream};
use crate::variant::{Arena, Variant};

/// Handed to request handlers to deliver their reply. The callback closes
/// over the request's serial, so the handler may hold onto it and respond
/// long after other frames have gone by.
pub type ResponseCallback = Rc<dyn Fn(OutgoingResponse)>;

/// Installed on a [`MessageSocket`]; invoked once per incoming request.
pub type RequestCallback = Rc<dyn Fn(&IncomingRequest, ResponseCallback)>;

/// A request under construction: subject, selector, and an argument
/// vector built in the request's own arena.
pub struct OutgoingRequest {
    subject: Variant,
    selector: Variant,
    arguments: Variant,
    arena: Arena,
}

impl OutgoingRequest {
    pub fn new(subject: impl Into<Variant>, selector: impl Into<Variant>) -> OutgoingRequest {
        OutgoingRequest {
            subject: subject.into(),
            selector: selector.into(),
            arguments: Variant::Null,
            arena: Arena::new(),
        }
    }

    /// Build a request with positional arguments.
    pub fn with_arguments(
        subject: impl Into<Variant>,
        selector: impl Into<Variant>,
        arguments: &[Variant],
    ) -> OutgoingRequest {
        let mut request = OutgoingRequest::new(subject, selector);
        for (index, argument) in arguments.iter().enumerate() {
            request.set_argument(index as u32, argument.clone());
        }
        request
    }

    pub fn subject(&self) -> &Variant {
        &self.subject
    }

    pub fn set_subject(&mut self, value: impl Into<Variant>) {
        self.subject = value.into();
    }

    pub fn selector(&self) -> &Variant {
        &self.selector
    }

    pub fn set_selector(&mut self, value: impl Into<Variant>) {
        self.selector = value.into();
    }

    pub fn arguments(&self) -> &Variant {
        &self.arguments
    }

    /// Install the whole argument value, which may be any variant.
    pub fn set_arguments(&mut self, value: impl Into<Variant>) {
        self.arguments = value.into();
    }

    /// Set the `index`th positional argument, materializing the argument
    /// array on first use and padding any gap with nulls.
    pub fn set_argument(&mut self, index: u32, value: impl Into<Variant>) {
        let array = match &self.arguments {
            Variant::Array(array) => array.clone(),
            _ => {
                let array = self.arena.new_array();
                self.arguments = Variant::Array(array.clone());
                array
            }
        };
        while array.length() <= index {
            array.add(Variant::Null);
        }
        array.set_element(index as usize, value.into());
    }
}

/// A request received from the peer.
pub struct IncomingRequest {
    subject: Variant,
    selector: Variant,
    arguments: Variant,
}

impl IncomingRequest {
    pub(crate) fn new(subject: Variant, selector: Variant, arguments: Variant) -> IncomingRequest {
        IncomingRequest {
            subject,
            selector,
            arguments,
        }
    }

    pub fn subject(&self) -> &Variant {
        &self.subject
    }

    pub fn selector(&self) -> &Variant {
        &self.selector
    }

    pub fn arguments(&self) -> &Variant {
        &self.arguments
    }
}

/// A reply constructed by a request handler: success or failure, each
/// carrying a payload.
#[derive(Clone)]
pub struct OutgoingResponse {
    is_success: bool,
    payload: Variant,
}

impl OutgoingResponse {
    /// A successful response with the given value.
    pub fn success(value: impl Into<Variant>) -> OutgoingResponse {
        OutgoingResponse {
            is_success: true,
            payload: value.into(),
        }
    }

    /// A failure response with the given error value.
    pub fn failure(error: impl Into<Variant>) -> OutgoingResponse {
        OutgoingResponse {
            is_success: false,
            payload: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.is_success
    }

    pub fn payload(&self) -> &Variant {
        &self.payload
    }
}

enum ResponseState {
    Pending,
    Settled {
        is_success: bool,
        value: Variant,
        /// Keeps the arena that owns the value alive.
        _owner: Option<Arena>,
    },
}

/// A one-shot promise for the response to a request sent through a
/// [`MessageSocket`]. Settles when the matching response frame is
/// processed; drive the socket's input to make progress.
#[derive(Clone)]
pub struct IncomingResponse {
    state: Rc<RefCell<ResponseState>>,
}

impl IncomingResponse {
    fn pending() -> IncomingResponse {
        IncomingResponse {
            state: Rc::new(RefCell::new(ResponseState::Pending)),
        }
    }

    /// Whether either outcome has arrived.
    pub fn is_settled(&self) -> bool {
        !matches!(*self.state.borrow(), ResponseState::Pending)
    }

    /// Settled with success.
    pub fn is_fulfilled(&self) -> bool {
        matches!(
            *self.state.borrow(),
            ResponseState::Settled {
                is_success: true,
                ..
            }
        )
    }

    /// Settled with failure.
    pub fn is_rejected(&self) -> bool {
        matches!(
            *self.state.borrow(),
            ResponseState::Settled {
                is_success: false,
                ..
            }
        )
    }

    /// The carried value, or `default` while unsettled.
    pub fn peek_value(&self, default: Variant) -> Variant {
        match &*self.state.borrow() {
            ResponseState::Pending => default,
            ResponseState::Settled { value, .. } => value.clone(),
        }
    }

    fn settle(&self, is_success: bool, value: Variant, owner: Option<Arena>) {
        let mut state = self.state.borrow_mut();
        if !matches!(*state, ResponseState::Pending) {
            panic!("response settled twice");
        }
        *state = ResponseState::Settled {
            is_success,
            value,
            _owner: owner,
        };
    }
}

struct SocketState {
    next_serial: u64,
    pending: HashMap<u64, IncomingResponse>,
}

/// A socket you send and receive typed requests through.
///
/// Incoming frames arrive through the push stream the socket was wired to
/// at construction; outgoing frames go through the shared output socket.
/// Correlation is by serial, so responses may come back in any order.
pub struct MessageSocket<W: Write> {
    out: Rc<RefCell<OutputSocket<W>>>,
    state: Rc<RefCell<SocketState>>,
}

impl<W: Write + 'static> MessageSocket<W> {
    /// Wire a message socket to the given push stream and output socket.
    /// `handler` runs for every incoming request.
    pub fn new(
        in_stream: &Rc<RefCell<PushInputStream>>,
        out: Rc<RefCell<OutputSocket<W>>>,
        handler: RequestCallback,
    ) -> MessageSocket<W> {
        let state = Rc::new(RefCell::new(SocketState {
            next_serial: 1,
            pending: HashMap::new(),
        }));

        // The rpc message types resolve ahead of whatever the stream
        // already knew about.
        let mut types = TypeRegistry::new();
        types.register_type(Rc::new(RequestMessageType));
        types.register_type(Rc::new(ResponseMessageType));
        if let Some(previous) = in_stream.borrow().type_registry() {
            types.set_fallback(previous);
        }
        in_stream.borrow_mut().set_type_registry(Rc::new(types));

        let action_state = state.clone();
        let action_out = out.clone();
        in_stream.borrow_mut().add_action(Box::new(move |message| {
            Self::on_incoming_message(&action_state, &action_out, &handler, message);
        }));

        MessageSocket { out, state }
    }

    /// Frame and send a request, returning the promise for its response.
    pub fn send_request(&self, request: &OutgoingRequest) -> Result<IncomingResponse> {
        let serial = {
            let mut state = self.state.borrow_mut();
            let serial = state.next_serial;
            state.next_serial += 1;
            serial
        };
        let promise = IncomingResponse::pending();
        self.state
            .borrow_mut()
            .pending
            .insert(serial, promise.clone());

        let arena = Arena::new();
        let message = RequestMessage {
            subject: request.subject().clone(),
            selector: request.selector().clone(),
            arguments: request.arguments().clone(),
            serial,
        };
        let wrapped = Variant::Native(arena.new_native(message, Rc::new(RequestMessageType)));
        self.out.borrow_mut().send_value(&wrapped)?;
        Ok(promise)
    }

    fn on_incoming_message(
        state: &Rc<RefCell<SocketState>>,
        out: &Rc<RefCell<OutputSocket<W>>>,
        handler: &RequestCallback,
        message: &ParsedMessage,
    ) {
        if let Some(request) = message.value().native_as::<RequestMessage>() {
            let incoming = IncomingRequest::new(
                request.subject.clone(),
                request.selector.clone(),
                request.arguments.clone(),
            );
            let serial = request.serial;
            let reply_out = out.clone();
            let callback: ResponseCallback = Rc::new(move |response: OutgoingResponse| {
                Self::send_response(&reply_out, serial, response);
            });
            handler(&incoming, callback);
            return;
        }
        if let Some(response) = message.value().native_as::<ResponseMessage>() {
            let pending = state.borrow_mut().pending.remove(&response.serial);
            match pending {
                Some(promise) => {
                    // The payload lives in the block's transient arena;
                    // the promise adopts it for as long as it is held.
                    promise.settle(
                        response.is_success,
                        response.payload.clone(),
                        Some(message.owner().clone()),
                    );
                }
                None => {
                    tracing::warn!(serial = response.serial, "incoming response out of band");
                }
            }
            return;
        }
        tracing::warn!(value = ?message.value(), "unexpected incoming message");
    }

    fn send_response(out: &Rc<RefCell<OutputSocket<W>>>, serial: u64, response: OutgoingResponse) {
        let arena = Arena::new();
        let message = ResponseMessage {
            is_success: response.is_success(),
            payload: response.payload().clone(),
            serial,
        };
        let wrapped = Variant::Native(arena.new_native(message, Rc::new(ResponseMessageType)));
        if let Err(error) = out.borrow_mut().send_value(&wrapped) {
            tracing::warn!(%error, serial, "failed to send response");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outgoing_request_arguments() {
        let mut request = OutgoingRequest::new(Variant::Null, "frobnicate");
        assert!(request.arguments().is_null());
        request.set_argument(0, 43);
        request.set_argument(2, "later");
        let arguments = request.arguments();
        assert_eq!(arguments.array_length(), 3);
        assert_eq!(arguments.array_get(0), Variant::integer(43));
        assert!(arguments.array_get(1).is_null());
        assert_eq!(arguments.array_get(2), Variant::string("later"));
    }

    #[test]
    fn test_whole_value_arguments() {
        let mut request = OutgoingRequest::new("subject", "selector");
        request.set_arguments("just a string");
        assert_eq!(request.arguments(), &Variant::string("just a string"));
    }

    #[test]
    fn test_promise_lifecycle() {
        let promise = IncomingResponse::pending();
        assert!(!promise.is_settled());
        assert!(!promise.is_fulfilled());
        assert_eq!(promise.peek_value(Variant::integer(9)), Variant::integer(9));
        promise.settle(true, Variant::integer(18), None);
        assert!(promise.is_settled());
        assert!(promise.is_fulfilled());
        assert!(!promise.is_rejected());
        assert_eq!(promise.peek_value(Variant::Null), Variant::integer(18));
    }

    #[test]
    #[should_panic(expected = "settled twice")]
    fn test_double_settlement_panics() {
        let promise = IncomingResponse::pending();
        promise.settle(true, Variant::Null, None);
        promise.settle(false, Variant::Null, None);
    }

    #[test]
    fn test_rejected_promise() {
        let promise = IncomingResponse::pending();
        promise.settle(false, Variant::string("boom"), None);
        assert!(promise.is_settled());
        assert!(!promise.is_fulfilled());
        assert!(promise.is_rejected());
        assert_eq!(promise.peek_value(Variant::Null), Variant::string("boom"));
    }
}
