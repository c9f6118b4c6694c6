//! RPC: typed requests and responses over a framed socket.
//!
//! The pieces, bottom up:
//!
//! - [`MessageSocket`] — pairs outgoing requests with incoming responses
//!   by serial and hands incoming requests to an installed callback.
//! - [`Service`] — a method table with a fallback, producing the request
//!   callback a socket wants.
//! - [`StreamServiceConnector`] — binds an input and an output byte
//!   stream into a ready endpoint.
//!
//! Handlers reply through a [`ResponseCallback`] that closes over the
//! request's serial, so replies may happen immediately or be deferred
//! until long after other frames have passed.

mod message;
mod service;
mod socket;

pub use service::{Method, RequestData, Service, StreamServiceConnector};
pub use socket::{
    IncomingRequest, IncomingResponse, MessageSocket, OutgoingRequest, OutgoingResponse,
    RequestCallback, ResponseCallback,
};
