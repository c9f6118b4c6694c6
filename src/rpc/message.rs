//! The seed types requests and responses travel as.
//!
//! A request crosses the wire as a seed with header `rpc.Request` and
//! fields `serial`, `subject`, `selector` and `arguments`; a response as
//! `rpc.Response` with `serial`, `is_success` and `payload`. Both are
//! registered with the message socket's type registry so the push stream
//! hands the socket ready-made natives.

use std::rc::Rc;

use crate::marshal::{Native, SeedType};
use crate::variant::{Arena, Variant};

pub(crate) struct RequestMessage {
    pub subject: Variant,
    pub selector: Variant,
    pub arguments: Variant,
    pub serial: u64,
}

pub(crate) struct RequestMessageType;

impl SeedType for RequestMessageType {
    fn header(&self) -> Variant {
        Variant::string("rpc.Request")
    }

    fn instantiate(&self, seed: Variant, arena: &Arena) -> Variant {
        let message = RequestMessage {
            serial: seed.seed_get_field(&"serial".into()).integer_value() as u64,
            subject: seed.seed_get_field(&"subject".into()),
            selector: seed.seed_get_field(&"selector".into()),
            arguments: seed.seed_get_field(&"arguments".into()),
        };
        Variant::Native(arena.new_native(message, Rc::new(RequestMessageType)))
    }

    fn serialize(&self, object: &Native, arena: &Arena) -> Variant {
        let message = object
            .downcast::<RequestMessage>()
            .expect("native is not an rpc request");
        let seed = arena.new_seed();
        seed.set_header(self.header());
        seed.set_field("serial", message.serial as i64);
        seed.set_field("subject", message.subject.clone());
        seed.set_field("selector", message.selector.clone());
        seed.set_field("arguments", message.arguments.clone());
        Variant::Seed(seed)
    }
}

pub(crate) struct ResponseMessage {
    pub is_success: bool,
    pub payload: Variant,
    pub serial: u64,
}

pub(crate) struct ResponseMessageType;

impl SeedType for ResponseMessageType {
    fn header(&self) -> Variant {
        Variant::string("rpc.Response")
    }

    fn instantiate(&self, seed: Variant, arena: &Arena) -> Variant {
        let message = ResponseMessage {
            serial: seed.seed_get_field(&"serial".into()).integer_value() as u64,
            is_success: seed.seed_get_field(&"is_success".into()).bool_value(),
            payload: seed.seed_get_field(&"payload".into()),
        };
        Variant::Native(arena.new_native(message, Rc::new(ResponseMessageType)))
    }

    fn serialize(&self, object: &Native, arena: &Arena) -> Variant {
        let message = object
            .downcast::<ResponseMessage>()
            .expect("native is not an rpc response");
        let seed = arena.new_seed();
        seed.set_header(self.header());
        seed.set_field("serial", message.serial as i64);
        seed.set_field("is_success", message.is_success);
        seed.set_field("payload", message.payload.clone());
        Variant::Seed(seed)
    }
}
