//! Transport bindings: raw transport text in, canonical header and body out, and back.

pub mod soap;
pub mod websocket;
