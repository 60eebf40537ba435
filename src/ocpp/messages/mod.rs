//! OCPP 1.6 message definitions.
//!
//! Every protocol operation is a zero-sized [`Action`] marker tying together its name, its
//! request body and its response body. Response bodies carry a designated failed value used
//! whenever dispatch produces no application answer.

use std::fmt::Debug;

use super::codec::OcppCodec;

pub mod central_system;
pub mod charge_point;

pub use central_system::*;
pub use charge_point::*;

/// XML namespace of bodies handled by a charge point.
pub const CHARGE_POINT_NS: &str = "urn://Ocpp/Cp/2015/10/";
/// XML namespace of bodies handled by a central system.
pub const CENTRAL_SYSTEM_NS: &str = "urn://Ocpp/Cs/2015/10/";

/// A response body with a defined "no real answer available" value.
pub trait OcppResponse: OcppCodec {
    fn failed() -> Self;
}

/// One request/response pair of the protocol.
pub trait Action: Send + Sync + 'static {
    /// Action name as it appears on the wire, e.g. `ReserveNow`.
    const NAME: &'static str;

    type Request: OcppCodec + Clone + Debug + PartialEq + Send + Sync + 'static;
    type Response: OcppResponse + Clone + Debug + PartialEq + Send + Sync + 'static;
}

macro_rules! ocpp_action {
    (
        $(#[$meta:meta])*
        $name:ident,
        namespace = $ns:expr,
        request = $request:ty => $request_xml:literal,
        response = $response:ty => $response_xml:literal $(,)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name;

        impl $crate::ocpp::messages::Action for $name {
            const NAME: &'static str = stringify!($name);
            type Request = $request;
            type Response = $response;
        }

        impl $crate::ocpp::codec::OcppCodec for $request {
            const XML_NAME: &'static str = $request_xml;
            const NAMESPACE: &'static str = $ns;
        }

        impl $crate::ocpp::codec::OcppCodec for $response {
            const XML_NAME: &'static str = $response_xml;
            const NAMESPACE: &'static str = $ns;
        }
    };
}

pub(crate) use ocpp_action;
