//! Identifier value types.
//!
//! Text identifiers are non-empty and compared byte-for-byte. Message and tracking ids are
//! opaque and kept exactly as received; the others are trimmed first. Numeric identifiers
//! wrap unsigned integers, accept only ASCII digits and are totally ordered.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("{kind} must not be empty")]
    Empty { kind: &'static str },
    #[error("{kind} must be at most {max} characters, got {len}")]
    TooLong {
        kind: &'static str,
        max: usize,
        len: usize,
    },
    #[error("{kind} must be an unsigned integer, got `{text}`")]
    NotNumeric { kind: &'static str, text: String },
}

/// Identifier readable from a wire field.
pub trait WireId: FromStr<Err = IdError> {
    /// Text ids must arrive as JSON strings; numeric ids also accept JSON numbers.
    const TEXTUAL: bool;
}

macro_rules! text_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal, $max:expr, trim = $trim:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub const MAX_LEN: Option<usize> = $max;

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn try_parse(text: &str) -> Option<Self> {
                text.parse().ok()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(text: &str) -> Result<Self, Self::Err> {
                let text = if $trim { text.trim() } else { text };
                if text.is_empty() {
                    return Err(IdError::Empty { kind: $kind });
                }
                if let Some(max) = Self::MAX_LEN {
                    let len = text.chars().count();
                    if len > max {
                        return Err(IdError::TooLong { kind: $kind, max, len });
                    }
                }
                Ok(Self(text.to_owned()))
            }
        }

        impl WireId for $name {
            const TEXTUAL: bool = true;
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(text: String) -> Result<Self, Self::Error> {
                text.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
    ($(#[$meta:meta])* $name:ident, $kind:literal, $max:expr) => {
        text_id!($(#[$meta])* $name, $kind, $max, trim = true);
    };
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $repr:ty, $kind:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            pub const fn new(value: $repr) -> Self {
                Self(value)
            }

            pub const fn value(self) -> $repr {
                self.0
            }

            pub fn try_parse(text: &str) -> Option<Self> {
                text.parse().ok()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(text: &str) -> Result<Self, Self::Err> {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return Err(IdError::Empty { kind: $kind });
                }
                // `u64::from_str` would let a leading '+' through
                if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(IdError::NotNumeric {
                        kind: $kind,
                        text: text.to_owned(),
                    });
                }
                trimmed
                    .parse::<$repr>()
                    .map(Self)
                    .map_err(|_| IdError::NotNumeric {
                        kind: $kind,
                        text: text.to_owned(),
                    })
            }
        }

        impl WireId for $name {
            const TEXTUAL: bool = false;
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

text_id!(
    /// Transport message identifier (`wsa:MessageID` or the OCPP-J unique id).
    MessageId,
    "message id",
    None,
    trim = false
);

text_id!(
    /// Correlates log lines and handler invocations belonging to one inbound request.
    EventTrackingId,
    "event tracking id",
    None,
    trim = false
);

text_id!(
    /// Identity of a charge box as announced in the SOAP header or the websocket path.
    ChargeBoxId,
    "charge box identity",
    Some(255)
);

text_id!(
    /// Address of an endpoint (`wsa:From` / `wsa:To`).
    Identity,
    "endpoint identity",
    None
);

text_id!(IdToken, "id tag", Some(20));

text_id!(VendorId, "vendor id", Some(255));

numeric_id!(TransactionId, u64, "transaction id");
numeric_id!(ReservationId, u64, "reservation id");
numeric_id!(
    /// Connector on a charge point; 0 addresses the charge point as a whole.
    ConnectorId,
    u32,
    "connector id"
);

impl MessageId {
    /// Fresh random id for an outgoing message.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Fresh random id in `urn:uuid:` form, as used in `wsa:MessageID`.
    pub fn random_urn() -> Self {
        Self(format!("urn:uuid:{}", Uuid::new_v4()))
    }
}

impl EventTrackingId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}
