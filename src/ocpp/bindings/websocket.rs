//! OCPP-J framing: JSON arrays over a WebSocket text channel.
//!
//! ```text
//! [2, "<id>", "<Action>", {payload}]                          CALL
//! [3, "<id>", {payload}]                                      CALLRESULT
//! [4, "<id>", "<errorCode>", "<description>", {details}]      CALLERROR
//! ```

use serde_json::{json, Map, Value};
use strum::{AsRefStr, Display, EnumString};
use thiserror::Error;

use crate::ocpp::codec::DecodeError;
use crate::ocpp::header::Header;
use crate::ocpp::ids::MessageId;

/// OCPP-J message type id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Call = 2,
    CallResult = 3,
    CallError = 4,
}

impl TryFrom<u64> for MessageType {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(MessageType::Call),
            3 => Ok(MessageType::CallResult),
            4 => Ok(MessageType::CallError),
            other => Err(other),
        }
    }
}

/// CALLERROR codes. `OccurenceConstraintViolation` keeps the OCPP 1.6 spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr)]
pub enum ErrorCode {
    NotImplemented,
    NotSupported,
    InternalError,
    ProtocolError,
    SecurityError,
    FormationViolation,
    PropertyConstraintViolation,
    OccurenceConstraintViolation,
    TypeConstraintViolation,
    GenericError,
}

impl ErrorCode {
    /// CALLERROR code for a payload that failed to decode.
    pub fn for_decode_error(err: &DecodeError) -> Self {
        match err {
            DecodeError::Missing { .. } => ErrorCode::OccurenceConstraintViolation,
            DecodeError::Invalid { .. } => ErrorCode::TypeConstraintViolation,
            DecodeError::Constraint { .. } => ErrorCode::PropertyConstraintViolation,
            DecodeError::UnexpectedElement { .. }
            | DecodeError::NotAnObject { .. }
            | DecodeError::Syntax { .. } => ErrorCode::FormationViolation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("frame is not valid JSON: {0}")]
    Json(String),
    #[error("frame is not a JSON array")]
    NotAnArray,
    #[error("frame has no numeric message type id")]
    MissingMessageType,
    #[error("unknown message type id {type_id}")]
    UnknownMessageType {
        type_id: u64,
        message_id: Option<MessageId>,
    },
    #[error("frame has no usable message id")]
    MissingMessageId,
    #[error("{kind} frame must have {expected} elements, got {found}")]
    WrongLength {
        kind: &'static str,
        expected: &'static str,
        found: usize,
        message_id: MessageId,
    },
    #[error("{kind} frame element {index} must be {expected}")]
    WrongElement {
        kind: &'static str,
        index: usize,
        expected: &'static str,
        message_id: MessageId,
    },
}

impl FramingError {
    /// Message id of the offending frame, when it could be read.
    pub fn message_id(&self) -> Option<&MessageId> {
        match self {
            FramingError::UnknownMessageType { message_id, .. } => message_id.as_ref(),
            FramingError::WrongLength { message_id, .. } | FramingError::WrongElement { message_id, .. } => {
                Some(message_id)
            }
            _ => None,
        }
    }

    /// CALLERROR code to answer with when the frame id is recoverable.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            FramingError::UnknownMessageType { .. } => ErrorCode::ProtocolError,
            _ => ErrorCode::FormationViolation,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Call {
        message_id: MessageId,
        action: String,
        payload: Value,
    },
    CallResult {
        message_id: MessageId,
        payload: Value,
    },
    CallError {
        message_id: MessageId,
        code: ErrorCode,
        description: String,
        details: Value,
    },
}

impl Frame {
    pub fn call(message_id: MessageId, action: impl Into<String>, payload: Value) -> Self {
        Frame::Call {
            message_id,
            action: action.into(),
            payload,
        }
    }

    pub fn result(message_id: MessageId, payload: Value) -> Self {
        Frame::CallResult { message_id, payload }
    }

    pub fn error(message_id: MessageId, code: ErrorCode, description: impl Into<String>) -> Self {
        Frame::CallError {
            message_id,
            code,
            description: description.into(),
            details: Value::Object(Map::new()),
        }
    }

    /// CALLRESULT answering the request a response header was derived from.
    pub fn answer(response_header: &Header, payload: Value) -> Self {
        let message_id = response_header
            .relates_to
            .clone()
            .unwrap_or_else(|| response_header.message_id.clone());
        Frame::CallResult { message_id, payload }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Frame::Call { .. } => MessageType::Call,
            Frame::CallResult { .. } => MessageType::CallResult,
            Frame::CallError { .. } => MessageType::CallError,
        }
    }

    pub fn message_id(&self) -> &MessageId {
        match self {
            Frame::Call { message_id, .. }
            | Frame::CallResult { message_id, .. }
            | Frame::CallError { message_id, .. } => message_id,
        }
    }

    pub fn parse(text: &str) -> Result<Frame, FramingError> {
        let value: Value = serde_json::from_str(text).map_err(|e| FramingError::Json(e.to_string()))?;
        let Value::Array(mut items) = value else {
            return Err(FramingError::NotAnArray);
        };

        let type_id = items
            .first()
            .and_then(Value::as_u64)
            .ok_or(FramingError::MissingMessageType)?;
        let message_id = items.get(1).and_then(message_id_of);
        let message_type = MessageType::try_from(type_id)
            .map_err(|type_id| FramingError::UnknownMessageType { type_id, message_id: message_id.clone() })?;
        let message_id = message_id.ok_or(FramingError::MissingMessageId)?;

        let kind = match message_type {
            MessageType::Call => "CALL",
            MessageType::CallResult => "CALLRESULT",
            MessageType::CallError => "CALLERROR",
        };
        let wrong_element = |index: usize, expected: &'static str| FramingError::WrongElement {
            kind,
            index,
            expected,
            message_id: message_id.clone(),
        };

        match message_type {
            MessageType::Call => {
                if items.len() != 4 {
                    return Err(FramingError::WrongLength {
                        kind,
                        expected: "4",
                        found: items.len(),
                        message_id: message_id.clone(),
                    });
                }
                let payload = items.pop().unwrap_or(Value::Null);
                let action = match items.pop() {
                    Some(Value::String(action)) if !action.trim().is_empty() => action,
                    _ => return Err(wrong_element(2, "a non-empty action name")),
                };
                Ok(Frame::Call {
                    message_id,
                    action,
                    payload,
                })
            }
            MessageType::CallResult => {
                if items.len() != 3 {
                    return Err(FramingError::WrongLength {
                        kind,
                        expected: "3",
                        found: items.len(),
                        message_id: message_id.clone(),
                    });
                }
                let payload = items.pop().unwrap_or(Value::Null);
                Ok(Frame::CallResult { message_id, payload })
            }
            MessageType::CallError => {
                // Some peers omit the details object.
                if !(4..=5).contains(&items.len()) {
                    return Err(FramingError::WrongLength {
                        kind,
                        expected: "4 or 5",
                        found: items.len(),
                        message_id: message_id.clone(),
                    });
                }
                let details = items.get(4).cloned().unwrap_or_else(|| Value::Object(Map::new()));
                let code = items
                    .get(2)
                    .and_then(Value::as_str)
                    .and_then(|c| c.parse::<ErrorCode>().ok())
                    .ok_or_else(|| wrong_element(2, "a known error code"))?;
                let description = items
                    .get(3)
                    .and_then(Value::as_str)
                    .ok_or_else(|| wrong_element(3, "a description string"))?
                    .to_owned();
                Ok(Frame::CallError {
                    message_id,
                    code,
                    description,
                    details,
                })
            }
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Frame::Call {
                message_id,
                action,
                payload,
            } => json!([MessageType::Call as u8, message_id.as_str(), action, payload]),
            Frame::CallResult { message_id, payload } => {
                json!([MessageType::CallResult as u8, message_id.as_str(), payload])
            }
            Frame::CallError {
                message_id,
                code,
                description,
                details,
            } => json!([
                MessageType::CallError as u8,
                message_id.as_str(),
                code.as_ref(),
                description,
                details
            ]),
        }
    }

    pub fn to_text(&self) -> String {
        self.to_value().to_string()
    }
}

fn message_id_of(value: &Value) -> Option<MessageId> {
    match value {
        Value::String(text) => MessageId::try_parse(text),
        _ => None,
    }
}
