//! Canonical structured event names used in log records.

// Dispatch.
pub const DISPATCH_START: &str = "dispatch_start";
pub const DISPATCH_RESOLVED: &str = "dispatch_resolved";
pub const DISPATCH_EMPTY_SET: &str = "dispatch_empty_set";
pub const DISPATCH_TIMEOUT: &str = "dispatch_timeout";
pub const DISPATCH_HANDLER_FAILED: &str = "dispatch_handler_failed";
pub const HANDLER_REGISTERED: &str = "handler_registered";
pub const HANDLER_UNREGISTERED: &str = "handler_unregistered";
pub const HOOK_FAILED: &str = "hook_failed";
pub const HOOK_PANICKED: &str = "hook_panicked";

// Inbound transport.
pub const SOAP_REQUEST: &str = "soap_request";
pub const SOAP_FAULT: &str = "soap_fault";
pub const WS_FRAME_RECEIVED: &str = "ws_frame_received";
pub const WS_FRAME_REJECTED: &str = "ws_frame_rejected";
pub const WS_FRAME_DROPPED: &str = "ws_frame_dropped";
pub const WS_CALL_ERROR_SENT: &str = "ws_call_error_sent";

// Sessions and outgoing calls.
pub const SESSION_OPENED: &str = "session_opened";
pub const SESSION_CLOSED: &str = "session_closed";
pub const CALL_SENT: &str = "call_sent";
pub const CALL_COMPLETED: &str = "call_completed";
pub const CALL_FAILED: &str = "call_failed";
pub const CALL_UNMATCHED_RESPONSE: &str = "call_unmatched_response";
