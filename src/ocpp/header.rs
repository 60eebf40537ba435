//! Transport-neutral message header and response header derivation.

use chrono::{DateTime, Utc};

use super::ids::{ChargeBoxId, Identity, MessageId};

/// Header metadata wrapped around every request and response body.
///
/// Built once by a transport binding and never mutated; response headers are derived
/// from request headers with [`Header::derive_response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub charge_box_id: Option<ChargeBoxId>,
    pub source: Option<Identity>,
    pub destination: Option<Identity>,
    pub message_id: MessageId,
    /// Set on responses only; the `message_id` of the request being answered.
    pub relates_to: Option<MessageId>,
    pub action: String,
    pub timestamp: DateTime<Utc>,
}

impl Header {
    pub fn request(action: impl Into<String>, message_id: MessageId, timestamp: DateTime<Utc>) -> Self {
        Self {
            charge_box_id: None,
            source: None,
            destination: None,
            message_id,
            relates_to: None,
            action: action.into(),
            timestamp,
        }
    }

    pub fn with_charge_box(mut self, charge_box_id: ChargeBoxId) -> Self {
        self.charge_box_id = Some(charge_box_id);
        self
    }

    pub fn with_route(mut self, source: Option<Identity>, destination: Option<Identity>) -> Self {
        self.source = source;
        self.destination = destination;
        self
    }

    pub fn is_response(&self) -> bool {
        self.relates_to.is_some()
    }

    /// Header for the response to this request: correlates through `relates_to`, swaps
    /// source and destination, keeps the action name and charge box identity.
    pub fn derive_response(&self, response_id: MessageId, now: DateTime<Utc>) -> Header {
        Header {
            charge_box_id: self.charge_box_id.clone(),
            source: self.destination.clone(),
            destination: self.source.clone(),
            message_id: response_id,
            relates_to: Some(self.message_id.clone()),
            action: self.action.clone(),
            timestamp: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request() -> Header {
        Header::request(
            "ReserveNow",
            MessageId::try_parse("urn:uuid:req-1").unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        )
        .with_charge_box(ChargeBoxId::try_parse("CP-7").unwrap())
        .with_route(Identity::try_parse("http://cs/"), Identity::try_parse("http://cp/"))
    }

    #[test]
    fn derive_response_mirrors_the_request() {
        let req = request();
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 5).unwrap();
        let resp = req.derive_response(MessageId::try_parse("resp-1").unwrap(), now);

        assert_eq!(resp.relates_to.as_ref(), Some(&req.message_id));
        assert_eq!(resp.source, req.destination);
        assert_eq!(resp.destination, req.source);
        assert_eq!(resp.action, "ReserveNow");
        assert_eq!(resp.charge_box_id, req.charge_box_id);
        assert_eq!(resp.timestamp, now);
        assert!(resp.is_response());
        assert!(!req.is_response());
    }

    #[test]
    fn derive_response_is_pure() {
        let req = request();
        let now = Utc::now();
        let id = MessageId::try_parse("r").unwrap();
        assert_eq!(req.derive_response(id.clone(), now), req.derive_response(id, now));
    }
}
