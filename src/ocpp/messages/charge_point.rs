//! Requests sent by the central system and handled by a charge point.

use chrono::{DateTime, Utc};

use super::{ocpp_action, OcppResponse, CHARGE_POINT_NS};
use crate::ocpp::codec::{DecodeError, FieldCodec, FieldSink, Fields};
use crate::ocpp::enums::{
    CancelReservationStatus, ChargingProfilePurpose, ConfigurationStatus, DataTransferStatus,
    RemoteStartStopStatus, ReservationStatus, ResetStatus, ResetType,
};
use crate::ocpp::ids::{ConnectorId, IdToken, ReservationId, TransactionId, VendorId};
use crate::ocpp::types::ChargingProfile;

ocpp_action!(
    /// Reserve a connector for a specific id tag.
    ReserveNow,
    namespace = CHARGE_POINT_NS,
    request = ReserveNowRequest => "reserveNowRequest",
    response = ReserveNowResponse => "reserveNowResponse",
);

#[derive(Debug, Clone, PartialEq)]
pub struct ReserveNowRequest {
    pub connector_id: ConnectorId,
    pub expiry_date: DateTime<Utc>,
    pub id_tag: IdToken,
    pub parent_id_tag: Option<IdToken>,
    pub reservation_id: ReservationId,
}

impl FieldCodec for ReserveNowRequest {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            connector_id: fields.mandatory_id("connectorId", "connector id")?,
            expiry_date: fields.mandatory_timestamp("expiryDate")?,
            id_tag: fields.mandatory_id("idTag", "id tag")?,
            parent_id_tag: fields.optional_id("parentIdTag", "id tag")?,
            reservation_id: fields.mandatory_id("reservationId", "reservation id")?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.unsigned("connectorId", self.connector_id.value());
        sink.timestamp("expiryDate", &self.expiry_date);
        sink.text("idTag", self.id_tag.as_str());
        if let Some(parent) = &self.parent_id_tag {
            sink.text("parentIdTag", parent.as_str());
        }
        sink.unsigned("reservationId", self.reservation_id.value());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReserveNowResponse {
    pub status: ReservationStatus,
}

impl FieldCodec for ReserveNowResponse {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: fields.mandatory_parsed("status", "reservation status")?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("status", self.status.as_ref());
    }
}

impl OcppResponse for ReserveNowResponse {
    fn failed() -> Self {
        Self {
            status: ReservationStatus::Rejected,
        }
    }
}

ocpp_action!(
    CancelReservation,
    namespace = CHARGE_POINT_NS,
    request = CancelReservationRequest => "cancelReservationRequest",
    response = CancelReservationResponse => "cancelReservationResponse",
);

#[derive(Debug, Clone, PartialEq)]
pub struct CancelReservationRequest {
    pub reservation_id: ReservationId,
}

impl FieldCodec for CancelReservationRequest {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            reservation_id: fields.mandatory_id("reservationId", "reservation id")?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.unsigned("reservationId", self.reservation_id.value());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancelReservationResponse {
    pub status: CancelReservationStatus,
}

impl FieldCodec for CancelReservationResponse {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: fields.mandatory_parsed("status", "cancel reservation status")?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("status", self.status.as_ref());
    }
}

impl OcppResponse for CancelReservationResponse {
    fn failed() -> Self {
        Self {
            status: CancelReservationStatus::Rejected,
        }
    }
}

ocpp_action!(
    /// Start a transaction on behalf of a remote user, optionally with a transaction profile.
    RemoteStartTransaction,
    namespace = CHARGE_POINT_NS,
    request = RemoteStartTransactionRequest => "remoteStartTransactionRequest",
    response = RemoteStartTransactionResponse => "remoteStartTransactionResponse",
);

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteStartTransactionRequest {
    /// Must be greater than zero when present.
    pub connector_id: Option<ConnectorId>,
    pub id_tag: IdToken,
    /// Must have purpose `TxProfile` when present.
    pub charging_profile: Option<ChargingProfile>,
}

impl RemoteStartTransactionRequest {
    pub fn new(
        id_tag: IdToken,
        connector_id: Option<ConnectorId>,
        charging_profile: Option<ChargingProfile>,
    ) -> Result<Self, DecodeError> {
        Self::check(connector_id, charging_profile.as_ref())?;
        Ok(Self {
            connector_id,
            id_tag,
            charging_profile,
        })
    }

    fn check(connector_id: Option<ConnectorId>, profile: Option<&ChargingProfile>) -> Result<(), DecodeError> {
        if connector_id.is_some_and(|c| c.value() == 0) {
            return Err(DecodeError::constraint("connectorId", "must be greater than zero"));
        }
        if profile.is_some_and(|p| p.charging_profile_purpose != ChargingProfilePurpose::TxProfile) {
            return Err(DecodeError::constraint(
                "chargingProfile.chargingProfilePurpose",
                "must be TxProfile",
            ));
        }
        Ok(())
    }
}

impl FieldCodec for RemoteStartTransactionRequest {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        let connector_id: Option<ConnectorId> = fields.optional_id("connectorId", "connector id")?;
        let charging_profile: Option<ChargingProfile> = fields.optional_object("chargingProfile")?;
        Self::check(connector_id, charging_profile.as_ref())?;

        Ok(Self {
            connector_id,
            id_tag: fields.mandatory_id("idTag", "id tag")?,
            charging_profile,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        if let Some(connector_id) = self.connector_id {
            sink.unsigned("connectorId", connector_id.value());
        }
        sink.text("idTag", self.id_tag.as_str());
        if let Some(profile) = &self.charging_profile {
            sink.object("chargingProfile", profile);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteStartTransactionResponse {
    pub status: RemoteStartStopStatus,
}

impl FieldCodec for RemoteStartTransactionResponse {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: fields.mandatory_parsed("status", "remote start status")?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("status", self.status.as_ref());
    }
}

impl OcppResponse for RemoteStartTransactionResponse {
    fn failed() -> Self {
        Self {
            status: RemoteStartStopStatus::Rejected,
        }
    }
}

ocpp_action!(
    RemoteStopTransaction,
    namespace = CHARGE_POINT_NS,
    request = RemoteStopTransactionRequest => "remoteStopTransactionRequest",
    response = RemoteStopTransactionResponse => "remoteStopTransactionResponse",
);

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteStopTransactionRequest {
    pub transaction_id: TransactionId,
}

impl FieldCodec for RemoteStopTransactionRequest {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            transaction_id: fields.mandatory_id("transactionId", "transaction id")?,
        })
    }

    // Peers expect the transaction id as a JSON string.
    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("transactionId", &self.transaction_id.to_string());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteStopTransactionResponse {
    pub status: RemoteStartStopStatus,
}

impl FieldCodec for RemoteStopTransactionResponse {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: fields.mandatory_parsed("status", "remote stop status")?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("status", self.status.as_ref());
    }
}

impl OcppResponse for RemoteStopTransactionResponse {
    fn failed() -> Self {
        Self {
            status: RemoteStartStopStatus::Rejected,
        }
    }
}

ocpp_action!(
    /// Vendor-specific payload exchange.
    DataTransfer,
    namespace = CHARGE_POINT_NS,
    request = DataTransferRequest => "dataTransferRequest",
    response = DataTransferResponse => "dataTransferResponse",
);

#[derive(Debug, Clone, PartialEq)]
pub struct DataTransferRequest {
    pub vendor_id: VendorId,
    pub message_id: Option<String>,
    pub data: Option<String>,
}

impl DataTransferRequest {
    pub const MAX_MESSAGE_ID_LEN: usize = 50;

    pub fn new(vendor_id: VendorId, message_id: Option<String>, data: Option<String>) -> Result<Self, DecodeError> {
        let len = message_id.as_deref().map_or(0, |m| m.chars().count());
        if len > Self::MAX_MESSAGE_ID_LEN {
            return Err(DecodeError::constraint(
                "messageId",
                format!("at most {} characters allowed, got {len}", Self::MAX_MESSAGE_ID_LEN),
            ));
        }
        Ok(Self {
            vendor_id,
            message_id,
            data,
        })
    }
}

impl FieldCodec for DataTransferRequest {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            vendor_id: fields.mandatory_id("vendorId", "vendor id")?,
            message_id: fields.optional_text("messageId", Some(Self::MAX_MESSAGE_ID_LEN))?,
            data: fields.optional_text("data", None)?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("vendorId", self.vendor_id.as_str());
        if let Some(message_id) = &self.message_id {
            sink.text("messageId", message_id);
        }
        if let Some(data) = &self.data {
            sink.text("data", data);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataTransferResponse {
    pub status: DataTransferStatus,
    pub data: Option<String>,
}

impl FieldCodec for DataTransferResponse {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: fields.mandatory_parsed("status", "data transfer status")?,
            data: fields.optional_text("data", None)?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("status", self.status.as_ref());
        if let Some(data) = &self.data {
            sink.text("data", data);
        }
    }
}

impl OcppResponse for DataTransferResponse {
    fn failed() -> Self {
        Self {
            status: DataTransferStatus::Rejected,
            data: None,
        }
    }
}

ocpp_action!(
    GetLocalListVersion,
    namespace = CHARGE_POINT_NS,
    request = GetLocalListVersionRequest => "getLocalListVersionRequest",
    response = GetLocalListVersionResponse => "getLocalListVersionResponse",
);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetLocalListVersionRequest;

impl FieldCodec for GetLocalListVersionRequest {
    fn decode_fields(_fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self)
    }

    fn encode_fields(&self, _sink: &mut dyn FieldSink) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetLocalListVersionResponse {
    /// 0 when no list is installed, -1 when local authorization lists are unsupported.
    pub list_version: i32,
}

impl FieldCodec for GetLocalListVersionResponse {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            list_version: fields.mandatory("listVersion", "integer", |t| t.trim().parse().ok())?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.integer("listVersion", self.list_version);
    }
}

impl OcppResponse for GetLocalListVersionResponse {
    fn failed() -> Self {
        Self { list_version: -1 }
    }
}

ocpp_action!(
    Reset,
    namespace = CHARGE_POINT_NS,
    request = ResetRequest => "resetRequest",
    response = ResetResponse => "resetResponse",
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetRequest {
    pub kind: ResetType,
}

impl FieldCodec for ResetRequest {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            kind: fields.mandatory_parsed("type", "reset type")?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("type", self.kind.as_ref());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetResponse {
    pub status: ResetStatus,
}

impl FieldCodec for ResetResponse {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: fields.mandatory_parsed("status", "reset status")?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("status", self.status.as_ref());
    }
}

impl OcppResponse for ResetResponse {
    fn failed() -> Self {
        Self {
            status: ResetStatus::Rejected,
        }
    }
}

ocpp_action!(
    ChangeConfiguration,
    namespace = CHARGE_POINT_NS,
    request = ChangeConfigurationRequest => "changeConfigurationRequest",
    response = ChangeConfigurationResponse => "changeConfigurationResponse",
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeConfigurationRequest {
    pub key: String,
    pub value: String,
}

impl ChangeConfigurationRequest {
    pub const MAX_KEY_LEN: usize = 50;
    pub const MAX_VALUE_LEN: usize = 500;

    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, DecodeError> {
        let (key, value) = (key.into().trim().to_owned(), value.into());
        if key.is_empty() {
            return Err(DecodeError::constraint("key", "must not be empty"));
        }
        for (field, text, max) in [("key", &key, Self::MAX_KEY_LEN), ("value", &value, Self::MAX_VALUE_LEN)] {
            let len = text.chars().count();
            if len > max {
                return Err(DecodeError::constraint(
                    field,
                    format!("at most {max} characters allowed, got {len}"),
                ));
            }
        }
        Ok(Self { key, value })
    }
}

impl FieldCodec for ChangeConfigurationRequest {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            key: fields.mandatory_non_empty("key", Some(Self::MAX_KEY_LEN))?,
            value: fields.mandatory_text("value", Some(Self::MAX_VALUE_LEN))?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("key", &self.key);
        sink.text("value", &self.value);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeConfigurationResponse {
    pub status: ConfigurationStatus,
}

impl FieldCodec for ChangeConfigurationResponse {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: fields.mandatory_parsed("status", "configuration status")?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("status", self.status.as_ref());
    }
}

impl OcppResponse for ChangeConfigurationResponse {
    fn failed() -> Self {
        Self {
            status: ConfigurationStatus::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocpp::codec::{parse_timestamp, DecodeError, OcppCodec};
    use crate::ocpp::enums::{ChargingProfileKind, ChargingRateUnit};
    use crate::ocpp::messages::Action;
    use crate::ocpp::types::{ChargingSchedule, ChargingSchedulePeriod};
    use crate::ocpp::xml::XmlElement;
    use rstest::rstest;
    use serde_json::json;
    use std::fmt::Debug;

    fn tag(text: &str) -> IdToken {
        IdToken::try_parse(text).unwrap()
    }

    fn tx_profile() -> ChargingProfile {
        ChargingProfile {
            charging_profile_id: 7,
            transaction_id: None,
            stack_level: 1,
            charging_profile_purpose: ChargingProfilePurpose::TxProfile,
            charging_profile_kind: ChargingProfileKind::Absolute,
            recurrency_kind: None,
            valid_from: parse_timestamp("2024-06-01T00:00:00Z"),
            valid_to: None,
            charging_schedule: ChargingSchedule {
                duration: Some(3600),
                start_schedule: None,
                charging_rate_unit: ChargingRateUnit::A,
                charging_schedule_period: vec![
                    ChargingSchedulePeriod {
                        start_period: 0,
                        limit: 16.5,
                        number_phases: Some(3),
                    },
                    ChargingSchedulePeriod {
                        start_period: 1800,
                        limit: 8.0,
                        number_phases: None,
                    },
                ],
                min_charging_rate: None,
            },
        }
    }

    /// Encodes `value` in both formats and decodes it back, directly and through text detection.
    fn assert_round_trips<T: OcppCodec + PartialEq + Debug>(value: T) {
        let json = value.encode_json();
        assert_eq!(T::decode_json(&json).unwrap(), value, "json {json}");
        assert_eq!(T::decode_text(&json.to_string()).unwrap(), value, "json text {json}");

        let xml = value.encode_xml();
        let text = xml.to_xml_string(&[]);
        assert_eq!(T::decode_xml(&xml).unwrap(), value, "xml {text}");
        assert_eq!(T::decode_text(&text).unwrap(), value, "xml text {text}");
    }

    #[rstest]
    #[case::reserve_now_request(|| assert_round_trips(ReserveNowRequest {
        connector_id: ConnectorId::new(0),
        expiry_date: parse_timestamp("2024-06-01T12:30:00Z").unwrap(),
        id_tag: tag("TAG-1"),
        parent_id_tag: Some(tag("PARENT")),
        reservation_id: ReservationId::new(99),
    }))]
    #[case::reserve_now_response(|| assert_round_trips(ReserveNowResponse { status: ReservationStatus::Occupied }))]
    #[case::cancel_reservation_request(|| assert_round_trips(CancelReservationRequest {
        reservation_id: ReservationId::new(99),
    }))]
    #[case::cancel_reservation_response(|| assert_round_trips(CancelReservationResponse {
        status: CancelReservationStatus::Accepted,
    }))]
    #[case::remote_start_request(|| assert_round_trips(
        RemoteStartTransactionRequest::new(tag("TAG"), Some(ConnectorId::new(2)), Some(tx_profile())).unwrap()
    ))]
    #[case::remote_start_request_bare(|| assert_round_trips(
        RemoteStartTransactionRequest::new(tag("TAG"), None, None).unwrap()
    ))]
    #[case::remote_start_response(|| assert_round_trips(RemoteStartTransactionResponse {
        status: RemoteStartStopStatus::Accepted,
    }))]
    #[case::remote_stop_request(|| assert_round_trips(RemoteStopTransactionRequest {
        transaction_id: TransactionId::new(12345),
    }))]
    #[case::remote_stop_response(|| assert_round_trips(RemoteStopTransactionResponse {
        status: RemoteStartStopStatus::Rejected,
    }))]
    #[case::data_transfer_request(|| assert_round_trips(
        DataTransferRequest::new(VendorId::try_parse("com.example").unwrap(), Some("Ping".into()), Some("{\"a\":1}".into()))
            .unwrap()
    ))]
    #[case::data_transfer_response(|| assert_round_trips(DataTransferResponse {
        status: DataTransferStatus::UnknownMessageId,
        data: Some("<payload/>".into()),
    }))]
    #[case::get_local_list_version_request(|| assert_round_trips(GetLocalListVersionRequest))]
    #[case::get_local_list_version_response(|| assert_round_trips(GetLocalListVersionResponse { list_version: 4 }))]
    #[case::reset_request(|| assert_round_trips(ResetRequest { kind: ResetType::Hard }))]
    #[case::reset_response(|| assert_round_trips(ResetResponse { status: ResetStatus::Accepted }))]
    #[case::change_configuration_request(|| assert_round_trips(
        ChangeConfigurationRequest::new("HeartbeatInterval", "300").unwrap()
    ))]
    #[case::change_configuration_response(|| assert_round_trips(ChangeConfigurationResponse {
        status: ConfigurationStatus::RebootRequired,
    }))]
    fn every_message_survives_both_formats(#[case] check: fn()) {
        check();
    }

    #[test]
    fn json_text_fields_must_be_strings() {
        let err = DataTransferRequest::decode_json(&json!({"vendorId": true})).unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { ref field, expected: "string", .. } if field == "vendorId"));

        let err = ReserveNowRequest::decode_json(&json!({
            "connectorId": 1,
            "expiryDate": "2024-06-01T12:00:00Z",
            "idTag": 12345,
            "reservationId": 1
        }))
        .unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { ref field, expected: "string", .. } if field == "idTag"));

        let err = ChangeConfigurationRequest::decode_json(&json!({"key": "K", "value": 5})).unwrap_err();
        assert_eq!(err.field(), Some("value"));
    }

    #[test]
    fn constructors_refuse_what_decoding_refuses() {
        let err = RemoteStartTransactionRequest::new(tag("T"), Some(ConnectorId::new(0)), None).unwrap_err();
        assert_eq!(err.field(), Some("connectorId"));

        let mut profile = tx_profile();
        profile.charging_profile_purpose = ChargingProfilePurpose::ChargePointMaxProfile;
        let err = RemoteStartTransactionRequest::new(tag("T"), None, Some(profile)).unwrap_err();
        assert_eq!(err.field(), Some("chargingProfile.chargingProfilePurpose"));

        let vendor = VendorId::try_parse("X").unwrap();
        let err = DataTransferRequest::new(vendor, Some("m".repeat(51)), None).unwrap_err();
        assert!(matches!(err, DecodeError::Constraint { .. }));

        assert!(ChangeConfigurationRequest::new(" ", "1").is_err());
        assert!(ChangeConfigurationRequest::new("K", "v".repeat(501)).is_err());
        assert_eq!(ChangeConfigurationRequest::new(" K ", "").unwrap().key, "K");
    }

    #[test]
    fn remote_stop_keeps_the_transaction_id_as_text() {
        let request =
            RemoteStopTransactionRequest::decode_json(&json!({"transactionId": "12345"})).unwrap();
        assert_eq!(request.transaction_id.to_string(), "12345");
        assert_eq!(request.encode_json(), json!({"transactionId": "12345"}));

        let numeric =
            RemoteStopTransactionRequest::decode_json(&json!({"transactionId": 12345})).unwrap();
        assert_eq!(numeric, request);
    }

    #[test]
    fn remote_stop_rejects_negative_ids() {
        let err = RemoteStopTransactionRequest::decode_json(&json!({"transactionId": "-5"}))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { ref field, .. } if field == "transactionId"));
    }

    #[test]
    fn reserve_now_decodes_from_namespaced_xml() {
        let xml = r#"
            <ns:reserveNowRequest xmlns:ns="urn://Ocpp/Cp/2015/10/">
                <ns:connectorId>1</ns:connectorId>
                <ns:expiryDate>2024-06-01T12:00:00Z</ns:expiryDate>
                <ns:idTag>TAG-1</ns:idTag>
                <ns:reservationId>99</ns:reservationId>
            </ns:reserveNowRequest>"#;
        let element = XmlElement::parse(xml).unwrap();
        let request = ReserveNowRequest::decode_xml(&element).unwrap();
        assert_eq!(request.connector_id, ConnectorId::new(1));
        assert_eq!(request.reservation_id, ReservationId::new(99));
        assert_eq!(request.parent_id_tag, None);

        let again = ReserveNowRequest::decode_xml(&request.encode_xml()).unwrap();
        assert_eq!(again, request);
    }

    #[test]
    fn reserve_now_without_id_tag_fails() {
        let err = ReserveNowRequest::decode_json(&json!({
            "connectorId": 1,
            "expiryDate": "2024-06-01T12:00:00Z",
            "reservationId": 1
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("idTag"));
    }

    #[test]
    fn data_transfer_failed_response_is_rejected_without_data() {
        assert_eq!(DataTransferResponse::failed().encode_json(), json!({"status": "Rejected"}));
    }

    #[test]
    fn data_transfer_message_id_is_length_limited() {
        let err = DataTransferRequest::decode_json(&json!({
            "vendorId": "X",
            "messageId": "m".repeat(51)
        }))
        .unwrap_err();
        assert!(matches!(err, DecodeError::Constraint { .. }));
    }

    #[test]
    fn remote_start_requires_a_transaction_profile() {
        let body = json!({
            "idTag": "TAG",
            "connectorId": 1,
            "chargingProfile": {
                "chargingProfileId": 1,
                "stackLevel": 0,
                "chargingProfilePurpose": "TxDefaultProfile",
                "chargingProfileKind": "Relative",
                "chargingSchedule": {
                    "chargingRateUnit": "W",
                    "chargingSchedulePeriod": [{"startPeriod": 0, "limit": 11000.0}]
                }
            }
        });
        let err = RemoteStartTransactionRequest::decode_json(&body).unwrap_err();
        assert!(matches!(err, DecodeError::Constraint { .. }));

        let err = RemoteStartTransactionRequest::decode_json(&json!({"idTag": "T", "connectorId": 0}))
            .unwrap_err();
        assert_eq!(err.field(), Some("connectorId"));
    }

    #[test]
    fn get_local_list_version_round_trips_empty_bodies() {
        let xml = GetLocalListVersionRequest.encode_xml();
        assert!(xml.children.is_empty());
        assert_eq!(GetLocalListVersionRequest::decode_xml(&xml).unwrap(), GetLocalListVersionRequest);
        assert_eq!(GetLocalListVersionResponse::failed().list_version, -1);
    }

    #[test]
    fn reset_uses_the_type_field() {
        let request = ResetRequest::decode_json(&json!({"type": "Soft"})).unwrap();
        assert_eq!(request.kind, ResetType::Soft);
        assert!(ResetRequest::decode_json(&json!({"type": "soft"})).is_err());
    }

    #[test]
    fn change_configuration_key_must_not_be_blank() {
        let err = ChangeConfigurationRequest::decode_json(&json!({"key": "  ", "value": "1"}))
            .unwrap_err();
        assert!(matches!(err, DecodeError::Constraint { .. }));
    }

    #[test]
    fn action_names_and_element_names_line_up() {
        assert_eq!(ReserveNow::NAME, "ReserveNow");
        assert_eq!(<ReserveNow as Action>::Request::XML_NAME, "reserveNowRequest");
        assert_eq!(<DataTransfer as Action>::Response::NAMESPACE, "urn://Ocpp/Cp/2015/10/");
    }
}
