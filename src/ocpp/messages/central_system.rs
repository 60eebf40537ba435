//! Requests sent by a charge point and handled by the central system.

use chrono::{DateTime, Utc};

use super::{ocpp_action, OcppResponse, CENTRAL_SYSTEM_NS};
use crate::ocpp::codec::{DecodeError, FieldCodec, FieldSink, Fields, WireFormat};
use crate::ocpp::enums::RegistrationStatus;

ocpp_action!(
    /// Sent by a charge point after (re)booting.
    BootNotification,
    namespace = CENTRAL_SYSTEM_NS,
    request = BootNotificationRequest => "bootNotificationRequest",
    response = BootNotificationResponse => "bootNotificationResponse",
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootNotificationRequest {
    pub charge_point_vendor: String,
    pub charge_point_model: String,
    pub charge_point_serial_number: Option<String>,
    pub charge_box_serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub iccid: Option<String>,
    pub imsi: Option<String>,
    pub meter_type: Option<String>,
    pub meter_serial_number: Option<String>,
}

impl BootNotificationRequest {
    pub fn new(vendor: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            charge_point_vendor: vendor.into(),
            charge_point_model: model.into(),
            charge_point_serial_number: None,
            charge_box_serial_number: None,
            firmware_version: None,
            iccid: None,
            imsi: None,
            meter_type: None,
            meter_serial_number: None,
        }
    }
}

impl FieldCodec for BootNotificationRequest {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            charge_point_vendor: fields.mandatory_non_empty("chargePointVendor", Some(20))?,
            charge_point_model: fields.mandatory_non_empty("chargePointModel", Some(20))?,
            charge_point_serial_number: fields.optional_text("chargePointSerialNumber", Some(25))?,
            charge_box_serial_number: fields.optional_text("chargeBoxSerialNumber", Some(25))?,
            firmware_version: fields.optional_text("firmwareVersion", Some(50))?,
            iccid: fields.optional_text("iccid", Some(20))?,
            imsi: fields.optional_text("imsi", Some(20))?,
            meter_type: fields.optional_text("meterType", Some(25))?,
            meter_serial_number: fields.optional_text("meterSerialNumber", Some(25))?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("chargePointVendor", &self.charge_point_vendor);
        sink.text("chargePointModel", &self.charge_point_model);
        let optionals = [
            ("chargePointSerialNumber", &self.charge_point_serial_number),
            ("chargeBoxSerialNumber", &self.charge_box_serial_number),
            ("firmwareVersion", &self.firmware_version),
            ("iccid", &self.iccid),
            ("imsi", &self.imsi),
            ("meterType", &self.meter_type),
            ("meterSerialNumber", &self.meter_serial_number),
        ];
        for (name, value) in optionals {
            if let Some(value) = value {
                sink.text(name, value);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootNotificationResponse {
    pub status: RegistrationStatus,
    pub current_time: DateTime<Utc>,
    /// Heartbeat interval in seconds.
    pub interval: u32,
}

impl BootNotificationResponse {
    /// The interval is `heartbeatInterval` in SOAP bodies and `interval` in OCPP-J payloads.
    fn interval_field(format: WireFormat) -> &'static str {
        match format {
            WireFormat::Xml => "heartbeatInterval",
            WireFormat::Json => "interval",
        }
    }
}

impl FieldCodec for BootNotificationResponse {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            status: fields.mandatory_parsed("status", "registration status")?,
            current_time: fields.mandatory_timestamp("currentTime")?,
            interval: fields.mandatory(
                Self::interval_field(fields.format()),
                "unsigned integer",
                |t| t.trim().parse().ok(),
            )?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("status", self.status.as_ref());
        sink.timestamp("currentTime", &self.current_time);
        let field = Self::interval_field(sink.format());
        sink.unsigned(field, self.interval);
    }
}

impl OcppResponse for BootNotificationResponse {
    fn failed() -> Self {
        Self {
            status: RegistrationStatus::Rejected,
            current_time: Utc::now(),
            interval: 0,
        }
    }
}

ocpp_action!(
    Heartbeat,
    namespace = CENTRAL_SYSTEM_NS,
    request = HeartbeatRequest => "heartbeatRequest",
    response = HeartbeatResponse => "heartbeatResponse",
);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeartbeatRequest;

impl FieldCodec for HeartbeatRequest {
    fn decode_fields(_fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self)
    }

    fn encode_fields(&self, _sink: &mut dyn FieldSink) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatResponse {
    pub current_time: DateTime<Utc>,
}

impl FieldCodec for HeartbeatResponse {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            current_time: fields.mandatory_timestamp("currentTime")?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.timestamp("currentTime", &self.current_time);
    }
}

impl OcppResponse for HeartbeatResponse {
    fn failed() -> Self {
        Self {
            current_time: Utc::now(),
        }
    }
}
