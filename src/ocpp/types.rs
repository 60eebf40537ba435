//! Complex data types nested inside message bodies.
//!
//! [`UnitsOfMeasure`] is a stand-alone codec type: none of the supported actions carry
//! it, it is kept for sampled meter values encoded by callers.

use chrono::{DateTime, Utc};
use std::fmt;

use super::codec::{DecodeError, FieldCodec, FieldSink, Fields};
use super::enums::{ChargingProfileKind, ChargingProfilePurpose, ChargingRateUnit, RecurrencyKind};
use super::ids::TransactionId;

#[derive(Debug, Clone, PartialEq)]
pub struct ChargingProfile {
    pub charging_profile_id: i32,
    pub transaction_id: Option<TransactionId>,
    pub stack_level: u32,
    pub charging_profile_purpose: ChargingProfilePurpose,
    pub charging_profile_kind: ChargingProfileKind,
    pub recurrency_kind: Option<RecurrencyKind>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_to: Option<DateTime<Utc>>,
    pub charging_schedule: ChargingSchedule,
}

impl FieldCodec for ChargingProfile {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        let profile = Self {
            charging_profile_id: fields.mandatory(
                "chargingProfileId",
                "integer",
                |t| t.trim().parse().ok(),
            )?,
            transaction_id: fields.optional_id("transactionId", "transaction id")?,
            stack_level: fields.mandatory("stackLevel", "unsigned integer", |t| t.trim().parse().ok())?,
            charging_profile_purpose: fields
                .mandatory_parsed("chargingProfilePurpose", "charging profile purpose")?,
            charging_profile_kind: fields
                .mandatory_parsed("chargingProfileKind", "charging profile kind")?,
            recurrency_kind: fields.optional_parsed("recurrencyKind", "recurrency kind")?,
            valid_from: fields.optional_timestamp("validFrom")?,
            valid_to: fields.optional_timestamp("validTo")?,
            charging_schedule: fields.mandatory_object("chargingSchedule")?,
        };

        if profile.charging_profile_kind == ChargingProfileKind::Recurring
            && profile.recurrency_kind.is_none()
        {
            return Err(DecodeError::missing("recurrencyKind", "recurrency kind"));
        }
        Ok(profile)
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.integer("chargingProfileId", self.charging_profile_id);
        if let Some(transaction_id) = self.transaction_id {
            sink.unsigned("transactionId", transaction_id.value());
        }
        sink.unsigned("stackLevel", self.stack_level);
        sink.text("chargingProfilePurpose", self.charging_profile_purpose.as_ref());
        sink.text("chargingProfileKind", self.charging_profile_kind.as_ref());
        if let Some(kind) = self.recurrency_kind {
            sink.text("recurrencyKind", kind.as_ref());
        }
        if let Some(valid_from) = &self.valid_from {
            sink.timestamp("validFrom", valid_from);
        }
        if let Some(valid_to) = &self.valid_to {
            sink.timestamp("validTo", valid_to);
        }
        sink.object("chargingSchedule", &self.charging_schedule);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargingSchedule {
    /// Seconds; open-ended when absent.
    pub duration: Option<u32>,
    pub start_schedule: Option<DateTime<Utc>>,
    pub charging_rate_unit: ChargingRateUnit,
    pub charging_schedule_period: Vec<ChargingSchedulePeriod>,
    pub min_charging_rate: Option<f64>,
}

impl FieldCodec for ChargingSchedule {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        let periods: Vec<ChargingSchedulePeriod> = fields.list("chargingSchedulePeriod")?;
        if periods.is_empty() {
            return Err(DecodeError::missing(
                "chargingSchedulePeriod",
                "at least one charging schedule period",
            ));
        }

        Ok(Self {
            duration: fields.optional("duration", "unsigned integer", |t| t.trim().parse().ok())?,
            start_schedule: fields.optional_timestamp("startSchedule")?,
            charging_rate_unit: fields.mandatory_parsed("chargingRateUnit", "charging rate unit")?,
            charging_schedule_period: periods,
            min_charging_rate: fields.optional_decimal("minChargingRate")?,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        if let Some(duration) = self.duration {
            sink.unsigned("duration", duration);
        }
        if let Some(start) = &self.start_schedule {
            sink.timestamp("startSchedule", start);
        }
        sink.text("chargingRateUnit", self.charging_rate_unit.as_ref());
        sink.list("chargingSchedulePeriod", &self.charging_schedule_period);
        if let Some(rate) = self.min_charging_rate {
            sink.decimal("minChargingRate", rate);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChargingSchedulePeriod {
    /// Seconds from the start of the schedule.
    pub start_period: u32,
    pub limit: f64,
    pub number_phases: Option<u8>,
}

impl FieldCodec for ChargingSchedulePeriod {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        let number_phases: Option<u8> =
            fields.optional("numberPhases", "phase count", |t| t.trim().parse().ok())?;
        if let Some(phases) = number_phases {
            if !(1..=3).contains(&phases) {
                return Err(DecodeError::constraint("numberPhases", "must be 1, 2 or 3"));
            }
        }

        Ok(Self {
            start_period: fields.mandatory("startPeriod", "unsigned integer", |t| t.trim().parse().ok())?,
            limit: fields.mandatory_decimal("limit")?,
            number_phases,
        })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.unsigned("startPeriod", self.start_period);
        sink.decimal("limit", self.limit);
        if let Some(phases) = self.number_phases {
            sink.unsigned("numberPhases", phases);
        }
    }
}

/// A unit with a power-of-ten multiplier. Not part of any supported message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitsOfMeasure {
    pub unit: String,
    pub multiplier: i32,
}

impl UnitsOfMeasure {
    pub const DEFAULT_UNIT: &'static str = "Wh";
    pub const MAX_UNIT_LEN: usize = 20;
}

impl Default for UnitsOfMeasure {
    fn default() -> Self {
        Self {
            unit: Self::DEFAULT_UNIT.to_owned(),
            multiplier: 0,
        }
    }
}

impl FieldCodec for UnitsOfMeasure {
    fn decode_fields(fields: &Fields<'_>) -> Result<Self, DecodeError> {
        let unit = fields
            .optional_text("unit", Some(Self::MAX_UNIT_LEN))?
            .map(|u| u.trim().to_owned())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| Self::DEFAULT_UNIT.to_owned());
        let multiplier = fields
            .optional("multiplier", "integer", |t| t.trim().parse().ok())?
            .unwrap_or(0);
        Ok(Self { unit, multiplier })
    }

    fn encode_fields(&self, sink: &mut dyn FieldSink) {
        sink.text("unit", &self.unit);
        if self.multiplier != 0 {
            sink.integer("multiplier", self.multiplier);
        }
    }
}

impl fmt::Display for UnitsOfMeasure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (*10^{})", self.unit, self.multiplier)
    }
}
