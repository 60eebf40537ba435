//! String tables for OCPP 1.6 enumerations.
//!
//! Wire text equals the variant name unless noted. Parsing is exact and case-sensitive;
//! unknown text fails the enclosing decode.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize,
            Deserialize,
        )]
        pub enum $name {
            $($variant),+
        }
    };
}

wire_enum!(
    /// Result of a ReserveNow request.
    ReservationStatus { Accepted, Faulted, Occupied, Rejected, Unavailable }
);

wire_enum!(CancelReservationStatus { Accepted, Rejected });

wire_enum!(
    /// Shared by RemoteStartTransaction and RemoteStopTransaction responses.
    RemoteStartStopStatus { Accepted, Rejected }
);

wire_enum!(DataTransferStatus { Accepted, Rejected, UnknownMessageId, UnknownVendorId });

wire_enum!(ResetType { Hard, Soft });

wire_enum!(ResetStatus { Accepted, Rejected });

wire_enum!(ConfigurationStatus { Accepted, Rejected, RebootRequired, NotSupported });

wire_enum!(RegistrationStatus { Accepted, Pending, Rejected });

wire_enum!(ChargingProfilePurpose { ChargePointMaxProfile, TxDefaultProfile, TxProfile });

wire_enum!(ChargingProfileKind { Absolute, Recurring, Relative });

wire_enum!(RecurrencyKind { Daily, Weekly });

wire_enum!(
    /// W for watts, A for amperes.
    ChargingRateUnit { W, A }
);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    #[rstest]
    #[case("Accepted", ResetStatus::Accepted)]
    #[case("Rejected", ResetStatus::Rejected)]
    fn reset_status_text_table(#[case] text: &str, #[case] status: ResetStatus) {
        assert_eq!(ResetStatus::from_str(text).unwrap(), status);
        assert_eq!(status.to_string(), text);
    }

    #[rstest]
    #[case("accepted")]
    #[case("Unknown")]
    #[case("")]
    fn unknown_text_is_rejected(#[case] text: &str) {
        assert!(ResetStatus::from_str(text).is_err());
    }

    #[test]
    fn multi_word_variants_keep_their_wire_spelling() {
        assert_eq!(DataTransferStatus::UnknownVendorId.as_ref(), "UnknownVendorId");
        assert_eq!(
            ChargingProfilePurpose::from_str("TxDefaultProfile").unwrap(),
            ChargingProfilePurpose::TxDefaultProfile
        );
    }
}
