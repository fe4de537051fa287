//! The worker channel's procedure names as a closed Rust enum, with a
//! static name table taking the place of string dispatch. The handler
//! side lives in `handlers::dispatch` as a single exhaustive `match`
//! rather than a parallel function-pointer table, since Rust's
//! exhaustiveness checking already guarantees every variant is handled.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    StartChargingStation,
    StopChargingStation,
    DeleteChargingStations,
    OpenConnection,
    CloseConnection,
    StartAutomaticTransactionGenerator,
    StopAutomaticTransactionGenerator,
    SetSupervisionUrl,
    StartTransaction,
    StopTransaction,
    Authorize,
    StatusNotification,
    Heartbeat,
    DataTransfer,
    DiagnosticsStatusNotification,
    FirmwareStatusNotification,
    BootNotification,
    MeterValues,
}

/// Wire name as it appears in the `command` field of a request envelope —
/// for the forwarding procedures this is also the OCPP action name sent to
/// the OCPP Request Service.
const PROCEDURE_NAMES: &[(&str, Procedure)] = &[
    ("StartChargingStation", Procedure::StartChargingStation),
    ("StopChargingStation", Procedure::StopChargingStation),
    ("DeleteChargingStations", Procedure::DeleteChargingStations),
    ("OpenConnection", Procedure::OpenConnection),
    ("CloseConnection", Procedure::CloseConnection),
    (
        "StartAutomaticTransactionGenerator",
        Procedure::StartAutomaticTransactionGenerator,
    ),
    (
        "StopAutomaticTransactionGenerator",
        Procedure::StopAutomaticTransactionGenerator,
    ),
    ("SetSupervisionUrl", Procedure::SetSupervisionUrl),
    ("StartTransaction", Procedure::StartTransaction),
    ("StopTransaction", Procedure::StopTransaction),
    ("Authorize", Procedure::Authorize),
    ("StatusNotification", Procedure::StatusNotification),
    ("Heartbeat", Procedure::Heartbeat),
    ("DataTransfer", Procedure::DataTransfer),
    (
        "DiagnosticsStatusNotification",
        Procedure::DiagnosticsStatusNotification,
    ),
    (
        "FirmwareStatusNotification",
        Procedure::FirmwareStatusNotification,
    ),
    ("BootNotification", Procedure::BootNotification),
    ("MeterValues", Procedure::MeterValues),
];

impl Procedure {
    pub fn from_wire_name(name: &str) -> Option<Self> {
        PROCEDURE_NAMES
            .iter()
            .find(|(wire, _)| *wire == name)
            .map(|(_, procedure)| *procedure)
    }

    pub fn wire_name(&self) -> &'static str {
        PROCEDURE_NAMES
            .iter()
            .find(|(_, procedure)| procedure == self)
            .map(|(wire, _)| *wire)
            .expect("every Procedure variant has an entry in PROCEDURE_NAMES")
    }

    /// The two ATG start/stop procedures are the only ones that keep
    /// `connectorIds` in their payload after targeting fields are stripped.
    pub fn is_atg_start_stop(&self) -> bool {
        matches!(
            self,
            Self::StartAutomaticTransactionGenerator | Self::StopAutomaticTransactionGenerator
        )
    }

    /// The OCPP action name to forward this procedure's payload under, for
    /// the eight plain forwarding procedures (`BOOT_NOTIFICATION` and
    /// `METER_VALUES` have bespoke handlers and are not included here even
    /// though they also forward).
    pub fn plain_forward_action(&self) -> Option<&'static str> {
        match self {
            Self::StartTransaction
            | Self::StopTransaction
            | Self::Authorize
            | Self::StatusNotification
            | Self::Heartbeat
            | Self::DataTransfer
            | Self::DiagnosticsStatusNotification
            | Self::FirmwareStatusNotification => Some(self.wire_name()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_round_trips_through_its_wire_name() {
        for (wire, procedure) in PROCEDURE_NAMES {
            assert_eq!(Procedure::from_wire_name(wire), Some(*procedure));
            assert_eq!(procedure.wire_name(), *wire);
        }
    }

    #[test]
    fn unknown_wire_name_is_none() {
        assert_eq!(Procedure::from_wire_name("NotARealCommand"), None);
    }

    #[test]
    fn only_atg_start_stop_keep_connector_ids() {
        assert!(Procedure::StartAutomaticTransactionGenerator.is_atg_start_stop());
        assert!(Procedure::StopAutomaticTransactionGenerator.is_atg_start_stop());
        assert!(!Procedure::MeterValues.is_atg_start_stop());
    }
}
