//! Station metadata: the template a simulated station is built from.

use rust_ocpp::v1_6::messages::boot_notification::BootNotificationRequest;
use serde::{Deserialize, Serialize};

/// Default `stopAfterHours` when a template doesn't override it.
pub const DEFAULT_STOP_AFTER_HOURS: f64 = 0.25;

fn default_stop_after_hours() -> f64 {
    DEFAULT_STOP_AFTER_HOURS
}
fn default_min_delay() -> f64 {
    15.0
}
fn default_max_delay() -> f64 {
    30.0
}
fn default_min_duration() -> f64 {
    60.0
}
fn default_max_duration() -> f64 {
    1200.0
}
fn default_probability() -> f64 {
    1.0
}

/// A station's Automatic Transaction Generator parameters.
///
/// `min_delay`/`max_delay`/`min_duration`/`max_duration` defaults are this
/// crate's own choice, chosen to keep a demo run's transactions short and
/// frequent; see DESIGN.md.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AutomaticTransactionGeneratorConfiguration {
    pub stop_after_hours: f64,
    pub min_delay_between_two_transactions: f64,
    pub max_delay_between_two_transactions: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub probability_of_start: f64,
    pub require_authorize: bool,
}

impl Default for AutomaticTransactionGeneratorConfiguration {
    fn default() -> Self {
        Self {
            stop_after_hours: default_stop_after_hours(),
            min_delay_between_two_transactions: default_min_delay(),
            max_delay_between_two_transactions: default_max_delay(),
            min_duration: default_min_duration(),
            max_duration: default_max_duration(),
            probability_of_start: default_probability(),
            require_authorize: false,
        }
    }
}

/// Default `MeterValueSampleInterval` in milliseconds.
pub const DEFAULT_METER_VALUES_INTERVAL_MS: u64 = 60_000;

/// A typical single-phase AC EVSE's continuous power draw, used to derive a
/// synthetic energy-register increment from an elapsed duration — this
/// simulator has no real meter behind `Connector::energy_active_import_register`.
pub const SYNTHETIC_CHARGE_RATE_WATTS: f64 = 7_400.0;

/// Energy (Wh) a connector accrues over `elapsed_ms` at
/// [`SYNTHETIC_CHARGE_RATE_WATTS`]. Used to tick the energy register both
/// while a transaction is running (`application::atg::connector_loop`) and
/// when an on-demand `MeterValues` sample is taken
/// (`application::commands::handlers::ocpp_forward::meter_values`).
pub fn synthetic_energy_wh(elapsed_ms: u64) -> u64 {
    (SYNTHETIC_CHARGE_RATE_WATTS * elapsed_ms as f64 / 3_600_000.0) as u64
}

/// The template metadata a simulated station is constructed from.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StationInfo {
    pub charge_point_vendor: String,
    pub charge_point_model: String,
    #[serde(default)]
    pub charge_point_serial_number: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default = "default_meter_value_sample_interval_ms")]
    pub meter_value_sample_interval_ms: u64,
    #[serde(default)]
    pub automatic_transaction_generator: AutomaticTransactionGeneratorConfiguration,
}

fn default_meter_value_sample_interval_ms() -> u64 {
    DEFAULT_METER_VALUES_INTERVAL_MS
}

impl StationInfo {
    /// The default `BootNotificationRequest` this station sends on connect,
    /// derived from the template metadata.
    pub fn default_boot_notification_request(&self) -> BootNotificationRequest {
        BootNotificationRequest {
            charge_point_vendor: self.charge_point_vendor.clone(),
            charge_point_model: self.charge_point_model.clone(),
            charge_point_serial_number: self.charge_point_serial_number.clone(),
            charge_box_serial_number: None,
            firmware_version: self.firmware_version.clone(),
            iccid: None,
            imsi: None,
            meter_type: None,
            meter_serial_number: None,
        }
    }
}
