//! The simulated charging station handle.
//!
//! Owns the connector table, station metadata, the optional OCPP Request
//! Service (present only after the WebSocket opens and the codec
//! negotiates), and the registration/availability flags the ATG and the
//! command dispatcher both read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use rand::seq::SliceRandom;
use rust_ocpp::v1_6::messages::boot_notification::BootNotificationRequest;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::connector::Connector;
use super::ports::OcppRequestService;
use super::station_info::StationInfo;

/// Connector id 0 denotes the station itself; it never runs transactions.
pub const STATION_CONNECTOR_ID: u32 = 0;

pub struct ChargingStation {
    hash_id: String,
    station_info: StationInfo,
    boot_notification_request: BootNotificationRequest,
    connectors: DashMap<u32, Connector>,
    authorized_tags: Option<Vec<String>>,
    ocpp_request_service: RwLock<Option<Arc<dyn OcppRequestService>>>,
    supervision_url: RwLock<String>,
    registered: AtomicBool,
    available: AtomicBool,
    deleted: AtomicBool,
}

impl ChargingStation {
    /// Expand a station template into a station with `connector_count`
    /// positive connectors plus the fixed id-0 station-level entry.
    pub fn from_template(
        hash_id: impl Into<String>,
        station_info: StationInfo,
        connector_count: u32,
        authorized_tags: Option<Vec<String>>,
        supervision_url: impl Into<String>,
    ) -> Self {
        let connectors = DashMap::new();
        connectors.insert(STATION_CONNECTOR_ID, Connector::new());
        for id in 1..=connector_count {
            connectors.insert(id, Connector::new());
        }

        let boot_notification_request = station_info.default_boot_notification_request();

        Self {
            hash_id: hash_id.into(),
            station_info,
            boot_notification_request,
            connectors,
            authorized_tags,
            ocpp_request_service: RwLock::new(None),
            supervision_url: RwLock::new(supervision_url.into()),
            registered: AtomicBool::new(false),
            available: AtomicBool::new(true),
            deleted: AtomicBool::new(false),
        }
    }

    pub fn hash_id(&self) -> &str {
        &self.hash_id
    }

    pub fn station_info(&self) -> &StationInfo {
        &self.station_info
    }

    pub fn boot_notification_request(&self) -> &BootNotificationRequest {
        &self.boot_notification_request
    }

    /// The positive connector ids this station exposes, in ascending order.
    pub fn connector_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .connectors
            .iter()
            .map(|entry| *entry.key())
            .filter(|id| *id != STATION_CONNECTOR_ID)
            .collect();
        ids.sort_unstable();
        ids
    }

    // ── Lifecycle ────────────────────────────────────────────────

    pub fn start(&self) {
        if self.available.swap(true, Ordering::SeqCst) {
            warn!(hash_id = self.hash_id, "start() called on an already-started station");
            return;
        }
        info!(hash_id = self.hash_id, "Charging station started");
    }

    pub fn stop(&self) {
        if !self.available.swap(false, Ordering::SeqCst) {
            warn!(hash_id = self.hash_id, "stop() called on an already-stopped station");
            return;
        }
        info!(hash_id = self.hash_id, "Charging station stopped");
    }

    pub fn delete(&self, delete_configuration: bool) {
        self.deleted.store(true, Ordering::SeqCst);
        info!(
            hash_id = self.hash_id,
            delete_configuration, "Charging station deleted"
        );
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    pub async fn open_ws_connection(&self, service: Arc<dyn OcppRequestService>) {
        *self.ocpp_request_service.write().await = Some(service);
        info!(hash_id = self.hash_id, "WebSocket connection opened");
    }

    pub async fn close_ws_connection(&self) {
        *self.ocpp_request_service.write().await = None;
        self.registered.store(false, Ordering::SeqCst);
        info!(hash_id = self.hash_id, "WebSocket connection closed");
    }

    pub async fn ocpp_request_service(&self) -> Option<Arc<dyn OcppRequestService>> {
        self.ocpp_request_service.read().await.clone()
    }

    pub async fn set_supervision_url(&self, url: String) {
        *self.supervision_url.write().await = url;
    }

    pub async fn supervision_url(&self) -> String {
        self.supervision_url.read().await.clone()
    }

    // ── Registration / availability queries ────────────────────────

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    pub fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::SeqCst);
    }

    pub fn is_charging_station_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    pub fn is_connector_available(&self, connector_id: u32) -> bool {
        self.connectors
            .get(&connector_id)
            .map(|c| c.available)
            .unwrap_or(false)
    }

    pub fn set_connector_available(&self, connector_id: u32, available: bool) {
        if let Some(mut connector) = self.connectors.get_mut(&connector_id) {
            connector.available = available;
        }
    }

    // ── Id-tag / ATG parameter queries ──────────────────────────────

    pub fn has_authorized_tags(&self) -> bool {
        self.authorized_tags
            .as_ref()
            .map(|tags| !tags.is_empty())
            .unwrap_or(false)
    }

    pub fn get_random_id_tag(&self) -> Option<String> {
        self.authorized_tags
            .as_ref()
            .and_then(|tags| tags.choose(&mut rand::thread_rng()))
            .cloned()
    }

    pub fn get_automatic_transaction_generator_require_authorize(&self) -> bool {
        self.station_info.automatic_transaction_generator.require_authorize
    }

    // ── Connector queries / mutation ────────────────────────────────

    pub fn get_connector(&self, connector_id: u32) -> Option<Connector> {
        self.connectors.get(&connector_id).map(|c| c.clone())
    }

    pub fn start_connector_transaction(
        &self,
        connector_id: u32,
        transaction_id: i64,
        id_tag: Option<String>,
    ) {
        if let Some(mut connector) = self.connectors.get_mut(&connector_id) {
            connector.start_transaction(transaction_id, id_tag);
        }
    }

    pub fn stop_connector_transaction(&self, connector_id: u32) {
        if let Some(mut connector) = self.connectors.get_mut(&connector_id) {
            connector.stop_transaction();
        }
    }

    /// Bump the connector's cumulative energy register — this simulator's
    /// stand-in for a real meter. Ticked by `application::atg::connector_loop`
    /// while a transaction is running and by the `MeterValues` command
    /// handler on an on-demand sample, both via
    /// `domain::station_info::synthetic_energy_wh`.
    pub fn add_connector_energy(&self, connector_id: u32, delta_wh: u64) {
        if let Some(mut connector) = self.connectors.get_mut(&connector_id) {
            connector.energy_active_import_register =
                connector.energy_active_import_register.saturating_add(delta_wh);
        }
    }

    /// Read the active-energy register for the connector currently
    /// running `transaction_id`. `final_value` has no effect on this
    /// simulator's register (it never buffers interim readings) but is
    /// kept in the signature to match the interface this is called through.
    pub fn get_energy_active_import_register_by_transaction_id(
        &self,
        transaction_id: i64,
        _final_value: bool,
    ) -> u64 {
        self.connectors
            .iter()
            .find(|entry| entry.transaction_started && entry.transaction_id == transaction_id)
            .map(|entry| entry.energy_active_import_register)
            .unwrap_or(0)
    }

    pub fn get_transaction_id_tag(&self, transaction_id: i64) -> Option<String> {
        self.connectors
            .iter()
            .find(|entry| entry.transaction_started && entry.transaction_id == transaction_id)
            .and_then(|entry| entry.transaction_id_tag.clone())
    }

    /// The connector id currently running `transaction_id`, if any.
    pub fn find_connector_by_transaction_id(&self, transaction_id: i64) -> Option<u32> {
        self.connectors
            .iter()
            .find(|entry| entry.transaction_started && entry.transaction_id == transaction_id)
            .map(|entry| *entry.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(tags: Option<Vec<String>>) -> ChargingStation {
        ChargingStation::from_template(
            "CS001",
            StationInfo {
                charge_point_vendor: "Acme".into(),
                charge_point_model: "Simulator".into(),
                charge_point_serial_number: None,
                firmware_version: None,
                meter_value_sample_interval_ms: 60_000,
                automatic_transaction_generator: Default::default(),
            },
            2,
            tags,
            "ws://localhost:9000/CS001",
        )
    }

    #[test]
    fn expands_template_connectors_plus_station_level() {
        let cs = station(None);
        assert_eq!(cs.connector_ids(), vec![1, 2]);
        assert!(cs.get_connector(0).is_some());
        assert!(cs.get_connector(1).unwrap().available);
    }

    #[test]
    fn connector_transaction_invariant() {
        let cs = station(None);
        assert!(!cs.get_connector(1).unwrap().transaction_started);
        cs.start_connector_transaction(1, 42, Some("TAG1".into()));
        let c = cs.get_connector(1).unwrap();
        assert!(c.transaction_started);
        assert_eq!(c.transaction_id, 42);
        cs.stop_connector_transaction(1);
        assert!(!cs.get_connector(1).unwrap().transaction_started);
        assert_eq!(cs.get_connector(1).unwrap().transaction_id, 0);
    }

    #[test]
    fn has_authorized_tags_false_when_empty_or_absent() {
        assert!(!station(None).has_authorized_tags());
        assert!(!station(Some(vec![])).has_authorized_tags());
        assert!(station(Some(vec!["TAG1".into()])).has_authorized_tags());
    }

    #[test]
    fn start_stop_guarded_idempotent() {
        let cs = station(None);
        cs.stop();
        assert!(!cs.is_charging_station_available());
        cs.start();
        assert!(cs.is_charging_station_available());
        cs.start(); // no-op, logged
        assert!(cs.is_charging_station_available());
    }

    #[test]
    fn energy_register_lookup_by_transaction_id() {
        let cs = station(None);
        cs.start_connector_transaction(2, 7, Some("TAG2".into()));
        cs.add_connector_energy(2, 500);
        assert_eq!(cs.get_energy_active_import_register_by_transaction_id(7, true), 500);
        assert_eq!(cs.get_transaction_id_tag(7), Some("TAG2".to_string()));
        assert_eq!(cs.find_connector_by_transaction_id(7), Some(2));
    }
}
