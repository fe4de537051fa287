//! A single connector slot on a station.

/// Invariant: `transaction_started == (transaction_id != 0)`.
#[derive(Debug, Clone)]
pub struct Connector {
    pub available: bool,
    pub transaction_started: bool,
    pub transaction_id: i64,
    pub transaction_id_tag: Option<String>,
    pub energy_active_import_register: u64,
}

impl Connector {
    /// A fresh, available, idle connector — the state every connector
    /// other than id 0 starts in when a station is expanded from a
    /// template (`config::StationTemplate`).
    pub fn new() -> Self {
        Self {
            available: true,
            transaction_started: false,
            transaction_id: 0,
            transaction_id_tag: None,
            energy_active_import_register: 0,
        }
    }

    /// Open a transaction on this connector. Panics-free; callers are
    /// expected to have checked `!transaction_started` first (the ATG loop
    /// never re-enters start while a transaction is active).
    pub fn start_transaction(&mut self, transaction_id: i64, id_tag: Option<String>) {
        self.transaction_started = true;
        self.transaction_id = transaction_id;
        self.transaction_id_tag = id_tag;
    }

    pub fn stop_transaction(&mut self) {
        self.transaction_started = false;
        self.transaction_id = 0;
        self.transaction_id_tag = None;
    }
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}
