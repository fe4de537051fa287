//! Per-station ATG supervisor.
//!
//! Starts and stops one cooperative loop per positive connector id, tracks
//! the global deadline (`stopDate`), and the per-connector cancellation
//! flags the loops observe at the head of every iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::domain::station_info::AutomaticTransactionGeneratorConfiguration;
use crate::domain::ChargingStation;

use super::connector_loop;

/// The ATG's runtime state, minus `connectorsStartStatus` which is kept as
/// its own `DashMap` field for lock-free per-connector access.
struct RuntimeState {
    start_date: Option<Instant>,
    last_run_date: Option<Instant>,
    stop_date: Option<Instant>,
}

pub struct AutomaticTransactionGenerator {
    station: Arc<ChargingStation>,
    params: AutomaticTransactionGeneratorConfiguration,
    started: AtomicBool,
    runtime: RwLock<RuntimeState>,
    connectors_start_status: DashMap<u32, bool>,
}

impl AutomaticTransactionGenerator {
    pub fn new(station: Arc<ChargingStation>) -> Arc<Self> {
        let params = station.station_info().automatic_transaction_generator.clone();
        Arc::new(Self {
            station,
            params,
            started: AtomicBool::new(false),
            runtime: RwLock::new(RuntimeState {
                start_date: None,
                last_run_date: None,
                stop_date: None,
            }),
            connectors_start_status: DashMap::new(),
        })
    }

    pub fn station(&self) -> &Arc<ChargingStation> {
        &self.station
    }

    pub fn params(&self) -> &AutomaticTransactionGeneratorConfiguration {
        &self.params
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stop_date(&self) -> Option<Instant> {
        self.runtime.read().expect("runtime lock poisoned").stop_date
    }

    /// Whether `connector_id`'s loop should keep running. Absent entries
    /// (never started, or already removed) read as `false`.
    pub fn is_connector_running(&self, connector_id: u32) -> bool {
        self.connectors_start_status
            .get(&connector_id)
            .map(|flag| *flag)
            .unwrap_or(false)
    }

    pub fn touch_last_run_date(&self) {
        self.runtime.write().expect("runtime lock poisoned").last_run_date = Some(Instant::now());
    }

    /// `start()`: idempotent-guarded, computes `stopDate` preserving the
    /// net running budget across restarts, then schedules one fresh task
    /// per positive connector id without blocking the caller.
    pub fn start(self: &Arc<Self>, connector_ids: Option<&[u32]>) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!(
                hash_id = self.station.hash_id(),
                "start() called on an already-started automatic transaction generator"
            );
            return;
        }

        let now = Instant::now();
        let stop_after = Duration::from_secs_f64((self.params.stop_after_hours * 3600.0).max(0.0));
        {
            let mut runtime = self.runtime.write().expect("runtime lock poisoned");
            let previously_used = match (runtime.start_date, runtime.last_run_date) {
                (Some(prev_start), Some(prev_last_run)) => {
                    prev_last_run.saturating_duration_since(prev_start)
                }
                _ => Duration::ZERO,
            };
            let remaining = stop_after.saturating_sub(previously_used);
            runtime.start_date = Some(now);
            runtime.last_run_date = Some(now);
            runtime.stop_date = Some(now + remaining);
        }

        let targets: Vec<u32> = match connector_ids {
            Some(ids) => ids.to_vec(),
            None => self.station.connector_ids(),
        };

        for connector_id in targets {
            self.connectors_start_status.insert(connector_id, true);
            let atg = Arc::clone(self);
            tokio::spawn(async move {
                connector_loop::run(atg, connector_id).await;
            });
        }

        info!(
            hash_id = self.station.hash_id(),
            stop_date = ?self.stop_date(),
            "automatic transaction generator started"
        );
    }

    /// `stop()` — flips `started` and every watched connector's flag to
    /// `false` without awaiting loop completion; loops observe the flag at
    /// their next safe point.
    pub fn stop(&self, connector_ids: Option<&[u32]>) {
        if !self.started.swap(false, Ordering::SeqCst) {
            warn!(
                hash_id = self.station.hash_id(),
                "stop() called on an already-stopped automatic transaction generator"
            );
            return;
        }

        match connector_ids {
            Some(ids) => {
                for id in ids {
                    if let Some(mut flag) = self.connectors_start_status.get_mut(id) {
                        *flag = false;
                    }
                }
            }
            None => {
                for mut flag in self.connectors_start_status.iter_mut() {
                    *flag.value_mut() = false;
                }
            }
        }

        info!(
            hash_id = self.station.hash_id(),
            "automatic transaction generator stopped"
        );
    }
}

#[cfg(test)]
impl AutomaticTransactionGenerator {
    /// Test-only seam: primes runtime state for a single connector without
    /// spawning a loop task, so `connector_loop` tests can drive `run`
    /// directly under controlled timing instead of through `start()`.
    pub(crate) fn activate_for_test(&self, connector_id: u32, stop_after: Duration) {
        self.started.store(true, Ordering::SeqCst);
        let now = Instant::now();
        {
            let mut runtime = self.runtime.write().expect("runtime lock poisoned");
            runtime.start_date = Some(now);
            runtime.last_run_date = Some(now);
            runtime.stop_date = Some(now + stop_after);
        }
        self.connectors_start_status.insert(connector_id, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::station_info::AutomaticTransactionGeneratorConfiguration;
    use crate::domain::StationInfo;

    fn station_with_params(params: AutomaticTransactionGeneratorConfiguration) -> Arc<ChargingStation> {
        Arc::new(ChargingStation::from_template(
            "CS001",
            StationInfo {
                charge_point_vendor: "Acme".into(),
                charge_point_model: "Simulator".into(),
                charge_point_serial_number: None,
                firmware_version: None,
                meter_value_sample_interval_ms: 60_000,
                automatic_transaction_generator: params,
            },
            2,
            None,
            "ws://localhost:9000/CS001",
        ))
    }

    #[tokio::test]
    async fn start_is_guarded_against_double_start() {
        let atg = AutomaticTransactionGenerator::new(station_with_params(
            AutomaticTransactionGeneratorConfiguration {
                stop_after_hours: 0.0,
                ..Default::default()
            },
        ));
        atg.start(None);
        assert!(atg.is_started());
        atg.start(None); // no-op, logged
        assert!(atg.is_started());
    }

    #[tokio::test]
    async fn stop_clears_every_connector_flag() {
        let atg = AutomaticTransactionGenerator::new(station_with_params(
            AutomaticTransactionGeneratorConfiguration::default(),
        ));
        atg.start(None);
        assert!(atg.is_connector_running(1));
        assert!(atg.is_connector_running(2));
        atg.stop(None);
        assert!(!atg.is_connector_running(1));
        assert!(!atg.is_connector_running(2));
    }

    #[tokio::test]
    async fn stop_without_start_is_a_guarded_no_op() {
        let atg = AutomaticTransactionGenerator::new(station_with_params(
            AutomaticTransactionGeneratorConfiguration::default(),
        ));
        atg.stop(None);
        assert!(!atg.is_started());
    }

    #[tokio::test]
    async fn restart_preserves_remaining_budget() {
        let atg = AutomaticTransactionGenerator::new(station_with_params(
            AutomaticTransactionGeneratorConfiguration {
                stop_after_hours: 1.0,
                ..Default::default()
            },
        ));
        atg.start(None);
        let first_stop_date = atg.stop_date().unwrap();
        atg.touch_last_run_date();
        atg.stop(None);
        atg.start(None);
        let second_stop_date = atg.stop_date().unwrap();
        // The budget already spent before the first stop is deducted from
        // the new stopDate, so the second window is no longer than the
        // first from "now", but it is well short of a fresh full hour.
        assert!(second_stop_date <= first_stop_date + Duration::from_secs(3600));
    }
}
