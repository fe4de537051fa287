//! The per-connector cooperative loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::domain::synthetic_energy_wh;
use crate::infrastructure::clock::{uniform_probability, uniform_seconds};

use super::controller::AutomaticTransactionGenerator;
use super::transaction;

/// Poll interval while waiting for the websocket connection to open.
const INIT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// Cooldown after a rejected authorize/start before the next attempt.
const WAIT_AFTER_REJECT: Duration = Duration::from_secs(5);

/// Runs until `stopDate` passes, the station or connector becomes
/// unavailable, the station is deregistered, or the controller flips this
/// connector's cancellation flag. Exits via a single `return`/`break` site
/// so the terminal `StopTransaction` at the bottom always runs.
pub async fn run(atg: Arc<AutomaticTransactionGenerator>, connector_id: u32) {
    let station = Arc::clone(atg.station());
    let mut recent_skip_count: u64 = 0;
    let mut total_skip_count: u64 = 0;

    loop {
        if !atg.is_connector_running(connector_id) {
            info!(
                hash_id = station.hash_id(),
                connector_id, "connector loop cancelled"
            );
            break;
        }

        // Step 1.
        if let Some(stop_date) = atg.stop_date() {
            if Instant::now() > stop_date {
                atg.stop(None);
                break;
            }
        }

        // Step 2.
        if !station.is_registered() {
            error!(
                hash_id = station.hash_id(),
                connector_id, "station not registered, connector loop exiting"
            );
            break;
        }

        // Step 3.
        if !station.is_charging_station_available() {
            atg.stop(None);
            break;
        }

        // Step 4.
        if !station.is_connector_available(connector_id) {
            info!(
                hash_id = station.hash_id(),
                connector_id, "connector not available, connector loop exiting"
            );
            break;
        }

        // Step 5 — the only busy-wait this loop performs.
        while station.ocpp_request_service().await.is_none() {
            if !atg.is_connector_running(connector_id) {
                return;
            }
            sleep(INIT_POLL_INTERVAL).await;
        }

        // Step 6.
        let delay = uniform_seconds(
            atg.params().min_delay_between_two_transactions,
            atg.params().max_delay_between_two_transactions,
        );
        sleep(Duration::from_secs_f64(delay.max(0.0))).await;

        if !atg.is_connector_running(connector_id) {
            break;
        }

        // Step 7.
        if uniform_probability() < atg.params().probability_of_start {
            match transaction::start_transaction(&station, connector_id).await {
                Ok(outcome) if outcome.accepted() => {
                    let duration =
                        uniform_seconds(atg.params().min_duration, atg.params().max_duration);
                    run_charging_session(&station, connector_id, duration.max(0.0)).await;
                    if let Err(e) = transaction::stop_transaction(&station, connector_id, None).await
                    {
                        warn!(
                            hash_id = station.hash_id(),
                            connector_id,
                            error = %e,
                            "stopTransaction failed after a completed charging session"
                        );
                    }
                }
                Ok(_rejected) => {
                    sleep(WAIT_AFTER_REJECT).await;
                }
                Err(e) => {
                    warn!(
                        hash_id = station.hash_id(),
                        connector_id,
                        error = %e,
                        "startTransaction failed, attempting a terminal stop before exiting"
                    );
                    let _ = transaction::stop_transaction(&station, connector_id, None).await;
                    break;
                }
            }
        } else {
            recent_skip_count += 1;
            total_skip_count += 1;
            info!(
                hash_id = station.hash_id(),
                connector_id, recent_skip_count, total_skip_count, "skipped transaction start this cycle"
            );
        }

        // Step 8.
        atg.touch_last_run_date();
    }

    // Issue a final StopTransaction for this connector if it has an active
    // transaction before the task exits.
    if let Some(connector) = station.get_connector(connector_id) {
        if connector.transaction_started {
            if let Err(e) = transaction::stop_transaction(&station, connector_id, None).await {
                warn!(
                    hash_id = station.hash_id(),
                    connector_id,
                    error = %e,
                    "terminal stopTransaction on loop exit failed"
                );
            }
        }
    }
}

/// Sleeps out `duration_secs` of a charging session in
/// `MeterValueSampleInterval`-sized chunks, bumping the connector's
/// synthetic energy register each tick — this simulator's stand-in for the
/// meter readings a real charge point would accumulate during a transaction.
async fn run_charging_session(station: &crate::domain::ChargingStation, connector_id: u32, duration_secs: f64) {
    let tick_ms = station.station_info().meter_value_sample_interval_ms.max(1);
    let mut remaining_ms = (duration_secs * 1000.0) as u64;

    if remaining_ms == 0 {
        return;
    }

    while remaining_ms > 0 {
        let this_tick = remaining_ms.min(tick_ms);
        sleep(Duration::from_millis(this_tick)).await;
        station.add_connector_energy(connector_id, synthetic_energy_wh(this_tick));
        remaining_ms -= this_tick;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::station_info::AutomaticTransactionGeneratorConfiguration;
    use crate::domain::{ChargingStation, StationInfo};
    use crate::infrastructure::ocpp_client::test_support::FakeOcppRequestService;
    use serde_json::json;

    fn station_with(
        params: AutomaticTransactionGeneratorConfiguration,
        tags: Option<Vec<String>>,
    ) -> Arc<ChargingStation> {
        Arc::new(ChargingStation::from_template(
            "CS001",
            StationInfo {
                charge_point_vendor: "Acme".into(),
                charge_point_model: "Simulator".into(),
                charge_point_serial_number: None,
                firmware_version: None,
                meter_value_sample_interval_ms: 1_000,
                automatic_transaction_generator: params,
            },
            1,
            tags,
            "ws://localhost:9000/CS001",
        ))
    }

    fn zero_timing_params(probability_of_start: f64, require_authorize: bool) -> AutomaticTransactionGeneratorConfiguration {
        AutomaticTransactionGeneratorConfiguration {
            stop_after_hours: 1.0,
            min_delay_between_two_transactions: 0.0,
            max_delay_between_two_transactions: 0.0,
            min_duration: 0.0,
            max_duration: 0.0,
            probability_of_start,
            require_authorize,
        }
    }

    /// spec.md §8 scenario 1 ("Happy path"): probabilityOfStart=1 and an
    /// accepted StartTransaction must be followed by a StopTransaction.
    #[tokio::test]
    async fn happy_path_issues_start_then_stop_transaction() {
        let station = station_with(zero_timing_params(1.0, false), None);
        let fake = FakeOcppRequestService::new(vec![
            Ok(json!({"transactionId": 1, "idTagInfo": {"status": "Accepted"}})),
            Ok(json!({"idTagInfo": {"status": "Accepted"}})),
        ]);
        station.open_ws_connection(Arc::clone(&fake)).await;
        station.set_registered(true);

        let atg = AutomaticTransactionGenerator::new(Arc::clone(&station));
        atg.activate_for_test(1, Duration::from_secs(30));

        run(Arc::clone(&atg), 1).await;

        let calls = fake.calls.lock().expect("calls lock poisoned");
        assert!(
            calls.iter().any(|(action, _)| action == "StartTransaction"),
            "expected a StartTransaction call, got {calls:?}"
        );
        assert!(
            calls.iter().any(|(action, _)| action == "StopTransaction"),
            "expected a StopTransaction call, got {calls:?}"
        );
    }

    /// spec.md §8 scenario 2 ("Rejected start"): a blocked Authorize must
    /// never be followed by a StartTransaction call.
    #[tokio::test(start_paused = true)]
    async fn rejected_authorize_never_issues_start_transaction() {
        let station = station_with(zero_timing_params(1.0, true), Some(vec!["TAG1".into()]));
        let fake = FakeOcppRequestService::new(vec![Ok(json!({"idTagInfo": {"status": "Blocked"}}))]);
        station.open_ws_connection(Arc::clone(&fake)).await;
        station.set_registered(true);

        let atg = AutomaticTransactionGenerator::new(Arc::clone(&station));
        atg.activate_for_test(1, Duration::from_millis(50));

        run(Arc::clone(&atg), 1).await;

        let calls = fake.calls.lock().expect("calls lock poisoned");
        assert!(
            calls.iter().any(|(action, _)| action == "Authorize"),
            "expected an Authorize call, got {calls:?}"
        );
        assert!(
            !calls.iter().any(|(action, _)| action == "StartTransaction"),
            "a rejected Authorize must never be followed by StartTransaction, got {calls:?}"
        );
    }

    /// `probabilityOfStart = 0`: no transaction is ever started; the loop
    /// exits via `stopDate` with only skip counters advancing.
    #[tokio::test]
    async fn zero_probability_never_starts_a_transaction() {
        let station = station_with(zero_timing_params(0.0, false), None);
        let fake = FakeOcppRequestService::new(vec![]);
        station.open_ws_connection(Arc::clone(&fake)).await;
        station.set_registered(true);

        let atg = AutomaticTransactionGenerator::new(Arc::clone(&station));
        atg.activate_for_test(1, Duration::from_millis(20));

        run(Arc::clone(&atg), 1).await;

        assert!(fake.calls.lock().expect("calls lock poisoned").is_empty());
    }

    /// An unregistered station must never attempt a transaction (spec.md
    /// §4.2 step 2) — this is the exact bug class a missing
    /// `set_registered(true)` call produces.
    #[tokio::test]
    async fn unregistered_station_exits_without_any_calls() {
        let station = station_with(zero_timing_params(1.0, false), None);
        let fake = FakeOcppRequestService::new(vec![]);
        station.open_ws_connection(Arc::clone(&fake)).await;
        // station.set_registered(true) deliberately omitted.

        let atg = AutomaticTransactionGenerator::new(Arc::clone(&station));
        atg.activate_for_test(1, Duration::from_secs(30));

        run(Arc::clone(&atg), 1).await;

        assert!(fake.calls.lock().expect("calls lock poisoned").is_empty());
    }

    /// The accepted-start branch ticks the connector's synthetic energy
    /// register in `MeterValueSampleInterval`-sized chunks over the
    /// session duration.
    #[tokio::test]
    async fn charging_session_ticks_the_energy_register() {
        let mut params = zero_timing_params(1.0, false);
        params.min_duration = 2.5;
        params.max_duration = 2.5;
        let station = station_with(params, None);
        station.set_connector_available(1, true);

        run_charging_session(&station, 1, 2.5).await;

        let connector = station.get_connector(1).expect("connector 1 exists");
        assert!(
            connector.energy_active_import_register > 0,
            "expected the energy register to have ticked forward"
        );
    }
}
