//! Performance measurement.
//!
//! `begin_measure(id) -> token`, `end_measure(id, token)` bracket an
//! operation and record its duration as a `metrics` histogram/counter pair.

use std::time::Instant;

/// Opaque token returned by [`begin_measure`]; its only job is to carry the
/// start instant through to the matching [`end_measure`] call.
#[derive(Debug, Clone, Copy)]
pub struct MeasureToken {
    started_at: Instant,
}

pub fn begin_measure(_id: &'static str) -> MeasureToken {
    MeasureToken {
        started_at: Instant::now(),
    }
}

pub fn end_measure(id: &'static str, token: MeasureToken) {
    let elapsed = token.started_at.elapsed().as_secs_f64();
    metrics::histogram!("ocpp_sim_operation_duration_seconds", "operation" => id).record(elapsed);
    metrics::counter!("ocpp_sim_operations_total", "operation" => id).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracketing_does_not_panic_without_a_recorder_installed() {
        let token = begin_measure("StartTransaction with ATG");
        end_measure("StartTransaction with ATG", token);
    }
}
