//! Handlers that forward to the OCPP Request Service.

use chrono::Utc;
use serde_json::Value;

use crate::domain::ports::RequestParams;
use crate::domain::station_info::{synthetic_energy_wh, DEFAULT_METER_VALUES_INTERVAL_MS};
use crate::domain::ChargingStation;
use crate::shared::errors::OCPPError;

use super::HandlerOutcome;

/// The eight plain forwarding procedures: `throwError = true`, no payload
/// massaging beyond what the caller already sent.
pub async fn forward(
    station: &ChargingStation,
    action: &str,
    payload: Value,
) -> Result<HandlerOutcome, OCPPError> {
    let service = station
        .ocpp_request_service()
        .await
        .ok_or_else(|| OCPPError::NotConnected(station.hash_id().to_string()))?;
    let response = service.call(action, payload, RequestParams::throw_error()).await?;
    Ok(HandlerOutcome::Response(response))
}

/// `BOOT_NOTIFICATION`: merge `station.bootNotificationRequest` as defaults
/// under the caller's payload, then forward with
/// `{skipBufferingOnError: true, throwError: true}`. `station.registered`
/// (spec.md §3: "derived from last BootNotification response") is updated
/// from the response's `status` field before returning, the same check
/// `classifier::classify` performs for the envelope's own verdict.
pub async fn boot_notification(
    station: &ChargingStation,
    payload: Value,
) -> Result<HandlerOutcome, OCPPError> {
    let mut request =
        serde_json::to_value(station.boot_notification_request()).unwrap_or_else(|_| Value::Object(Default::default()));
    if let (Some(defaults), Some(overrides)) = (request.as_object_mut(), payload.as_object()) {
        for (key, value) in overrides {
            defaults.insert(key.clone(), value.clone());
        }
    }

    let service = station
        .ocpp_request_service()
        .await
        .ok_or_else(|| OCPPError::NotConnected(station.hash_id().to_string()))?;
    let params = RequestParams {
        throw_error: true,
        skip_buffering_on_error: true,
    };
    let response = service.call("BootNotification", request, params).await?;
    let accepted = response.get("status").and_then(Value::as_str) == Some("Accepted");
    station.set_registered(accepted);
    Ok(HandlerOutcome::Response(response))
}

/// `METER_VALUES`: build a sample for `payload.connectorId` from the
/// station's active transaction id and current energy register, then
/// forward as a `meterValue` array, letting the caller override it wholesale.
///
/// Per spec.md §4.6 the sample is built "using ... the configured
/// `MeterValueSampleInterval` (falling back to a default)": while a
/// transaction is active on the connector, this tick advances the energy
/// register by the synthetic amount that interval's worth of charging would
/// have accrued since the last sample, the same `synthetic_energy_wh`
/// helper `application::atg::connector_loop` uses while a session runs.
pub async fn meter_values(
    station: &ChargingStation,
    payload: Value,
) -> Result<HandlerOutcome, OCPPError> {
    let connector_id = payload
        .get("connectorId")
        .and_then(Value::as_u64)
        .unwrap_or(0) as u32;

    let transaction_id = station
        .get_connector(connector_id)
        .filter(|c| c.transaction_started)
        .map(|c| c.transaction_id);

    if transaction_id.is_some() {
        let sample_interval_ms = match station.station_info().meter_value_sample_interval_ms {
            0 => DEFAULT_METER_VALUES_INTERVAL_MS,
            configured => configured,
        };
        station.add_connector_energy(connector_id, synthetic_energy_wh(sample_interval_ms));
    }

    let energy = station
        .get_connector(connector_id)
        .map(|c| c.energy_active_import_register)
        .unwrap_or(0);

    let mut sample = serde_json::json!({
        "connectorId": connector_id,
        "meterValue": [{
            "timestamp": Utc::now().to_rfc3339(),
            "sampledValue": [{ "value": energy.to_string() }],
        }],
    });
    if let Some(transaction_id) = transaction_id {
        sample["transactionId"] = serde_json::json!(transaction_id);
    }
    if let (Some(obj), Some(overrides)) = (sample.as_object_mut(), payload.as_object()) {
        for (key, value) in overrides {
            if key != "connectorId" {
                obj.insert(key.clone(), value.clone());
            }
        }
    }

    let service = station
        .ocpp_request_service()
        .await
        .ok_or_else(|| OCPPError::NotConnected(station.hash_id().to_string()))?;
    let response = service
        .call("MeterValues", sample, RequestParams::throw_error())
        .await?;
    Ok(HandlerOutcome::Response(response))
}

/// `STOP_TRANSACTION`: synthesize `meterStop` from the station's energy
/// register for `payload.transactionId` before forwarding.
pub async fn stop_transaction(
    station: &ChargingStation,
    mut payload: Value,
) -> Result<HandlerOutcome, OCPPError> {
    let transaction_id = payload
        .get("transactionId")
        .and_then(Value::as_i64)
        .ok_or_else(|| OCPPError::CallError {
            code: "PropertyConstraintViolation".to_string(),
            description: "StopTransaction payload is missing transactionId".to_string(),
        })?;

    let meter_stop = station.get_energy_active_import_register_by_transaction_id(transaction_id, true);
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("meterStop".to_string(), serde_json::json!(meter_stop));
    }

    forward(station, "StopTransaction", payload).await
}
