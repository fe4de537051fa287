//! Station lifecycle handlers: start/stop/delete a station, open/close its
//! websocket connection, and update its supervision URL.

use serde_json::Value;

use crate::domain::{ChargingStation, ConnectionFactory};
use crate::shared::errors::OCPPError;

use super::HandlerOutcome;

pub fn start_charging_station(station: &ChargingStation) -> HandlerOutcome {
    station.start();
    HandlerOutcome::Empty
}

pub fn stop_charging_station(station: &ChargingStation) -> HandlerOutcome {
    station.stop();
    HandlerOutcome::Empty
}

pub fn delete_charging_stations(station: &ChargingStation, payload: &Value) -> HandlerOutcome {
    let delete_configuration = payload
        .get("deleteConfiguration")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    station.delete(delete_configuration);
    HandlerOutcome::Empty
}

pub async fn open_connection(
    station: &ChargingStation,
    connection_factory: &dyn ConnectionFactory,
    payload: &Value,
) -> Result<HandlerOutcome, OCPPError> {
    let url = match payload.get("url").and_then(Value::as_str) {
        Some(url) => url.to_string(),
        None => station.supervision_url().await,
    };
    let service = connection_factory.connect(station.hash_id(), &url).await?;
    station.open_ws_connection(service).await;
    Ok(HandlerOutcome::Empty)
}

pub async fn close_connection(station: &ChargingStation) -> HandlerOutcome {
    station.close_ws_connection().await;
    HandlerOutcome::Empty
}

pub async fn set_supervision_url(station: &ChargingStation, payload: &Value) -> HandlerOutcome {
    if let Some(url) = payload.get("url").and_then(Value::as_str) {
        station.set_supervision_url(url.to_string()).await;
    }
    HandlerOutcome::Empty
}
