//! Outbound port: the OCPP Request Service collaborator.
//!
//! The domain and application layers depend only on this trait; the
//! concrete WebSocket transport lives in `infrastructure::ocpp_client` and
//! is attached to a station once its connection is open.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_ocpp::v1_6::messages::authorize::{AuthorizeRequest, AuthorizeResponse};
use rust_ocpp::v1_6::messages::start_transaction::{StartTransactionRequest, StartTransactionResponse};
use rust_ocpp::v1_6::messages::stop_transaction::{StopTransactionRequest, StopTransactionResponse};
use rust_ocpp::v1_6::types::Reason;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::shared::errors::OCPPError;

use super::charging_station::ChargingStation;

/// Parameters recognized by `requestHandler`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestParams {
    /// Whether the caller wants a failed call surfaced as an `Err` at all
    /// (vs. a purely best-effort notification). Every caller in this crate
    /// sets this, since a `Result`-returning `call()` already gives them
    /// that choice for free; kept so the convenience wrappers' call
    /// signatures stay self-describing.
    pub throw_error: bool,
    /// Whether a failed call should be buffered for retry instead of
    /// surfaced immediately. This simulator keeps no offline queue, so the
    /// flag is accepted but has no effect; it exists for `BOOT_NOTIFICATION`'s
    /// call-signature fidelity.
    pub skip_buffering_on_error: bool,
}

impl RequestParams {
    pub fn throw_error() -> Self {
        Self {
            throw_error: true,
            skip_buffering_on_error: false,
        }
    }
}

/// `requestHandler<Req, Resp>(station, command, payload, params)` erased to
/// JSON at the trait-object boundary (generic methods cannot be part of a
/// trait object's vtable), with the typed convenience wrapper below
/// restoring the generic signature for callers.
#[async_trait]
pub trait OcppRequestService: Send + Sync {
    async fn call(
        &self,
        action: &str,
        payload: Value,
        params: RequestParams,
    ) -> Result<Value, OCPPError>;
}

/// Outbound port for the `OPEN_CONNECTION` lifecycle command: opening a
/// WebSocket is an infrastructure concern, so the command handler depends
/// only on this trait and the composition root (`main.rs`) wires in the
/// concrete `infrastructure::ocpp_client` factory.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(
        &self,
        hash_id: &str,
        url: &str,
    ) -> Result<Arc<dyn OcppRequestService>, OCPPError>;
}

/// Typed facade over [`OcppRequestService::call`]: serializes a typed
/// request, dispatches it, and deserializes the typed response.
pub async fn request_handler<Req, Resp>(
    service: &dyn OcppRequestService,
    action: &str,
    payload: &Req,
    params: RequestParams,
) -> Result<Resp, OCPPError>
where
    Req: Serialize + Sync,
    Resp: DeserializeOwned,
{
    let payload = serde_json::to_value(payload)?;
    let response = service.call(action, payload, params).await?;
    Ok(serde_json::from_value(response)?)
}

/// Sends an `Authorize` request for `idTag`. `connector_id` is not part of
/// the OCPP `Authorize` payload itself; it is accepted here only so the
/// call site reads the same shape as `sendStartTransaction`/`sendStopTransaction`.
pub async fn send_authorize(
    service: &dyn OcppRequestService,
    _connector_id: u32,
    id_tag: &str,
) -> Result<AuthorizeResponse, OCPPError> {
    let request = AuthorizeRequest {
        id_tag: id_tag.to_string(),
    };
    request_handler(service, "Authorize", &request, RequestParams::throw_error()).await
}

/// Sends a `StartTransaction` request. `meterStart` is read from the
/// connector's current energy register — this simulator's stand-in for a
/// live meter reading.
pub async fn send_start_transaction(
    service: &dyn OcppRequestService,
    station: &ChargingStation,
    connector_id: u32,
    id_tag: Option<String>,
) -> Result<StartTransactionResponse, OCPPError> {
    let meter_start = station
        .get_connector(connector_id)
        .map(|c| c.energy_active_import_register)
        .unwrap_or(0);
    let request = StartTransactionRequest {
        connector_id: connector_id as i32,
        id_tag: id_tag.unwrap_or_default(),
        meter_start: meter_start as i32,
        timestamp: Utc::now(),
        reservation_id: None,
    };
    request_handler(
        service,
        "StartTransaction",
        &request,
        RequestParams::throw_error(),
    )
    .await
}

/// Sends a `StopTransaction` request.
pub async fn send_stop_transaction(
    service: &dyn OcppRequestService,
    transaction_id: i64,
    meter_stop: u64,
    id_tag: Option<String>,
    reason: Option<Reason>,
) -> Result<StopTransactionResponse, OCPPError> {
    let request = StopTransactionRequest {
        transaction_id: transaction_id as i32,
        id_tag,
        meter_stop: meter_stop as i32,
        timestamp: Utc::now(),
        reason,
        transaction_data: None,
    };
    request_handler(
        service,
        "StopTransaction",
        &request,
        RequestParams::throw_error(),
    )
    .await
}
