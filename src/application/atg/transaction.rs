//! `startTransaction`/`stopTransaction`.

use rust_ocpp::v1_6::messages::authorize::AuthorizeResponse;
use rust_ocpp::v1_6::messages::start_transaction::StartTransactionResponse;
use rust_ocpp::v1_6::messages::stop_transaction::StopTransactionResponse;
use rust_ocpp::v1_6::types::{AuthorizationStatus, Reason};
use tracing::warn;

use crate::domain::ports::{send_authorize, send_start_transaction, send_stop_transaction};
use crate::domain::ChargingStation;
use crate::shared::errors::OCPPError;

use crate::application::stats;

/// Modeled as a tagged variant rather than a union with ambiguous field
/// overlap: `Started` and `AuthorizeRejected` carry different response
/// types but both need `id_tag_status()`.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    Started(StartTransactionResponse),
    AuthorizeRejected(AuthorizeResponse),
}

impl StartOutcome {
    pub fn id_tag_status(&self) -> &AuthorizationStatus {
        match self {
            Self::Started(r) => &r.id_tag_info.status,
            Self::AuthorizeRejected(r) => &r.id_tag_info.status,
        }
    }

    pub fn accepted(&self) -> bool {
        matches!(self.id_tag_status(), AuthorizationStatus::Accepted)
    }
}

/// An explicit "no-op" outcome rather than an absent value for the
/// no-active-transaction case.
#[derive(Debug, Clone)]
pub enum StopOutcome {
    Stopped(StopTransactionResponse),
    NoActiveTransaction,
}

/// Brackets the whole decision tree with a performance measurement keyed
/// `"StartTransaction with ATG"`.
pub async fn start_transaction(
    station: &ChargingStation,
    connector_id: u32,
) -> Result<StartOutcome, OCPPError> {
    let token = stats::begin_measure("StartTransaction with ATG");
    let result = start_transaction_inner(station, connector_id).await;
    stats::end_measure("StartTransaction with ATG", token);
    result
}

async fn start_transaction_inner(
    station: &ChargingStation,
    connector_id: u32,
) -> Result<StartOutcome, OCPPError> {
    let service = station
        .ocpp_request_service()
        .await
        .ok_or_else(|| OCPPError::NotConnected(station.hash_id().to_string()))?;

    if !station.has_authorized_tags() {
        let response = send_start_transaction(service.as_ref(), station, connector_id, None).await?;
        if matches!(response.id_tag_info.status, AuthorizationStatus::Accepted) {
            station.start_connector_transaction(connector_id, response.transaction_id as i64, None);
        }
        return Ok(StartOutcome::Started(response));
    }

    let id_tag = station
        .get_random_id_tag()
        .expect("has_authorized_tags() true implies a non-empty tag list");

    if station.get_automatic_transaction_generator_require_authorize() {
        let auth = send_authorize(service.as_ref(), connector_id, &id_tag).await?;
        if !matches!(auth.id_tag_info.status, AuthorizationStatus::Accepted) {
            return Ok(StartOutcome::AuthorizeRejected(auth));
        }
        let response =
            send_start_transaction(service.as_ref(), station, connector_id, Some(id_tag.clone())).await?;
        if matches!(response.id_tag_info.status, AuthorizationStatus::Accepted) {
            station.start_connector_transaction(
                connector_id,
                response.transaction_id as i64,
                Some(id_tag),
            );
        }
        Ok(StartOutcome::Started(response))
    } else {
        let response =
            send_start_transaction(service.as_ref(), station, connector_id, Some(id_tag.clone())).await?;
        if matches!(response.id_tag_info.status, AuthorizationStatus::Accepted) {
            station.start_connector_transaction(
                connector_id,
                response.transaction_id as i64,
                Some(id_tag),
            );
        }
        Ok(StartOutcome::Started(response))
    }
}

/// Brackets with measurement id `"StopTransaction with ATG"`.
pub async fn stop_transaction(
    station: &ChargingStation,
    connector_id: u32,
    reason: Option<Reason>,
) -> Result<StopOutcome, OCPPError> {
    let token = stats::begin_measure("StopTransaction with ATG");
    let result = stop_transaction_inner(station, connector_id, reason).await;
    stats::end_measure("StopTransaction with ATG", token);
    result
}

async fn stop_transaction_inner(
    station: &ChargingStation,
    connector_id: u32,
    reason: Option<Reason>,
) -> Result<StopOutcome, OCPPError> {
    let connector = match station.get_connector(connector_id) {
        Some(c) if c.transaction_started => c,
        _ => {
            warn!(
                hash_id = station.hash_id(),
                connector_id, "stopTransaction called with no active transaction"
            );
            return Ok(StopOutcome::NoActiveTransaction);
        }
    };

    let service = station
        .ocpp_request_service()
        .await
        .ok_or_else(|| OCPPError::NotConnected(station.hash_id().to_string()))?;

    let meter_stop =
        station.get_energy_active_import_register_by_transaction_id(connector.transaction_id, true);
    let id_tag = station.get_transaction_id_tag(connector.transaction_id);

    let response = send_stop_transaction(
        service.as_ref(),
        connector.transaction_id,
        meter_stop,
        id_tag,
        reason,
    )
    .await?;

    station.stop_connector_transaction(connector_id);

    Ok(StopOutcome::Stopped(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_outcome_accepted_reads_the_tagged_id_tag_status() {
        use rust_ocpp::v1_6::messages::start_transaction::StartTransactionResponse;
        use rust_ocpp::v1_6::types::IdTagInfo;

        let accepted = StartOutcome::Started(StartTransactionResponse {
            transaction_id: 1,
            id_tag_info: IdTagInfo {
                status: AuthorizationStatus::Accepted,
                expiry_date: None,
                parent_id_tag: None,
            },
        });
        assert!(accepted.accepted());

        let rejected = StartOutcome::Started(StartTransactionResponse {
            transaction_id: 0,
            id_tag_info: IdTagInfo {
                status: AuthorizationStatus::Blocked,
                expiry_date: None,
                parent_id_tag: None,
            },
        });
        assert!(!rejected.accepted());
    }
}
