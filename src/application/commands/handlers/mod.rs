//! Command handler table.
//!
//! Every handler is a uniform `async fn`, so the table collapses to a
//! single exhaustive `match` over [`Procedure`] rather than a parallel
//! data table of function pointers — mixed sync/async callables are moot
//! once every suspension point is just `.await`.

pub mod atg_commands;
pub mod lifecycle;
pub mod ocpp_forward;

use std::sync::Arc;

use serde_json::Value;

use crate::application::atg::AutomaticTransactionGenerator;
use crate::domain::{ChargingStation, ConnectionFactory};
use crate::shared::errors::OCPPError;

use super::procedure::Procedure;

/// What a handler produced: an OCPP-forwarding handler's raw response, or
/// nothing (the lifecycle/ATG commands, whose envelope is SUCCESS as long
/// as they didn't throw).
pub enum HandlerOutcome {
    Empty,
    Response(Value),
}

pub async fn dispatch(
    procedure: Procedure,
    station: &Arc<ChargingStation>,
    atg: &Arc<AutomaticTransactionGenerator>,
    connection_factory: &dyn ConnectionFactory,
    payload: Value,
) -> Result<HandlerOutcome, OCPPError> {
    use Procedure::*;

    match procedure {
        StartChargingStation => Ok(lifecycle::start_charging_station(station)),
        StopChargingStation => Ok(lifecycle::stop_charging_station(station)),
        DeleteChargingStations => Ok(lifecycle::delete_charging_stations(station, &payload)),
        OpenConnection => lifecycle::open_connection(station, connection_factory, &payload).await,
        CloseConnection => Ok(lifecycle::close_connection(station).await),
        SetSupervisionUrl => Ok(lifecycle::set_supervision_url(station, &payload).await),
        StartAutomaticTransactionGenerator => {
            Ok(atg_commands::start_automatic_transaction_generator(atg, &payload))
        }
        StopAutomaticTransactionGenerator => {
            Ok(atg_commands::stop_automatic_transaction_generator(atg, &payload))
        }
        BootNotification => ocpp_forward::boot_notification(station, payload).await,
        MeterValues => ocpp_forward::meter_values(station, payload).await,
        StopTransaction => ocpp_forward::stop_transaction(station, payload).await,
        StartTransaction | Authorize | StatusNotification | Heartbeat | DataTransfer
        | DiagnosticsStatusNotification | FirmwareStatusNotification => {
            let action = procedure
                .plain_forward_action()
                .expect("every remaining arm is a plain-forward procedure");
            ocpp_forward::forward(station, action, payload).await
        }
    }
}
