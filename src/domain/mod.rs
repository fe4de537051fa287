//! Core entities: the station, its connectors, and the ATG parameters that
//! seed the automation engine in `application::atg`.

pub mod charging_station;
pub mod connector;
pub mod ports;
pub mod station_info;

pub use charging_station::ChargingStation;
pub use connector::Connector;
pub use ports::{
    request_handler, send_authorize, send_start_transaction, send_stop_transaction,
    ConnectionFactory, OcppRequestService, RequestParams,
};
pub use station_info::{
    synthetic_energy_wh, AutomaticTransactionGeneratorConfiguration, StationInfo,
    DEFAULT_METER_VALUES_INTERVAL_MS,
};
