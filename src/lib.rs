//! # OCPP Station Simulator
//!
//! Simulates one or more OCPP 1.6J charging stations: each opens a WebSocket
//! to a central system, runs an Automatic Transaction Generator, and answers
//! operator commands delivered over an in-process worker channel.
//!
//! ## Architecture (Clean / SOLID)
//!
//! - **shared**: Cross-cutting utilities (errors, shutdown, the OCPP-J wire codec)
//! - **domain**: Core business entities, ports, and value objects
//! - **application**: Use-case orchestration — the ATG engine and the command bus
//! - **infrastructure**: External concerns (the WebSocket transport, the system clock)
//! - **config**: Simulator configuration (TOML-based)

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::commands::{create_worker_channel, CommandDispatcher, SharedWorkerChannel};
pub use config::{default_config_path, SimulatorConfig};
pub use domain::ChargingStation;
pub use infrastructure::{WebSocketConnectionFactory, WebSocketOcppRequestService};
