//! Concrete adapters for the ports declared in `domain`.

pub mod clock;
pub mod ocpp_client;

pub use clock::{Clock, SystemClock};
pub use ocpp_client::{WebSocketConnectionFactory, WebSocketOcppRequestService};
