//! Cross-cutting utilities: wire framing, graceful shutdown, error types.

pub mod errors;
pub mod ocpp_frame;
pub mod shutdown;

pub use errors::{DispatchError, OCPPError};
