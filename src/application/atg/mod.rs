//! Automatic Transaction Generator: per-connector transaction loops
//! supervised by a per-station controller.

pub mod connector_loop;
pub mod controller;
pub mod transaction;

pub use controller::AutomaticTransactionGenerator;
pub use transaction::{StartOutcome, StopOutcome};
