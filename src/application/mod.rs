//! Application layer: the ATG engine and the worker command bus, both built
//! only on `domain::ports` abstractions so they never depend on the concrete
//! WebSocket transport in `infrastructure`.

pub mod atg;
pub mod commands;
pub mod stats;
