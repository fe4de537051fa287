//! Error types shared by the OCPP Request Service and the command dispatcher.

use serde_json::{json, Value};
use thiserror::Error;

/// A thrown failure from the OCPP Request Service.
///
/// Carries enough structure to be reshaped into a worker-channel response
/// envelope's `errorMessage` / `errorStack` / `errorDetails` triple without
/// the dispatcher needing to know which concrete failure occurred.
#[derive(Debug, Error)]
pub enum OCPPError {
    #[error("request timed out waiting for a response")]
    Timeout,

    #[error("charging station '{0}' has no open websocket connection")]
    NotConnected(String),

    #[error("{code}: {description}")]
    CallError { code: String, description: String },

    #[error("failed to (de)serialize OCPP payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("websocket transport error: {0}")]
    Transport(String),
}

impl OCPPError {
    /// `errorMessage` as it should appear in a failure response envelope.
    pub fn error_message(&self) -> String {
        self.to_string()
    }

    /// `errorStack` — this crate has no real stack unwind to report, so it
    /// carries the error's `Debug` rendering, which is the closest analogue.
    pub fn error_stack(&self) -> String {
        format!("{:?}", self)
    }

    /// `errorDetails` — structured extras a caller might want to match on.
    pub fn error_details(&self) -> Value {
        match self {
            Self::CallError { code, description } => json!({
                "code": code,
                "description": description,
            }),
            Self::NotConnected(hash_id) => json!({ "hashId": hash_id }),
            _ => json!({}),
        }
    }
}

/// Dispatcher-level errors that are never surfaced as OCPP failures — they
/// mean the worker channel was asked to do something the handler table
/// cannot do at all. The only such condition is programmer error: an
/// unrecognized command name.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown worker broadcast channel command: '{0}'")]
    UnknownCommand(String),
}
