//! Command envelope wire shapes.

use serde::Serialize;
use serde_json::Value;

/// A request envelope `[uuid, command, payload]`.
#[derive(Debug, Clone)]
pub struct RequestEnvelope {
    pub uuid: String,
    pub command: String,
    pub payload: Value,
}

impl RequestEnvelope {
    /// Destructures a raw `[uuid, command, payload]` array. Returns `None`
    /// for anything else — malformed envelopes are dropped after logging by
    /// the caller, never panicked on.
    pub fn parse(raw: &Value) -> Option<Self> {
        let arr = raw.as_array()?;
        if arr.len() < 3 {
            return None;
        }
        Some(Self {
            uuid: arr[0].as_str()?.to_string(),
            command: arr[1].as_str()?.to_string(),
            payload: arr[2].clone(),
        })
    }
}

/// A response envelope is the two-element `[uuid, payload]` shape; the
/// dispatcher uses this to recognize and drop messages that loop back to
/// their originator instead of a fresh request.
pub fn looks_like_response(raw: &Value) -> bool {
    matches!(raw.as_array(), Some(arr) if arr.len() == 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Failure,
}

/// `{hashId, status}` on success, plus `{command, requestPayload,
/// commandResponse}` for a semantic failure or `{errorMessage, errorStack,
/// errorDetails}` for a thrown one.
#[derive(Debug, Clone, Serialize)]
pub struct ResponsePayload {
    #[serde(rename = "hashId")]
    pub hash_id: String,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(rename = "requestPayload", skip_serializing_if = "Option::is_none")]
    pub request_payload: Option<Value>,
    #[serde(rename = "commandResponse", skip_serializing_if = "Option::is_none")]
    pub command_response: Option<Value>,
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(rename = "errorStack", skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,
    #[serde(rename = "errorDetails", skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Value>,
}

impl ResponsePayload {
    pub fn success(hash_id: String) -> Self {
        Self {
            hash_id,
            status: ResponseStatus::Success,
            command: None,
            request_payload: None,
            command_response: None,
            error_message: None,
            error_stack: None,
            error_details: None,
        }
    }

    pub fn semantic_failure(
        hash_id: String,
        command: String,
        request_payload: Value,
        command_response: Value,
    ) -> Self {
        Self {
            hash_id,
            status: ResponseStatus::Failure,
            command: Some(command),
            request_payload: Some(request_payload),
            command_response: Some(command_response),
            error_message: None,
            error_stack: None,
            error_details: None,
        }
    }

    pub fn thrown_failure(
        hash_id: String,
        command: String,
        request_payload: Value,
        error_message: String,
        error_stack: String,
        error_details: Value,
    ) -> Self {
        Self {
            hash_id,
            status: ResponseStatus::Failure,
            command: Some(command),
            request_payload: Some(request_payload),
            command_response: None,
            error_message: Some(error_message),
            error_stack: Some(error_stack),
            error_details: Some(error_details),
        }
    }
}

/// Serializes a `(uuid, payload)` response envelope for publication on the
/// worker channel.
pub fn serialize_response(uuid: &str, payload: &ResponsePayload) -> Value {
    serde_json::json!([uuid, payload])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_a_well_formed_request_envelope() {
        let raw = json!(["u-1", "Heartbeat", {}]);
        let envelope = RequestEnvelope::parse(&raw).unwrap();
        assert_eq!(envelope.uuid, "u-1");
        assert_eq!(envelope.command, "Heartbeat");
    }

    #[test]
    fn rejects_malformed_envelopes() {
        assert!(RequestEnvelope::parse(&json!(["u-1", "Heartbeat"])).is_none());
        assert!(RequestEnvelope::parse(&json!("not an array")).is_none());
    }

    #[test]
    fn two_element_arrays_look_like_responses() {
        assert!(looks_like_response(&json!(["u-1", {"hashId": "A", "status": "success"}])));
        assert!(!looks_like_response(&json!(["u-1", "Heartbeat", {}])));
    }

    #[test]
    fn success_status_serializes_lowercase() {
        let payload = ResponsePayload::success("CS001".to_string());
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["status"], "success");
        assert!(value.get("command").is_none());
    }
}
