//! Response classifier: per-command verdict rules translating a
//! typed-then-JSON-erased OCPP response into success/failure.

use serde_json::Value;

use super::procedure::Procedure;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Success,
    Failure,
}

fn status_is(response: &Value, status: &str) -> bool {
    response.get("status").and_then(Value::as_str) == Some(status)
}

fn id_tag_status_is_accepted(response: &Value) -> bool {
    response
        .get("idTagInfo")
        .and_then(|info| info.get("status"))
        .and_then(Value::as_str)
        == Some("Accepted")
}

pub fn classify(procedure: Procedure, response: &Value) -> Verdict {
    use Procedure::*;

    let accepted = match procedure {
        StartTransaction | StopTransaction | Authorize => id_tag_status_is_accepted(response),
        BootNotification => status_is(response, "Accepted"),
        DataTransfer => status_is(response, "Accepted"),
        StatusNotification | MeterValues => {
            response.as_object().map(|o| o.is_empty()).unwrap_or(false)
        }
        Heartbeat => response.get("currentTime").is_some(),
        _ => false,
    };

    if accepted {
        Verdict::Success
    } else {
        Verdict::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn boot_notification_accepted_only_on_accepted_status() {
        assert_eq!(
            classify(Procedure::BootNotification, &json!({"status": "Accepted"})),
            Verdict::Success
        );
        assert_eq!(
            classify(Procedure::BootNotification, &json!({"status": "Rejected"})),
            Verdict::Failure
        );
    }

    #[test]
    fn heartbeat_success_requires_current_time() {
        assert_eq!(
            classify(Procedure::Heartbeat, &json!({"currentTime": "2024-06-01T00:00:00Z"})),
            Verdict::Success
        );
        assert_eq!(classify(Procedure::Heartbeat, &json!({})), Verdict::Failure);
    }

    #[test]
    fn meter_values_success_only_on_empty_object() {
        assert_eq!(classify(Procedure::MeterValues, &json!({})), Verdict::Success);
        assert_eq!(
            classify(Procedure::MeterValues, &json!({"anyField": "v"})),
            Verdict::Failure
        );
    }

    #[test]
    fn authorize_success_requires_accepted_id_tag_status() {
        assert_eq!(
            classify(Procedure::Authorize, &json!({"idTagInfo": {"status": "Accepted"}})),
            Verdict::Success
        );
        assert_eq!(
            classify(Procedure::Authorize, &json!({"idTagInfo": {"status": "Blocked"}})),
            Verdict::Failure
        );
    }

    #[test]
    fn status_notification_success_only_on_empty_object() {
        assert_eq!(
            classify(Procedure::StatusNotification, &json!({})),
            Verdict::Success
        );
        assert_eq!(
            classify(Procedure::StatusNotification, &json!({"unexpected": true})),
            Verdict::Failure
        );
    }
}
