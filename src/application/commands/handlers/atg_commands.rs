//! ATG start/stop handlers, the only two procedures that keep
//! `connectorIds` in their payload.

use std::sync::Arc;

use serde_json::Value;

use crate::application::atg::AutomaticTransactionGenerator;

use super::HandlerOutcome;

fn extract_connector_ids(payload: &Value) -> Option<Vec<u32>> {
    let ids = payload.get("connectorIds")?.as_array()?;
    Some(
        ids.iter()
            .filter_map(|v| v.as_u64().map(|n| n as u32))
            .collect(),
    )
}

pub fn start_automatic_transaction_generator(
    atg: &Arc<AutomaticTransactionGenerator>,
    payload: &Value,
) -> HandlerOutcome {
    let connector_ids = extract_connector_ids(payload);
    atg.start(connector_ids.as_deref());
    HandlerOutcome::Empty
}

pub fn stop_automatic_transaction_generator(
    atg: &Arc<AutomaticTransactionGenerator>,
    payload: &Value,
) -> HandlerOutcome {
    let connector_ids = extract_connector_ids(payload);
    atg.stop(connector_ids.as_deref());
    HandlerOutcome::Empty
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_connector_ids_when_present() {
        let payload = json!({"connectorIds": [1, 2, 3]});
        assert_eq!(extract_connector_ids(&payload), Some(vec![1, 2, 3]));
    }

    #[test]
    fn absent_connector_ids_yields_none_meaning_all_connectors() {
        assert_eq!(extract_connector_ids(&json!({})), None);
    }
}
