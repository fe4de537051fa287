//! The command dispatcher: a version-agnostic transport (the worker
//! channel) feeding a facade that resolves the right concrete handling
//! path and always answers the caller.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::application::atg::AutomaticTransactionGenerator;
use crate::domain::{ChargingStation, ConnectionFactory};
use crate::shared::errors::{DispatchError, OCPPError};

use super::channel::SharedWorkerChannel;
use super::classifier::{classify, Verdict};
use super::envelope::{self, RequestEnvelope, ResponsePayload};
use super::handlers::{self, HandlerOutcome};
use super::procedure::Procedure;

/// Scoped finalization: release publishes whatever outcome was set, or a
/// generic thrown failure if the dispatch path exited (e.g. panicked)
/// without setting one. This is how "exactly one response is published
/// per accepted request" holds on every path.
struct ResponseGuard {
    channel: SharedWorkerChannel,
    uuid: String,
    hash_id: String,
    outcome: Option<ResponsePayload>,
}

impl ResponseGuard {
    fn new(channel: SharedWorkerChannel, uuid: String, hash_id: String) -> Self {
        Self {
            channel,
            uuid,
            hash_id,
            outcome: None,
        }
    }

    fn succeed(&mut self) {
        self.outcome = Some(ResponsePayload::success(self.hash_id.clone()));
    }

    fn fail_semantic(&mut self, command: String, request_payload: Value, command_response: Value) {
        self.outcome = Some(ResponsePayload::semantic_failure(
            self.hash_id.clone(),
            command,
            request_payload,
            command_response,
        ));
    }

    fn fail_thrown(
        &mut self,
        command: String,
        request_payload: Value,
        error_message: String,
        error_stack: String,
        error_details: Value,
    ) {
        self.outcome = Some(ResponsePayload::thrown_failure(
            self.hash_id.clone(),
            command,
            request_payload,
            error_message,
            error_stack,
            error_details,
        ));
    }

    fn fail_thrown_ocpp_error(&mut self, command: String, request_payload: Value, error: &OCPPError) {
        self.fail_thrown(
            command,
            request_payload,
            error.error_message(),
            error.error_stack(),
            error.error_details(),
        );
    }
}

impl Drop for ResponseGuard {
    fn drop(&mut self) {
        let payload = self.outcome.take().unwrap_or_else(|| {
            warn!(
                uuid = self.uuid,
                "response guard released without an explicit outcome; publishing a generic thrown failure"
            );
            ResponsePayload::thrown_failure(
                self.hash_id.clone(),
                "Unknown".to_string(),
                Value::Null,
                "handler exited without producing an outcome".to_string(),
                String::new(),
                Value::Null,
            )
        });
        self.channel
            .post_message(envelope::serialize_response(&self.uuid, &payload));
    }
}

/// Strips targeting fields from the payload before a handler sees it;
/// `connectorIds` survives only for the two ATG start/stop procedures and
/// is stripped unconditionally everywhere else.
fn strip_targeting_fields(payload: &mut Value, keep_connector_ids: bool) {
    if let Some(obj) = payload.as_object_mut() {
        obj.remove("hashId");
        obj.remove("hashIds");
        if !keep_connector_ids {
            obj.remove("connectorIds");
        }
    }
}

pub struct CommandDispatcher {
    station: Arc<ChargingStation>,
    atg: Arc<AutomaticTransactionGenerator>,
    connection_factory: Arc<dyn ConnectionFactory>,
    channel: SharedWorkerChannel,
}

impl CommandDispatcher {
    pub fn new(
        station: Arc<ChargingStation>,
        atg: Arc<AutomaticTransactionGenerator>,
        connection_factory: Arc<dyn ConnectionFactory>,
        channel: SharedWorkerChannel,
    ) -> Arc<Self> {
        Arc::new(Self {
            station,
            atg,
            connection_factory,
            channel,
        })
    }

    /// Attaches `onmessage`/`onmessageerror` by subscribing to the worker
    /// channel and spawning one task per received envelope so a slow
    /// handler never blocks the next message's targeting checks.
    pub fn spawn_listener(self: &Arc<Self>) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let mut subscriber = dispatcher.channel.subscribe();
            while let Some(raw) = subscriber.recv().await {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    dispatcher.handle_message(raw).await;
                });
            }
        });
    }

    /// Runs the envelope through its validation rules, in order, followed
    /// by dispatch and outcome translation.
    async fn handle_message(&self, raw: Value) {
        // Rule 1: well-formed.
        if raw.as_array().is_none() {
            warn!("malformed worker channel message, dropping");
            return;
        }

        // Rule 2: response-shaped envelopes loop back to their originator;
        // we never re-handle them.
        if envelope::looks_like_response(&raw) {
            debug!("response-shaped envelope observed on the channel, ignoring");
            return;
        }

        let request = match RequestEnvelope::parse(&raw) {
            Some(request) => request,
            None => {
                warn!("malformed request envelope, dropping");
                return;
            }
        };

        // Rule 3: hashIds targeting.
        if let Some(hash_ids) = request.payload.get("hashIds").and_then(Value::as_array) {
            if !hash_ids.is_empty() {
                let addressed = hash_ids
                    .iter()
                    .any(|id| id.as_str() == Some(self.station.hash_id()));
                if !addressed {
                    debug!(uuid = request.uuid, "envelope not addressed to this station, dropping");
                    return;
                }
            }
        }

        // Rule 4: legacy single-target `hashId` is deprecated.
        if request.payload.get("hashId").is_some() {
            error!(
                uuid = request.uuid,
                "legacy 'hashId' targeting is deprecated, dropping envelope"
            );
            return;
        }

        // From here on the envelope is accepted: exactly one response must
        // be published, which `guard`'s `Drop` impl guarantees.
        let mut guard = ResponseGuard::new(
            Arc::clone(&self.channel),
            request.uuid.clone(),
            self.station.hash_id().to_string(),
        );

        let procedure = match Procedure::from_wire_name(&request.command) {
            Some(procedure) => procedure,
            None => {
                let unknown = DispatchError::UnknownCommand(request.command.clone());
                guard.fail_thrown(
                    request.command.clone(),
                    request.payload.clone(),
                    unknown.to_string(),
                    String::new(),
                    Value::Null,
                );
                return;
            }
        };

        let mut payload = request.payload.clone();
        strip_targeting_fields(&mut payload, procedure.is_atg_start_stop());

        let outcome = handlers::dispatch(
            procedure,
            &self.station,
            &self.atg,
            self.connection_factory.as_ref(),
            payload.clone(),
        )
        .await;

        match outcome {
            Ok(HandlerOutcome::Empty) => guard.succeed(),
            Ok(HandlerOutcome::Response(response)) => match classify(procedure, &response) {
                Verdict::Success => guard.succeed(),
                Verdict::Failure => {
                    guard.fail_semantic(request.command.clone(), payload.clone(), response)
                }
            },
            Err(e) => guard.fail_thrown_ocpp_error(request.command.clone(), payload.clone(), &e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StationInfo;
    use crate::infrastructure::ocpp_client::test_support::FakeOcppRequestService;
    use serde_json::json;
    use std::time::Duration;

    struct NoopConnectionFactory;

    #[async_trait::async_trait]
    impl ConnectionFactory for NoopConnectionFactory {
        async fn connect(
            &self,
            _hash_id: &str,
            _url: &str,
        ) -> Result<Arc<dyn crate::domain::OcppRequestService>, OCPPError> {
            Err(OCPPError::Transport("not implemented in tests".to_string()))
        }
    }

    async fn dispatcher_with_fake_service(
        responses: Vec<Result<Value, OCPPError>>,
    ) -> (Arc<CommandDispatcher>, SharedWorkerChannel) {
        let station = Arc::new(ChargingStation::from_template(
            "CS001",
            StationInfo {
                charge_point_vendor: "Acme".into(),
                charge_point_model: "Simulator".into(),
                charge_point_serial_number: None,
                firmware_version: None,
                meter_value_sample_interval_ms: 60_000,
                automatic_transaction_generator: Default::default(),
            },
            1,
            None,
            "ws://localhost:9000/CS001",
        ));
        station
            .open_ws_connection(FakeOcppRequestService::new(responses))
            .await;
        station.set_registered(true);

        let atg = AutomaticTransactionGenerator::new(Arc::clone(&station));
        let channel = super::super::channel::create_worker_channel();
        let dispatcher = CommandDispatcher::new(
            station,
            atg,
            Arc::new(NoopConnectionFactory),
            Arc::clone(&channel),
        );
        dispatcher.spawn_listener();
        (dispatcher, channel)
    }

    async fn recv_response(channel: &SharedWorkerChannel) -> Value {
        let mut subscriber = channel.subscribe();
        tokio::time::timeout(Duration::from_millis(500), subscriber.recv())
            .await
            .expect("timed out waiting for a response")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn heartbeat_dispatch_success() {
        let (_dispatcher, channel) =
            dispatcher_with_fake_service(vec![Ok(json!({"currentTime": "2024-06-01T00:00:00Z"}))]).await;

        channel.post_message(json!(["u-1", "Heartbeat", {}]));
        let response = recv_response(&channel).await;

        assert_eq!(response[0], "u-1");
        assert_eq!(response[1]["status"], "success");
    }

    #[tokio::test]
    async fn boot_notification_semantic_failure() {
        let (_dispatcher, channel) = dispatcher_with_fake_service(vec![Ok(
            json!({"status": "Rejected", "interval": 60, "currentTime": "2024-06-01T00:00:00Z"}),
        )])
        .await;

        channel.post_message(json!(["u-2", "BootNotification", {}]));
        let response = recv_response(&channel).await;

        assert_eq!(response[1]["status"], "failure");
        assert_eq!(response[1]["command"], "BootNotification");
        assert_eq!(response[1]["commandResponse"]["status"], "Rejected");
    }

    #[tokio::test]
    async fn thrown_failure_surfaces_error_fields() {
        let (_dispatcher, channel) = dispatcher_with_fake_service(vec![Err(OCPPError::CallError {
            code: "NetworkError".to_string(),
            description: "timeout".to_string(),
        })])
        .await;

        channel.post_message(json!(["u-3", "Authorize", {"idTag": "TAG1"}]));
        let response = recv_response(&channel).await;

        assert_eq!(response[1]["status"], "failure");
        assert_eq!(response[1]["errorDetails"]["code"], "NetworkError");
    }

    #[tokio::test]
    async fn unknown_command_is_a_thrown_failure() {
        let (_dispatcher, channel) = dispatcher_with_fake_service(vec![]).await;

        channel.post_message(json!(["u-4", "NotARealCommand", {}]));
        let response = recv_response(&channel).await;

        assert_eq!(response[1]["status"], "failure");
        assert!(response[1]["errorMessage"]
            .as_str()
            .unwrap()
            .contains("NotARealCommand"));
    }

    #[tokio::test]
    async fn mismatched_hash_ids_produce_no_response() {
        let (_dispatcher, channel) = dispatcher_with_fake_service(vec![]).await;
        let mut subscriber = channel.subscribe();

        channel.post_message(json!(["u-5", "Heartbeat", {"hashIds": ["OtherStation"]}]));

        let result = tokio::time::timeout(Duration::from_millis(200), subscriber.recv()).await;
        assert!(result.is_err(), "expected no response to be published");
    }

    #[tokio::test]
    async fn legacy_hash_id_produces_no_response() {
        let (_dispatcher, channel) = dispatcher_with_fake_service(vec![]).await;
        let mut subscriber = channel.subscribe();

        channel.post_message(json!(["u-6", "Heartbeat", {"hashId": "CS001"}]));

        let result = tokio::time::timeout(Duration::from_millis(200), subscriber.recv()).await;
        assert!(result.is_err(), "expected no response to be published");
    }
}
