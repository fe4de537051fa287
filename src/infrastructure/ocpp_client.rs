//! WebSocket-backed `OcppRequestService`.
//!
//! Correlates outgoing `Call` frames to their `CallResult`/`CallError` via a
//! `DashMap<String, oneshot::Sender<..>>` keyed by message id: here the
//! simulator is the one placing calls, and the reader task only ever expects
//! `CallResult`/`CallError` frames back (any CS-originated `Call` is logged
//! and ignored — answering CS→CP messages is out of scope for this
//! simulator).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::ports::{ConnectionFactory, OcppRequestService, RequestParams};
use crate::shared::errors::OCPPError;
use crate::shared::ocpp_frame::OcppFrame;

const RESPONSE_TIMEOUT_SECS: u64 = 30;

type WsSink = futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

pub struct WebSocketOcppRequestService {
    hash_id: String,
    write: Mutex<WsSink>,
    pending: Arc<DashMap<String, oneshot::Sender<Result<Value, OCPPError>>>>,
}

impl WebSocketOcppRequestService {
    /// Opens the WebSocket, spawns the reader task, and returns a service
    /// ready to hand to `ChargingStation::open_ws_connection`.
    pub async fn connect(
        hash_id: impl Into<String>,
        url: &str,
    ) -> Result<Arc<Self>, OCPPError> {
        let hash_id = hash_id.into();
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| OCPPError::Transport(e.to_string()))?;
        let (write, read) = stream.split();

        let pending = Arc::new(DashMap::new());
        let service = Arc::new(Self {
            hash_id: hash_id.clone(),
            write: Mutex::new(write),
            pending: Arc::clone(&pending),
        });

        tokio::spawn(run_reader(hash_id, pending, read));

        Ok(service)
    }

    /// OCPP-J `uniqueId`s need only be unique per open connection; a v4 UUID
    /// costs nothing to guarantee that without a shared counter.
    fn generate_message_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[async_trait]
impl OcppRequestService for WebSocketOcppRequestService {
    async fn call(
        &self,
        action: &str,
        payload: Value,
        _params: RequestParams,
    ) -> Result<Value, OCPPError> {
        let message_id = self.generate_message_id();
        let frame = OcppFrame::Call {
            unique_id: message_id.clone(),
            action: action.to_string(),
            payload,
        };
        let json = frame.serialize();

        let (tx, rx) = oneshot::channel();
        self.pending.insert(message_id.clone(), tx);

        info!(
            hash_id = self.hash_id,
            action,
            message_id = message_id.as_str(),
            "sending OCPP call"
        );

        {
            let mut write = self.write.lock().await;
            if let Err(e) = write.send(Message::Text(json)).await {
                self.pending.remove(&message_id);
                return Err(OCPPError::Transport(e.to_string()));
            }
        }

        match timeout(Duration::from_secs(RESPONSE_TIMEOUT_SECS), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.pending.remove(&message_id);
                Err(OCPPError::Transport("response channel closed".to_string()))
            }
            Err(_) => {
                self.pending.remove(&message_id);
                warn!(
                    hash_id = self.hash_id,
                    action,
                    message_id = message_id.as_str(),
                    "OCPP call timed out"
                );
                Err(OCPPError::Timeout)
            }
        }
    }
}

/// The `ConnectionFactory` the composition root wires into the command
/// dispatcher for `OPEN_CONNECTION`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnectionFactory;

#[async_trait]
impl ConnectionFactory for WebSocketConnectionFactory {
    async fn connect(
        &self,
        hash_id: &str,
        url: &str,
    ) -> Result<Arc<dyn OcppRequestService>, OCPPError> {
        let service = WebSocketOcppRequestService::connect(hash_id, url).await?;
        Ok(service as Arc<dyn OcppRequestService>)
    }
}

async fn run_reader(
    hash_id: String,
    pending: Arc<DashMap<String, oneshot::Sender<Result<Value, OCPPError>>>>,
    mut read: futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>,
) {
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Text(text)) => match OcppFrame::parse(&text) {
                Ok(OcppFrame::CallResult { unique_id, payload }) => {
                    if let Some((_, tx)) = pending.remove(&unique_id) {
                        let _ = tx.send(Ok(payload));
                    } else {
                        warn!(hash_id, unique_id, "response for unknown or expired request");
                    }
                }
                Ok(OcppFrame::CallError {
                    unique_id,
                    error_code,
                    error_description,
                    ..
                }) => {
                    if let Some((_, tx)) = pending.remove(&unique_id) {
                        let _ = tx.send(Err(OCPPError::CallError {
                            code: error_code,
                            description: error_description,
                        }));
                    } else {
                        warn!(hash_id, unique_id, "error response for unknown or expired request");
                    }
                }
                Ok(OcppFrame::Call { action, .. }) => {
                    warn!(
                        hash_id,
                        action, "ignoring CS-originated call; this simulator only answers CP-originated calls"
                    );
                }
                Err(e) => {
                    warn!(hash_id, error = %e, "failed to parse incoming OCPP frame");
                }
            },
            Ok(Message::Close(_)) => {
                info!(hash_id, "OCPP websocket closed by peer");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!(hash_id, error = %e, "OCPP websocket read error");
                break;
            }
        }
    }
    info!(hash_id, "OCPP websocket reader task exiting");
}

/// Test double answering from a scripted queue instead of opening a real
/// socket.
#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::Mutex as StdMutex;

    pub struct FakeOcppRequestService {
        responses: StdMutex<std::collections::VecDeque<Result<Value, OCPPError>>>,
        pub calls: StdMutex<Vec<(String, Value)>>,
    }

    impl FakeOcppRequestService {
        pub fn new(responses: Vec<Result<Value, OCPPError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: StdMutex::new(responses.into()),
                calls: StdMutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl OcppRequestService for FakeOcppRequestService {
        async fn call(
            &self,
            action: &str,
            payload: Value,
            _params: RequestParams,
        ) -> Result<Value, OCPPError> {
            self.calls
                .lock()
                .expect("calls lock poisoned")
                .push((action.to_string(), payload));
            self.responses
                .lock()
                .expect("responses lock poisoned")
                .pop_front()
                .unwrap_or_else(|| Ok(Value::Object(Default::default())))
        }
    }

    #[tokio::test]
    async fn fake_service_replays_scripted_responses_in_order() {
        let fake = FakeOcppRequestService::new(vec![
            Ok(serde_json::json!({"currentTime": "2024-01-01T00:00:00Z"})),
            Err(OCPPError::Timeout),
        ]);

        let first = fake.call("Heartbeat", Value::Null, RequestParams::default()).await;
        assert!(first.is_ok());
        let second = fake.call("Heartbeat", Value::Null, RequestParams::default()).await;
        assert!(matches!(second, Err(OCPPError::Timeout)));
        assert_eq!(fake.calls.lock().unwrap().len(), 2);
    }
}
