//! The worker/broadcast channel: a named message channel supporting
//! `postMessage(envelope)` with an `onmessage`/`onmessageerror` pair for
//! subscribers. Both requests and their responses flow over the same bus
//! — the dispatcher's own subscriber is the one that tells them apart, via
//! `envelope::looks_like_response`.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct WorkerChannel {
    sender: broadcast::Sender<Value>,
}

impl WorkerChannel {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// `postMessage(envelope)`.
    pub fn post_message(&self, envelope: Value) {
        if self.sender.send(envelope).is_err() {
            debug!("worker channel message posted with no subscribers");
        }
    }

    pub fn subscribe(&self) -> WorkerChannelSubscriber {
        WorkerChannelSubscriber {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for WorkerChannel {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WorkerChannelSubscriber {
    receiver: broadcast::Receiver<Value>,
}

impl WorkerChannelSubscriber {
    /// `onmessage(event)`; a lagged receiver logs via the `onmessageerror`
    /// analogue and keeps listening rather than terminating the subscriber.
    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => return Some(envelope),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "worker channel subscriber lagged, messages dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

pub type SharedWorkerChannel = Arc<WorkerChannel>;

pub fn create_worker_channel() -> SharedWorkerChannel {
    Arc::new(WorkerChannel::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn posted_message_reaches_a_subscriber() {
        let channel = WorkerChannel::new();
        let mut subscriber = channel.subscribe();

        channel.post_message(json!(["u-1", "Heartbeat", {}]));

        let received = tokio::time::timeout(std::time::Duration::from_millis(100), subscriber.recv())
            .await
            .expect("timed out")
            .expect("no message");
        assert_eq!(received[0], "u-1");
    }

    #[test]
    fn posting_with_no_subscribers_does_not_panic() {
        let channel = WorkerChannel::new();
        channel.post_message(json!(["u-1", "Heartbeat", {}]));
    }
}
