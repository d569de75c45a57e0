//! Transport boundary between the controller and its message broker.
//!
//! The pipeline never talks to a broker client directly.  It pulls
//! [`InboundMessage`]s from a [`Transport`] and hands it
//! [`OutboundPublish`]es; connecting, subscribing and reconnecting are the
//! implementation's business.
//!
//! [`LoopbackTransport`] is an in-process implementation: requests are
//! injected through a [`LoopbackClient`] and every publish is broadcast back
//! to the client's subscribers.

use async_trait::async_trait;
use tib_types::{QoS, Response, TibError};
use tokio::sync::{Mutex, broadcast, mpsc};
use tracing::debug;

/// Default number of buffered messages in each loopback direction.
const DEFAULT_CAPACITY: usize = 64;

/// A message delivered by the broker on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Response-topic property, if the publisher set one.
    pub response_topic: Option<String>,
    /// Correlation-data property, if the publisher set one.
    pub correlation: Option<Vec<u8>>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            response_topic: None,
            correlation: None,
        }
    }

    pub fn with_response_topic(mut self, topic: impl Into<String>) -> Self {
        self.response_topic = Some(topic.into());
        self
    }

    pub fn with_correlation(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.correlation = Some(data.into());
        self
    }
}

/// A message handed to the broker for publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPublish {
    pub topic: String,
    pub payload: String,
    pub qos: QoS,
    pub correlation: Option<Vec<u8>>,
}

impl From<Response> for OutboundPublish {
    fn from(r: Response) -> Self {
        Self {
            topic: r.topic().to_string(),
            payload: r.payload().to_string(),
            qos: r.qos(),
            correlation: r.correlation().map(|c| c.as_bytes().to_vec()),
        }
    }
}

/// A publish/subscribe connection as seen by the pipeline.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait for the next inbound message.  `None` means the transport has
    /// shut down and no more messages will arrive.
    async fn recv(&self) -> Option<InboundMessage>;

    /// Publish one message.  Delivery is at most once: callers log failures
    /// and move on.
    ///
    /// # Errors
    ///
    /// [`TibError::Transport`] when the message could not be handed over.
    async fn publish(&self, msg: OutboundPublish) -> Result<(), TibError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Loopback
// ────────────────────────────────────────────────────────────────────────────

/// In-process transport driven by a [`LoopbackClient`].
pub struct LoopbackTransport {
    requests: Mutex<mpsc::Receiver<InboundMessage>>,
    published: broadcast::Sender<OutboundPublish>,
}

/// The "broker side" of a [`LoopbackTransport`].  Clone it freely.
#[derive(Clone)]
pub struct LoopbackClient {
    requests: mpsc::Sender<InboundMessage>,
    published: broadcast::Sender<OutboundPublish>,
}

impl LoopbackTransport {
    /// Create a connected transport/client pair buffering `capacity`
    /// messages in each direction.
    pub fn new(capacity: usize) -> (Self, LoopbackClient) {
        let (req_tx, req_rx) = mpsc::channel(capacity);
        let (pub_tx, _) = broadcast::channel(capacity);
        let transport = Self {
            requests: Mutex::new(req_rx),
            published: pub_tx.clone(),
        };
        let client = LoopbackClient {
            requests: req_tx,
            published: pub_tx,
        };
        (transport, client)
    }

    pub fn with_default_capacity() -> (Self, LoopbackClient) {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn recv(&self) -> Option<InboundMessage> {
        self.requests.lock().await.recv().await
    }

    async fn publish(&self, msg: OutboundPublish) -> Result<(), TibError> {
        match self.published.send(msg) {
            Ok(n) => debug!(receivers = n, "loopback publish"),
            // No subscriber is listening; the message is simply not observed.
            Err(broadcast::error::SendError(msg)) => {
                debug!(topic = %msg.topic, "loopback publish with no subscribers")
            }
        }
        Ok(())
    }
}

impl LoopbackClient {
    /// Deliver `msg` to the transport as if it came from the broker.
    ///
    /// # Errors
    ///
    /// [`TibError::Transport`] once the transport has been dropped.
    pub async fn send(&self, msg: InboundMessage) -> Result<(), TibError> {
        self.requests
            .send(msg)
            .await
            .map_err(|e| TibError::Transport(format!("loopback closed: {e}")))
    }

    /// Observe every message the transport publishes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<OutboundPublish> {
        self.published.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tib_types::{CorrelationToken, ReplyTo, ResponseKind};

    #[tokio::test]
    async fn injected_request_is_received() {
        let (transport, client) = LoopbackTransport::new(4);
        client
            .send(
                InboundMessage::new("cmd/hsfib-tib/req/status", br#"{"msg_type":"get"}"#.to_vec())
                    .with_response_topic("resp/x")
                    .with_correlation(b"42".to_vec()),
            )
            .await
            .unwrap();

        let msg = transport.recv().await.unwrap();
        assert_eq!(msg.topic, "cmd/hsfib-tib/req/status");
        assert_eq!(msg.response_topic.as_deref(), Some("resp/x"));
        assert_eq!(msg.correlation.as_deref(), Some(&b"42"[..]));
    }

    #[tokio::test]
    async fn recv_ends_when_clients_are_gone() {
        let (transport, client) = LoopbackTransport::new(4);
        drop(client);
        assert!(transport.recv().await.is_none());
    }

    #[tokio::test]
    async fn publishes_reach_subscribers() {
        let (transport, client) = LoopbackTransport::new(4);
        let mut rx = client.subscribe();

        let reply_to = ReplyTo::new().with_correlation(CorrelationToken::new(b"c1").unwrap());
        let response = Response::reply(&reply_to, ResponseKind::Ok, r#"{"status":"OK"}"#);
        transport.publish(response.into()).await.unwrap();

        let out = rx.recv().await.unwrap();
        assert_eq!(out.topic, "cmd/hsfib-tib/resp");
        assert_eq!(out.qos, QoS::AtLeastOnce);
        assert_eq!(out.correlation.as_deref(), Some(&b"c1"[..]));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let (transport, _client) = LoopbackTransport::new(4);
        let out = OutboundPublish {
            topic: "t".into(),
            payload: "{}".into(),
            qos: QoS::AtMostOnce,
            correlation: None,
        };
        assert!(transport.publish(out).await.is_ok());
    }
}
