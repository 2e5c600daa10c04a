//! In-memory transport.
//!
//! `LoopbackConnector` hands out links whose far end is a `LoopbackPeer`.
//! The peer plays the device: it accepts or refuses connection attempts,
//! reads what the client sent, pushes frames, and drops the link.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use dg_core::error::{DgError, DgResult};

use crate::transport::{Connector, Link, TransportEvent};

#[derive(Default)]
struct PeerState {
    refuse: bool,
    attempts: u32,
    last_url: Option<String>,
    link: Option<mpsc::UnboundedSender<TransportEvent>>,
}

struct Shared {
    state: Mutex<PeerState>,
    outbox_tx: mpsc::UnboundedSender<String>,
    outbox_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

/// Client half of the loopback pair.
#[derive(Clone)]
pub struct LoopbackConnector {
    shared: Arc<Shared>,
}

/// Device half of the loopback pair.
#[derive(Clone)]
pub struct LoopbackPeer {
    shared: Arc<Shared>,
}

impl LoopbackConnector {
    /// Create a connected connector/peer pair.
    pub fn pair() -> (LoopbackConnector, LoopbackPeer) {
        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state: Mutex::new(PeerState::default()),
            outbox_tx,
            outbox_rx: tokio::sync::Mutex::new(outbox_rx),
        });
        (
            LoopbackConnector {
                shared: Arc::clone(&shared),
            },
            LoopbackPeer { shared },
        )
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    async fn open(&self, url: &str) -> DgResult<Link> {
        let mut state = self.shared.state.lock();
        state.attempts += 1;
        state.last_url = Some(url.to_string());
        if state.refuse {
            return Err(DgError::Transport(format!("connection refused: {url}")));
        }

        let (in_tx, in_rx) = mpsc::unbounded_channel();
        state.link = Some(in_tx);
        Ok(Link {
            outbound: self.shared.outbox_tx.clone(),
            inbound: in_rx,
        })
    }
}

impl LoopbackPeer {
    /// Refuse (or accept again) subsequent connection attempts.
    pub fn refuse_connections(&self, refuse: bool) {
        self.shared.state.lock().refuse = refuse;
    }

    /// Connection attempts seen so far, refused ones included.
    pub fn attempts(&self) -> u32 {
        self.shared.state.lock().attempts
    }

    /// URL of the most recent attempt.
    pub fn last_url(&self) -> Option<String> {
        self.shared.state.lock().last_url.clone()
    }

    /// Whether a link is open and its client end is still listening.
    pub fn is_connected(&self) -> bool {
        self.shared
            .state
            .lock()
            .link
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    fn deliver(&self, event: TransportEvent) -> bool {
        match self.shared.state.lock().link.as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Push a `{type, data}` frame to the client.
    pub fn push(&self, kind: &str, data: Value) -> bool {
        self.deliver(TransportEvent::Message(
            json!({ "type": kind, "data": data }).to_string(),
        ))
    }

    /// Push raw text, well-formed or not.
    pub fn push_raw(&self, text: &str) -> bool {
        self.deliver(TransportEvent::Message(text.to_string()))
    }

    /// Report a transport error without closing.
    pub fn push_error(&self, message: &str) -> bool {
        self.deliver(TransportEvent::Error(message.to_string()))
    }

    /// Close the current link from the device side.
    pub fn drop_link(&self) -> bool {
        let link = self.shared.state.lock().link.take();
        match link {
            Some(tx) => tx.send(TransportEvent::Closed).is_ok(),
            None => false,
        }
    }

    /// Wait for the next frame the client sent, parsed as JSON.
    pub async fn next_sent(&self) -> Option<Value> {
        let text = self.shared.outbox_rx.lock().await.recv().await?;
        serde_json::from_str(&text).ok()
    }

    /// Frames the client has sent and nobody has read yet.
    pub fn drain_sent(&self) -> Vec<Value> {
        let Ok(mut rx) = self.shared.outbox_rx.try_lock() else {
            return Vec::new();
        };
        let mut frames = Vec::new();
        while let Ok(text) = rx.try_recv() {
            if let Ok(value) = serde_json::from_str(&text) {
                frames.push(value);
            }
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_round_trip() {
        let (connector, peer) = LoopbackConnector::pair();
        let mut link = connector.open("ws://device:8765").await.unwrap();

        assert!(peer.is_connected());
        assert_eq!(peer.last_url().as_deref(), Some("ws://device:8765"));

        link.outbound.send(r#"{"type":"get_users"}"#.into()).unwrap();
        assert_eq!(peer.next_sent().await.unwrap()["type"], "get_users");

        assert!(peer.push("users_list", json!({"users": []})));
        match link.inbound.recv().await {
            Some(TransportEvent::Message(text)) => assert!(text.contains("users_list")),
            other => panic!("unexpected {other:?}"),
        }

        assert!(peer.drop_link());
        assert_eq!(link.inbound.recv().await, Some(TransportEvent::Closed));
        assert!(!peer.is_connected());
    }

    #[tokio::test]
    async fn test_loopback_refusal_counts_attempts() {
        let (connector, peer) = LoopbackConnector::pair();
        peer.refuse_connections(true);

        assert!(connector.open("ws://a").await.is_err());
        assert!(connector.open("ws://a").await.is_err());
        assert_eq!(peer.attempts(), 2);
        assert!(!peer.push("pong", Value::Null));

        peer.refuse_connections(false);
        assert!(connector.open("ws://a").await.is_ok());
        assert_eq!(peer.attempts(), 3);
    }

    #[tokio::test]
    async fn test_drain_sent() {
        let (connector, peer) = LoopbackConnector::pair();
        let link = connector.open("ws://a").await.unwrap();
        link.outbound.send(r#"{"type":"ping"}"#.into()).unwrap();
        link.outbound.send(r#"{"type":"lock_door"}"#.into()).unwrap();

        let sent = peer.drain_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1]["type"], "lock_door");
        assert!(peer.drain_sent().is_empty());
    }
}
