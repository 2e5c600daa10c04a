//! Transport seam.
//!
//! A `Connector` opens one `Link` per connection attempt. The link is a pair
//! of channels: text frames out, `TransportEvent`s in. The connection manager
//! only ever sees these channels, so the WebSocket implementation and the
//! in-memory loopback are interchangeable.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, warn};

use dg_core::error::{DgError, DgResult};

/// Something that happened on an open link.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A text frame from the peer.
    Message(String),
    /// A non-fatal transport error. A `Closed` usually follows.
    Error(String),
    /// The link is gone. Nothing follows.
    Closed,
}

/// One live transport instance.
pub struct Link {
    /// Text frames to write. Dropping every sender closes the link.
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Opens links to a device URL.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> DgResult<Link>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> DgResult<Link> {
        let (ws_stream, _) = connect_async(url)
            .await
            .map_err(|e| DgError::Transport(format!("failed to connect to {url}: {e}")))?;
        debug!("websocket open: {url}");

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<TransportEvent>();
        let (mut write, mut read) = ws_stream.split();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = out_rx.recv() => match outgoing {
                        Some(text) => {
                            if let Err(e) = write.send(Message::Text(text.into())).await {
                                let _ = in_tx.send(TransportEvent::Error(e.to_string()));
                                break;
                            }
                        }
                        None => {
                            // Owner hung up.
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    },
                    incoming = read.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if in_tx.send(TransportEvent::Message(text.to_string())).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = write.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!("websocket closed by peer: {frame:?}");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("websocket read error: {e}");
                            let _ = in_tx.send(TransportEvent::Error(e.to_string()));
                            break;
                        }
                        None => break,
                    },
                }
            }
            let _ = in_tx.send(TransportEvent::Closed);
        });

        Ok(Link {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_ws_connector_exchanges_text_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = oneshot::channel::<String>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text(r#"{"type":"door_status","data":{"is_unlocked":false}}"#.into()))
                .await
                .unwrap();
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                let _ = seen_tx.send(text.to_string());
            }
            let _ = ws.close(None).await;
        });

        let mut link = WsConnector::new().open(&format!("ws://{addr}")).await.unwrap();

        assert_eq!(
            link.inbound.recv().await,
            Some(TransportEvent::Message(
                r#"{"type":"door_status","data":{"is_unlocked":false}}"#.to_string()
            ))
        );

        link.outbound.send(r#"{"type":"ping"}"#.to_string()).unwrap();
        assert_eq!(seen_rx.await.unwrap(), r#"{"type":"ping"}"#);

        loop {
            match link.inbound.recv().await {
                Some(TransportEvent::Closed) => break,
                Some(_) => continue,
                None => panic!("link dropped without Closed"),
            }
        }
    }

    #[tokio::test]
    async fn test_ws_connector_rejects_bad_url() {
        match WsConnector::new().open("not a url").await {
            Err(DgError::Transport(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("bad url should not connect"),
        }
    }
}
