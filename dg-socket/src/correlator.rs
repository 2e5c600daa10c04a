//! Request/response correlation.
//!
//! The device protocol carries no request ids: a reply is recognised only by
//! its event name. `call` sends a request and waits for the next event under
//! the expected response name, racing a timeout and the connection leaving
//! `open`. Concurrent calls that expect the same response name are all
//! resolved by the first matching frame.

use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{oneshot, watch};
use tokio::time::sleep;
use tracing::{debug, warn};

use dg_core::error::{DgError, DgResult};

use crate::bus::{EventBus, Subscription};
use crate::frame::Request;
use crate::manager::{ConnectionManager, ConnectionState};

/// Generic rejection reason when the device reports failure without detail.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Operation failed";

/// Call-and-wait layer over a `ConnectionManager`.
#[derive(Clone)]
pub struct Correlator {
    connection: ConnectionManager,
}

impl Correlator {
    pub fn new(connection: ConnectionManager) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    fn bus(&self) -> &EventBus {
        self.connection.bus()
    }

    /// Send `request` and wait up to `timeout` for `response_event`.
    pub async fn call(
        &self,
        request: Request,
        response_event: &str,
        timeout: Duration,
    ) -> DgResult<Value> {
        self.exchange(request, response_event, timeout, None).await
    }

    /// Like `call`, but forwards every `progress_event` payload to
    /// `on_progress` while the call is outstanding.
    pub async fn call_with_progress<F>(
        &self,
        request: Request,
        response_event: &str,
        timeout: Duration,
        progress_event: &str,
        on_progress: F,
    ) -> DgResult<Value>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let progress = self.bus().subscribe(progress_event, on_progress);
        let progress = Subscription::new(self.bus(), progress_event, progress);
        self.exchange(request, response_event, timeout, Some(progress)).await
    }

    /// Send without waiting for anything. Returns false unless open.
    pub fn notify(&self, request: &Request) -> bool {
        self.connection.send(request)
    }

    async fn exchange(
        &self,
        request: Request,
        response_event: &str,
        timeout: Duration,
        progress: Option<Subscription>,
    ) -> DgResult<Value> {
        // Dropped on every return path below.
        let _progress = progress;

        if self.connection.state() != ConnectionState::Open {
            return Err(DgError::NotConnected);
        }
        let mut state_rx = self.connection.state_receiver();

        let (tx, rx) = oneshot::channel::<Value>();
        let slot = Mutex::new(Some(tx));
        let id = self.bus().subscribe_once(response_event, move |payload| {
            if let Some(tx) = slot.lock().take() {
                let _ = tx.send(payload.clone());
            }
        });
        let _response = Subscription::new(self.bus(), response_event, id);

        if !self.connection.send(&request) {
            return Err(DgError::NotConnected);
        }
        debug!("awaiting {response_event} for {} ({}ms)", request.kind(), timeout.as_millis());

        let payload = tokio::select! {
            biased;
            reply = rx => reply.map_err(|_| {
                DgError::Internal(format!("response handler for {response_event} dropped"))
            })?,
            _ = sleep(timeout) => {
                warn!("{} timed out after {}ms", request.kind(), timeout.as_millis());
                return Err(DgError::Timeout {
                    request: request.kind().to_string(),
                    after_ms: timeout.as_millis() as u64,
                });
            }
            _ = left_open(&mut state_rx) => {
                warn!("{} abandoned: connection lost", request.kind());
                return Err(DgError::ConnectionLost {
                    request: request.kind().to_string(),
                });
            }
        };

        interpret(payload)
    }
}

/// Resolves once the connection is no longer open.
async fn left_open(rx: &mut watch::Receiver<ConnectionState>) {
    loop {
        if *rx.borrow_and_update() != ConnectionState::Open {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Turn a response payload into a result.
///
/// `success: false` becomes `Peer` with the device's `error` string (or
/// `message`, or a generic fallback). Anything else is success, including
/// payloads with no `success` field at all.
pub fn interpret(payload: Value) -> DgResult<Value> {
    if payload.get("success").and_then(Value::as_bool) == Some(false) {
        let reason = payload
            .get("error")
            .and_then(Value::as_str)
            .or_else(|| payload.get("message").and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_FAILURE_MESSAGE);
        return Err(DgError::Peer(reason.to_string()));
    }
    Ok(payload)
}
