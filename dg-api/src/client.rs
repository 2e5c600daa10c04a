//! Session facade for the door controller.
//!
//! `DeviceClient` owns the connection and the correlator and exposes each
//! device operation as one typed async method (see `endpoints`).

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use dg_core::config::{AppConfig, Environment, TargetAddress};
use dg_core::constants;
use dg_core::error::{DgError, DgResult};
use dg_socket::{
    ConnectionManager, ConnectionState, Connector, Correlator, DeviceEvent, EventBus,
    ReconnectPolicy, Request, WsConnector,
};

/// Client for one door controller.
///
/// Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct DeviceClient {
    correlator: Correlator,
    environment: Environment,
}

impl DeviceClient {
    /// Build a client over an existing connection.
    pub fn new(connection: ConnectionManager, environment: Environment) -> Self {
        Self {
            correlator: Correlator::new(connection),
            environment,
        }
    }

    /// Build a WebSocket client for the address saved in `config`.
    pub fn from_config(config: &AppConfig) -> DgResult<Self> {
        Self::with_connector(Arc::new(WsConnector::new()), config)
    }

    /// Build a client for the address saved in `config` over any transport.
    pub fn with_connector(connector: Arc<dyn Connector>, config: &AppConfig) -> DgResult<Self> {
        let environment = Environment::resolve(config.server.environment);
        let target = config.target()?;
        let connection = ConnectionManager::new(
            connector,
            EventBus::new(constants::EVENT_CHANNEL_CAPACITY),
            target,
            ReconnectPolicy::from(&config.reconnect),
        );
        Ok(Self::new(connection, environment))
    }

    pub fn connection(&self) -> &ConnectionManager {
        self.correlator.connection()
    }

    pub fn bus(&self) -> &EventBus {
        self.connection().bus()
    }

    /// Every bus event as a typed stream (frames, recognitions, lifecycle).
    pub fn events(&self) -> broadcast::Receiver<DeviceEvent> {
        self.bus().events()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection().state()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.connection().state_receiver()
    }

    pub fn target(&self) -> TargetAddress {
        self.connection().target()
    }

    pub fn connect(&self) {
        self.connection().connect();
    }

    pub fn disconnect(&self) {
        self.connection().disconnect();
    }

    pub fn reconnect(&self) {
        self.connection().reconnect();
    }

    /// Parse `address` and use it for the next connect.
    pub fn update_target_address(&self, address: &str) -> DgResult<TargetAddress> {
        let target = TargetAddress::parse(address, self.environment)?;
        self.connection().update_target_address(target.clone());
        Ok(target)
    }

    /// Wait until the connection is open, giving up after `timeout`.
    ///
    /// Fails fast once the retry budget is spent.
    pub async fn wait_until_open(&self, timeout: Duration) -> DgResult<()> {
        let mut rx = self.state_receiver();
        let wait = async {
            loop {
                let state = *rx.borrow_and_update();
                if state == ConnectionState::Open {
                    return Ok(());
                }
                if state == ConnectionState::Closed && !self.connection().has_pending_reconnect() {
                    return Err(DgError::NotConnected);
                }
                if rx.changed().await.is_err() {
                    return Err(DgError::NotConnected);
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| DgError::Timeout {
                request: "connect".into(),
                after_ms: timeout.as_millis() as u64,
            })?
    }

    /// Send a request and return the raw response payload.
    pub(crate) async fn call_raw(
        &self,
        request: Request,
        response_event: &str,
        timeout_ms: u64,
    ) -> DgResult<Value> {
        self.correlator
            .call(request, response_event, Duration::from_millis(timeout_ms))
            .await
    }

    /// Send a request and decode the response payload as `T`.
    pub(crate) async fn call_typed<T: DeserializeOwned>(
        &self,
        request: Request,
        response_event: &str,
        timeout_ms: u64,
    ) -> DgResult<T> {
        let payload = self.call_raw(request, response_event, timeout_ms).await?;
        decode(response_event, payload)
    }

    pub(crate) async fn call_typed_with_progress<T, F>(
        &self,
        request: Request,
        response_event: &str,
        timeout_ms: u64,
        progress_event: &str,
        on_progress: F,
    ) -> DgResult<T>
    where
        T: DeserializeOwned,
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let payload = self
            .correlator
            .call_with_progress(
                request,
                response_event,
                Duration::from_millis(timeout_ms),
                progress_event,
                on_progress,
            )
            .await?;
        decode(response_event, payload)
    }

    pub(crate) fn notify(&self, request: &Request) -> bool {
        self.correlator.notify(request)
    }
}

fn decode<T: DeserializeOwned>(response_event: &str, payload: Value) -> DgResult<T> {
    debug!("decoding {response_event}");
    serde_json::from_value(payload)
        .map_err(|e| DgError::Protocol(format!("unexpected {response_event} payload: {e}")))
}
