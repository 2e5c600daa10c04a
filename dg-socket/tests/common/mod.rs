//! Shared test utilities for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::Instant;

use dg_core::config::TargetAddress;
use dg_socket::{
    ConnectionManager, ConnectionState, ConnectionStatusKind, ConnectionStatusPayload, Correlator,
    DeviceEvent, EventBus, LoopbackConnector, LoopbackPeer, ReconnectPolicy,
};

/// Address every loopback test connects to.
pub fn create_test_target() -> TargetAddress {
    TargetAddress::new("192.168.1.40", 8765, false)
}

/// Create an EventBus with a small buffer suitable for tests.
pub fn create_test_bus() -> EventBus {
    EventBus::new(64)
}

/// Create a connection wired to an in-memory device.
pub fn create_test_connection() -> (ConnectionManager, LoopbackPeer) {
    let (connector, peer) = LoopbackConnector::pair();
    let manager = ConnectionManager::new(
        Arc::new(connector),
        create_test_bus(),
        create_test_target(),
        ReconnectPolicy::default(),
    );
    (manager, peer)
}

/// Create a correlator over an open loopback connection.
pub async fn create_open_correlator() -> (Correlator, LoopbackPeer) {
    let (manager, peer) = create_test_connection();
    manager.connect();
    wait_for_state(&manager, ConnectionState::Open).await;
    (Correlator::new(manager), peer)
}

pub async fn wait_for_state(manager: &ConnectionManager, want: ConnectionState) {
    let mut rx = manager.state_receiver();
    rx.wait_for(|s| *s == want)
        .await
        .expect("connection manager dropped");
}

/// Every `connectionStatus` payload published, with the time it was seen.
pub type StatusLog = Arc<Mutex<Vec<(Instant, ConnectionStatusPayload)>>>;

pub fn record_statuses(bus: &EventBus) -> StatusLog {
    let log: StatusLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    bus.subscribe("connectionStatus", move |payload| {
        if let Ok(status) = serde_json::from_value(payload.clone()) {
            sink.lock().push((Instant::now(), status));
        }
    });
    log
}

/// Wait until a status of `kind` arrives on `events`.
pub async fn wait_for_status(
    events: &mut broadcast::Receiver<DeviceEvent>,
    kind: ConnectionStatusKind,
) -> ConnectionStatusPayload {
    loop {
        let event = events.recv().await.expect("event stream closed");
        if let Some(status) = event.as_connection_status() {
            if status.status == kind {
                return status;
            }
        }
    }
}
