//! Shared test utilities for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::task::JoinHandle;

use dg_api::DeviceClient;
use dg_core::config::AppConfig;
use dg_socket::{LoopbackConnector, LoopbackPeer};

/// Create a configuration pointing at a LAN device.
pub fn create_test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.server.address = "192.168.1.40".into();
    config
}

/// Create a client over the loopback transport, not yet connected.
pub fn create_test_client() -> (DeviceClient, LoopbackPeer) {
    let (connector, peer) = LoopbackConnector::pair();
    let client = DeviceClient::with_connector(Arc::new(connector), &create_test_config())
        .expect("test config has a valid address");
    (client, peer)
}

/// Create a client and wait for its connection to open.
pub async fn create_connected_client() -> (DeviceClient, LoopbackPeer) {
    let (client, peer) = create_test_client();
    client.connect();
    client
        .wait_until_open(Duration::from_secs(5))
        .await
        .expect("loopback connection should open");
    (client, peer)
}

/// Play the device: answer every request the client sends with the frames
/// `respond` returns for it.
pub fn spawn_device<F>(peer: LoopbackPeer, respond: F) -> JoinHandle<()>
where
    F: Fn(&Value) -> Vec<(&'static str, Value)> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(request) = peer.next_sent().await {
            for (kind, data) in respond(&request) {
                peer.push(kind, data);
            }
        }
    })
}

/// Type tag of a request frame.
pub fn kind(request: &Value) -> &str {
    request["type"].as_str().unwrap_or_default()
}
