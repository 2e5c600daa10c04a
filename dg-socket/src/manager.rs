//! Connection state machine.
//!
//! Owns the single transport link to the device, drives it from a spawned
//! task, reconnects with capped exponential backoff after drops, and
//! republishes lifecycle changes on the bus as `connectionStatus` and
//! `error` events.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use dg_core::config::{ReconnectSettings, TargetAddress};
use dg_core::constants::{self, lifecycle};

use crate::bus::EventBus;
use crate::events::ConnectionStatusPayload;
use crate::frame::Request;
use crate::router::MessageRouter;
use crate::transport::{Connector, TransportEvent};

/// Lifecycle of the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected.
    Idle,
    Connecting,
    Open,
    /// Dropped, disconnected, or given up. A reconnect may be scheduled.
    Closed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Reconnection schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay after the first failure.
    pub base_delay: Duration,
    /// Cap for any single delay.
    pub max_delay: Duration,
    /// Consecutive failures after which retrying stops.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(constants::RECONNECT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(constants::RECONNECT_MAX_DELAY_MS),
            max_attempts: constants::MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl From<&ReconnectSettings> for ReconnectPolicy {
    fn from(settings: &ReconnectSettings) -> Self {
        Self {
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
            max_attempts: settings.max_attempts,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the next attempt after `failures` consecutive failures.
    ///
    /// `base * 2^(failures-1)`, capped at `max_delay`: 1s, 2s, 4s, 8s, 10s...
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        let factor = 1u32 << exponent;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another attempt is scheduled after `failures` failures.
    pub fn should_retry(&self, failures: u32) -> bool {
        failures < self.max_attempts
    }
}

struct Shared {
    state: ConnectionState,
    /// Bumped by every connect and disconnect; tasks holding an older value are stale.
    generation: u64,
    failures: u32,
    outbound: Option<mpsc::UnboundedSender<String>>,
    driver: Option<JoinHandle<()>>,
    retry_timer: Option<JoinHandle<()>>,
}

struct Inner {
    bus: EventBus,
    router: MessageRouter,
    connector: Arc<dyn Connector>,
    policy: ReconnectPolicy,
    target: Mutex<TargetAddress>,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<ConnectionState>,
}

/// Manages the single connection to the device.
///
/// Cloning yields another handle to the same connection. `connect`,
/// `reconnect` and the retry timer spawn tasks, so they must be called from
/// within a tokio runtime.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        bus: EventBus,
        target: TargetAddress,
        policy: ReconnectPolicy,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            inner: Arc::new(Inner {
                router: MessageRouter::new(bus.clone()),
                bus,
                connector,
                policy,
                target: Mutex::new(target),
                shared: Mutex::new(Shared {
                    state: ConnectionState::Idle,
                    generation: 0,
                    failures: 0,
                    outbound: None,
                    driver: None,
                    retry_timer: None,
                }),
                state_tx,
            }),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.inner.bus
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.inner.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.shared.lock().state
    }

    /// Subscribe to state changes.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Consecutive failed attempts since the last successful open.
    pub fn failures(&self) -> u32 {
        self.inner.shared.lock().failures
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.inner.shared.lock().retry_timer.is_some()
    }

    pub fn target(&self) -> TargetAddress {
        self.inner.target.lock().clone()
    }

    /// Change the address used by the next connect attempt.
    ///
    /// A live connection is left alone; call `reconnect` to move to the new
    /// address immediately.
    pub fn update_target_address(&self, target: TargetAddress) {
        let mut current = self.inner.target.lock();
        info!("device address updated: {} -> {}", *current, target);
        *current = target;
    }

    /// Start connecting unless a link is open or an attempt is in flight.
    pub fn connect(&self) {
        Inner::connect(&self.inner);
    }

    /// Drop whatever is live, reset the failure count and connect now.
    pub fn reconnect(&self) {
        info!("manual reconnect requested");
        self.inner.teardown();
        Inner::connect(&self.inner);
    }

    /// Close the link and stop retrying. Safe to call repeatedly.
    pub fn disconnect(&self) {
        if self.inner.teardown() {
            info!("disconnected from device");
            self.inner.publish_status(ConnectionStatusPayload::disconnected(None, None));
        } else {
            debug!("disconnect: nothing live");
        }
    }

    /// Write a request frame. Returns false unless the connection is open.
    pub fn send(&self, request: &Request) -> bool {
        let shared = self.inner.shared.lock();
        let sender = match (&shared.state, &shared.outbound) {
            (ConnectionState::Open, Some(tx)) => tx,
            _ => {
                warn!("cannot send {}: connection is {}", request.kind(), shared.state);
                return false;
            }
        };
        debug!("sending {}", request.kind());
        if sender.send(request.to_text()).is_err() {
            warn!("cannot send {}: link writer is gone", request.kind());
            return false;
        }
        true
    }
}

impl Inner {
    fn set_state(&self, shared: &mut Shared, new_state: ConnectionState) {
        if shared.state != new_state {
            info!("connection state: {} -> {}", shared.state, new_state);
            shared.state = new_state;
            let _ = self.state_tx.send(new_state);
        }
    }

    fn publish_status(&self, payload: ConnectionStatusPayload) {
        match serde_json::to_value(&payload) {
            Ok(value) => self.bus.publish(lifecycle::CONNECTION_STATUS, &value),
            Err(e) => error!("failed to encode connection status: {e}"),
        }
    }

    fn connect(this: &Arc<Self>) {
        let mut shared = this.shared.lock();
        if matches!(shared.state, ConnectionState::Connecting | ConnectionState::Open) {
            debug!("connect: already {}", shared.state);
            return;
        }

        if let Some(timer) = shared.retry_timer.take() {
            timer.abort();
        }
        shared.generation += 1;
        let generation = shared.generation;
        this.set_state(&mut shared, ConnectionState::Connecting);

        let url = this.target.lock().url();
        info!("connecting to {url} (attempt after {} failure(s))", shared.failures);
        let driver = tokio::spawn(Self::drive(Arc::clone(this), generation, url));
        shared.driver = Some(driver);
    }

    /// Tear down everything live. Returns whether a link or attempt was live.
    fn teardown(&self) -> bool {
        let mut shared = self.shared.lock();
        let was_live = matches!(shared.state, ConnectionState::Connecting | ConnectionState::Open);

        shared.generation += 1;
        if let Some(driver) = shared.driver.take() {
            driver.abort();
        }
        if let Some(timer) = shared.retry_timer.take() {
            timer.abort();
        }
        shared.outbound = None;
        shared.failures = 0;
        if shared.state != ConnectionState::Idle {
            self.set_state(&mut shared, ConnectionState::Closed);
        }
        was_live
    }

    async fn drive(this: Arc<Self>, generation: u64, url: String) {
        let link = match this.connector.open(&url).await {
            Ok(link) => link,
            Err(e) => {
                this.on_error(generation, &e.to_string());
                this.on_closed(generation);
                return;
            }
        };

        let mut inbound = link.inbound;
        if !this.on_open(generation, link.outbound) {
            return;
        }

        while let Some(event) = inbound.recv().await {
            match event {
                TransportEvent::Message(text) => {
                    if !this.is_current(generation) {
                        return;
                    }
                    this.router.route(&text);
                }
                TransportEvent::Error(message) => this.on_error(generation, &message),
                TransportEvent::Closed => break,
            }
        }
        this.on_closed(generation);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.shared.lock().generation == generation
    }

    fn on_open(&self, generation: u64, outbound: mpsc::UnboundedSender<String>) -> bool {
        {
            let mut shared = self.shared.lock();
            if shared.generation != generation {
                debug!("ignoring open from stale attempt {generation}");
                return false;
            }
            shared.failures = 0;
            shared.outbound = Some(outbound);
            if let Some(timer) = shared.retry_timer.take() {
                timer.abort();
            }
            self.set_state(&mut shared, ConnectionState::Open);
        }
        info!("connected to {}", self.target.lock());
        self.publish_status(ConnectionStatusPayload::connected());
        true
    }

    fn on_error(&self, generation: u64, message: &str) {
        if !self.is_current(generation) {
            return;
        }
        warn!("transport error: {message}");
        self.bus.publish(lifecycle::ERROR, &json!({ "message": message }));
    }

    /// Record a close (or failed open) and publish exactly one status.
    ///
    /// Below the attempt limit that status is `disconnected` with the retry
    /// schedule. The close that reaches the limit publishes `failed` in place
    /// of a `disconnected`, never both, so five refused attempts yield four
    /// `disconnected` events and then one `failed`.
    fn on_closed(self: &Arc<Self>, generation: u64) {
        let status = {
            let mut shared = self.shared.lock();
            if shared.generation != generation {
                return;
            }
            shared.outbound = None;
            shared.driver = None;
            self.set_state(&mut shared, ConnectionState::Closed);
            shared.failures += 1;
            let failures = shared.failures;

            if self.policy.should_retry(failures) {
                let delay = self.policy.delay_for(failures);
                warn!(
                    "connection lost ({failures} consecutive failure(s)), retrying in {}ms",
                    delay.as_millis()
                );
                let timer = tokio::spawn(Self::retry_after(Arc::clone(self), generation, delay));
                shared.retry_timer = Some(timer);
                ConnectionStatusPayload::disconnected(Some(failures), Some(delay.as_millis() as u64))
            } else {
                error!("giving up after {failures} consecutive failed attempts");
                ConnectionStatusPayload::failed(format!(
                    "Connection failed after {failures} attempts"
                ))
            }
        };
        self.publish_status(status);
    }

    async fn retry_after(this: Arc<Self>, generation: u64, delay: Duration) {
        sleep(delay).await;
        {
            let mut shared = this.shared.lock();
            if shared.generation != generation || shared.state != ConnectionState::Closed {
                return;
            }
            shared.retry_timer = None;
        }
        Self::connect(&this);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{LoopbackConnector, LoopbackPeer};
    use serde_json::Value;

    fn manager() -> (ConnectionManager, LoopbackPeer) {
        let (connector, peer) = LoopbackConnector::pair();
        let bus = EventBus::new(64);
        let target = TargetAddress::new("10.0.0.5", 8765, false);
        let manager =
            ConnectionManager::new(Arc::new(connector), bus, target, ReconnectPolicy::default());
        (manager, peer)
    }

    async fn wait_for_state(manager: &ConnectionManager, want: ConnectionState) {
        let mut rx = manager.state_receiver();
        rx.wait_for(|s| *s == want).await.unwrap();
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = ReconnectPolicy::default();
        let delays: Vec<u64> = (1..=6).map(|n| policy.delay_for(n).as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10000, 10000]);
        assert_eq!(policy.delay_for(100), Duration::from_millis(10000));
    }

    #[test]
    fn test_retry_budget() {
        let policy = ReconnectPolicy::default();
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
    }

    #[test]
    fn test_policy_from_settings() {
        let settings = ReconnectSettings {
            base_delay_ms: 250,
            max_delay_ms: 2000,
            max_attempts: 3,
        };
        let policy = ReconnectPolicy::from(&settings);
        assert_eq!(policy.delay_for(1), Duration::from_millis(250));
        assert_eq!(policy.delay_for(5), Duration::from_millis(2000));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionState::Closed.to_string(), "closed");
    }

    #[tokio::test]
    async fn test_connect_opens_and_resets_failures() {
        let (manager, peer) = manager();
        assert_eq!(manager.state(), ConnectionState::Idle);

        manager.connect();
        wait_for_state(&manager, ConnectionState::Open).await;

        assert_eq!(manager.failures(), 0);
        assert!(peer.is_connected());
        assert_eq!(peer.last_url().as_deref(), Some("ws://10.0.0.5:8765"));
    }

    #[tokio::test]
    async fn test_connect_is_noop_while_connecting_or_open() {
        let (manager, peer) = manager();
        manager.connect();
        manager.connect();
        wait_for_state(&manager, ConnectionState::Open).await;
        manager.connect();

        tokio::task::yield_now().await;
        assert_eq!(peer.attempts(), 1);
    }

    #[tokio::test]
    async fn test_send_requires_open() {
        let (manager, peer) = manager();
        assert!(!manager.send(&Request::new("lock_door")));

        manager.connect();
        wait_for_state(&manager, ConnectionState::Open).await;
        assert!(manager.send(&Request::new("unlock_door").with("duration", 10)));

        let frame = peer.next_sent().await.unwrap();
        assert_eq!(frame, serde_json::json!({"type": "unlock_door", "duration": 10}));
    }

    #[tokio::test]
    async fn test_inbound_frames_reach_bus() {
        let (manager, peer) = manager();
        let seen = Arc::new(Mutex::new(Vec::<Value>::new()));
        let s = Arc::clone(&seen);
        manager.bus().subscribe("door_status", move |v| s.lock().push(v.clone()));

        manager.connect();
        wait_for_state(&manager, ConnectionState::Open).await;

        let mut events = manager.bus().events();
        peer.push("door_status", serde_json::json!({"is_unlocked": true}));
        events.recv().await.unwrap();

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0]["is_unlocked"], true);
    }

    #[tokio::test]
    async fn test_transport_error_is_published_without_state_change() {
        let (manager, peer) = manager();
        manager.connect();
        wait_for_state(&manager, ConnectionState::Open).await;

        let mut events = manager.bus().events();
        peer.push_error("broken pipe");
        let event = events.recv().await.unwrap();

        assert_eq!(event.as_error().unwrap().message, "broken pipe");
        assert_eq!(manager.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_schedules_reconnect() {
        let (manager, peer) = manager();
        manager.connect();
        wait_for_state(&manager, ConnectionState::Open).await;

        let mut events = manager.bus().events();
        peer.drop_link();
        let status = events.recv().await.unwrap().as_connection_status().unwrap();

        assert_eq!(status.attempt, Some(1));
        assert_eq!(status.retry_in_ms, Some(1000));
        assert!(manager.has_pending_reconnect());

        wait_for_state(&manager, ConnectionState::Open).await;
        assert_eq!(peer.attempts(), 2);
        assert_eq!(manager.failures(), 0);
        assert!(!manager.has_pending_reconnect());
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_cancels_retry() {
        let (manager, peer) = manager();
        peer.refuse_connections(true);
        manager.connect();
        wait_for_state(&manager, ConnectionState::Closed).await;
        assert!(manager.has_pending_reconnect());

        manager.disconnect();
        assert!(!manager.has_pending_reconnect());
        assert_eq!(manager.failures(), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(peer.attempts(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_closes_link() {
        let (manager, peer) = manager();
        manager.connect();
        wait_for_state(&manager, ConnectionState::Open).await;

        manager.disconnect();
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(!manager.send(&Request::new("ping")));

        for _ in 0..10 {
            if !peer.is_connected() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!peer.is_connected());
    }

    #[tokio::test]
    async fn test_update_target_applies_to_next_connect() {
        let (manager, peer) = manager();
        manager.update_target_address(TargetAddress::new("door.local", 9000, true));
        manager.connect();
        wait_for_state(&manager, ConnectionState::Open).await;
        assert_eq!(peer.last_url().as_deref(), Some("wss://door.local:9000"));
    }

    #[tokio::test]
    async fn test_reconnect_resets_failures() {
        let (manager, peer) = manager();
        peer.refuse_connections(true);
        manager.connect();
        wait_for_state(&manager, ConnectionState::Closed).await;
        assert_eq!(manager.failures(), 1);

        peer.refuse_connections(false);
        manager.reconnect();
        wait_for_state(&manager, ConnectionState::Open).await;
        assert_eq!(manager.failures(), 0);
        assert_eq!(peer.attempts(), 2);
    }
}
