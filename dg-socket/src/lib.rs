//! DoorGuard Socket - session plumbing for the device WebSocket.
//!
//! This crate provides everything between the wire and the operation layer:
//! - A name-keyed event bus with one-shot subscriptions and a typed stream
//! - Typed device events and payloads
//! - The inbound message router and outbound request frames
//! - A transport seam with WebSocket and in-memory loopback connectors
//! - The connection state machine with capped exponential-backoff reconnect
//! - Request/response correlation with per-call timeouts

pub mod bus;
pub mod correlator;
pub mod events;
pub mod frame;
pub mod loopback;
pub mod manager;
pub mod router;
pub mod transport;

// Re-export key types
pub use bus::{EventBus, Subscription, SubscriptionId};
pub use correlator::Correlator;
pub use events::{
    ConnectionStatusKind, ConnectionStatusPayload, DeviceEvent, DeviceEventType, DoorStatus,
    EnrollmentProgress, FramePayload, RecognitionPayload,
};
pub use frame::{InboundFrame, Request};
pub use loopback::{LoopbackConnector, LoopbackPeer};
pub use manager::{ConnectionManager, ConnectionState, ReconnectPolicy};
pub use router::MessageRouter;
pub use transport::{Connector, Link, TransportEvent, WsConnector};
