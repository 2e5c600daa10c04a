//! Inbound message routing.

use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::frame::InboundFrame;

/// Turns raw inbound text into bus events named after the frame's `type`.
#[derive(Clone)]
pub struct MessageRouter {
    bus: EventBus,
}

impl MessageRouter {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Route one raw message. Returns whether it was published.
    ///
    /// Malformed frames are logged and dropped; they never reach the bus and
    /// never propagate an error to the caller.
    pub fn route(&self, raw: &str) -> bool {
        match InboundFrame::parse(raw) {
            Ok(frame) => {
                debug!("routing {}", frame.kind);
                self.bus.publish(&frame.kind, &frame.data);
                true
            }
            Err(e) => {
                warn!("dropping malformed frame ({} bytes): {e}", raw.len());
                false
            }
        }
    }
}
