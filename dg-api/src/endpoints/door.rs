//! Door control operations.

use dg_core::constants::timeouts;
use dg_core::error::DgResult;
use dg_socket::Request;

use crate::client::DeviceClient;
use crate::response::{Ack, DoorConfig};

impl DeviceClient {
    /// Unlock the door, optionally overriding how long it stays unlocked (seconds).
    pub async fn unlock(&self, duration: Option<u64>) -> DgResult<bool> {
        let request = Request::new("unlock_door").with_opt("duration", duration);
        let ack: Ack = self
            .call_typed(request, "unlock_response", timeouts::UNLOCK_MS)
            .await?;
        Ok(ack.success)
    }

    /// Lock the door now.
    pub async fn lock(&self) -> DgResult<bool> {
        let ack: Ack = self
            .call_typed(Request::new("lock_door"), "lock_response", timeouts::LOCK_MS)
            .await?;
        Ok(ack.success)
    }

    /// Ask the device to push a `door_status` event.
    ///
    /// There is no direct reply; returns false if the request could not be sent.
    pub fn request_status(&self) -> bool {
        self.notify(&Request::new("get_door_status"))
    }

    /// Change lock behaviour. Fields left unset keep their current value.
    pub async fn update_door_config(&self, config: &DoorConfig) -> DgResult<Ack> {
        let request = Request::new("update_door_config").with("config", serde_json::to_value(config)?);
        self.call_typed(request, "config_response", timeouts::DOOR_CONFIG_MS)
            .await
    }
}
