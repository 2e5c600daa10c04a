//! Device settings and maintenance.

use dg_core::constants::timeouts;
use dg_core::error::DgResult;
use dg_socket::Request;

use crate::client::DeviceClient;
use crate::response::{Ack, PerformanceSettings, PerformanceSettingsAck};

impl DeviceClient {
    /// Tune the camera pipeline. Returns the settings the device applied.
    pub async fn update_performance_settings(
        &self,
        settings: &PerformanceSettings,
    ) -> DgResult<PerformanceSettingsAck> {
        let request = Request::new("update_performance_settings")
            .with("settings", serde_json::to_value(settings)?);
        self.call_typed(
            request,
            "performance_settings_response",
            timeouts::PERFORMANCE_SETTINGS_MS,
        )
        .await
    }

    /// Reboot the device. The connection drops shortly after the reply.
    pub async fn reboot(&self) -> DgResult<Ack> {
        self.call_typed(Request::new("reboot_system"), "reboot_response", timeouts::REBOOT_MS)
            .await
    }

    /// Forget every enrolled face.
    pub async fn reset_face_data(&self) -> DgResult<Ack> {
        self.call_typed(
            Request::new("reset_face_data"),
            "reset_face_data_response",
            timeouts::RESET_FACE_DATA_MS,
        )
        .await
    }

    /// Round-trip a `ping`; returns the elapsed time.
    pub async fn ping(&self) -> DgResult<std::time::Duration> {
        let started = tokio::time::Instant::now();
        self.call_raw(Request::new("ping"), "pong", timeouts::PING_MS)
            .await?;
        Ok(started.elapsed())
    }
}
