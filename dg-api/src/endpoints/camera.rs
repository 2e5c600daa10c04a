//! Webcam capture and enrollment.

use tracing::warn;

use dg_core::constants::timeouts;
use dg_core::error::DgResult;
use dg_socket::{EnrollmentProgress, Request};

use crate::client::DeviceClient;
use crate::response::{CaptureResult, EnrollmentResult};

impl DeviceClient {
    /// Take one photo with the device camera.
    pub async fn capture_photo(&self) -> DgResult<CaptureResult> {
        self.call_typed(
            Request::new("capture_webcam_photo"),
            "webcam_capture_response",
            timeouts::CAPTURE_PHOTO_MS,
        )
        .await
    }

    /// Enroll a user from several photos taken by the device camera.
    ///
    /// `on_progress` runs once per captured sample while the call is
    /// outstanding and never after it returns.
    pub async fn add_user_from_webcam<F>(&self, name: &str, on_progress: F) -> DgResult<EnrollmentResult>
    where
        F: Fn(EnrollmentProgress) + Send + Sync + 'static,
    {
        let request = Request::new("add_user_from_webcam").with("name", name);
        self.call_typed_with_progress(
            request,
            "user_added_from_webcam",
            timeouts::WEBCAM_ENROLL_MS,
            "user_enrollment_progress",
            move |payload| match serde_json::from_value::<EnrollmentProgress>(payload.clone()) {
                Ok(progress) => on_progress(progress),
                Err(e) => warn!("ignoring malformed enrollment progress: {e}"),
            },
        )
        .await
    }
}
