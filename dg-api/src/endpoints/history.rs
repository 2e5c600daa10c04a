//! Access history.

use dg_core::constants::timeouts;
use dg_core::error::DgResult;
use dg_socket::Request;

use crate::client::DeviceClient;
use crate::response::AccessHistory;

impl DeviceClient {
    /// Recognitions the device has logged, oldest first.
    pub async fn access_history(&self) -> DgResult<AccessHistory> {
        self.call_typed(
            Request::new("get_access_history"),
            "access_history",
            timeouts::ACCESS_HISTORY_MS,
        )
        .await
    }
}
