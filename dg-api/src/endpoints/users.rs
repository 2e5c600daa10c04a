//! User management operations.

use dg_core::constants::timeouts;
use dg_core::error::DgResult;
use dg_socket::Request;

use crate::client::DeviceClient;
use crate::response::{encode_jpeg, Ack, UsersList};

impl DeviceClient {
    /// Enroll a user from one photo containing exactly one face.
    ///
    /// `image` is a base64 data URL; see `add_user_jpeg` for raw bytes.
    pub async fn add_user(&self, name: &str, image: &str, authorized: bool) -> DgResult<Ack> {
        let request = Request::new("add_user")
            .with("name", name)
            .with("image", image)
            .with("authorized", authorized);
        self.call_typed(request, "user_added", timeouts::ADD_USER_MS)
            .await
    }

    /// Enroll a user from raw JPEG bytes.
    pub async fn add_user_jpeg(&self, name: &str, jpeg: &[u8], authorized: bool) -> DgResult<Ack> {
        self.add_user(name, &encode_jpeg(jpeg), authorized).await
    }

    pub async fn remove_user(&self, name: &str) -> DgResult<Ack> {
        let request = Request::new("remove_user").with("name", name);
        self.call_typed(request, "user_removed", timeouts::REMOVE_USER_MS)
            .await
    }

    /// All enrolled users with their authorization and thumbnail.
    pub async fn list_users(&self) -> DgResult<UsersList> {
        self.call_typed(Request::new("get_users"), "users_list", timeouts::LIST_USERS_MS)
            .await
    }

    /// Grant or revoke a user's right to unlock the door.
    pub async fn set_user_authorization(&self, name: &str, authorized: bool) -> DgResult<Ack> {
        let request = Request::new("set_user_authorization")
            .with("name", name)
            .with("authorized", authorized);
        self.call_typed(request, "authorization_response", timeouts::AUTHORIZATION_MS)
            .await
    }
}
