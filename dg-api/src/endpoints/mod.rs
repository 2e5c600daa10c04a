//! Device operations organized by category.
//!
//! Each module adds typed methods to `DeviceClient` for a group of related
//! request types.

pub mod door;
pub mod users;
pub mod camera;
pub mod history;
pub mod system;
