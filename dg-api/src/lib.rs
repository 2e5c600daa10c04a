//! DoorGuard API - typed operations on the door controller.
//!
//! This crate provides the session facade used by front ends. Every
//! operation is one request/response exchange over the device session with
//! a fixed request type, payload shape, response event and time budget:
//! door control, user management, webcam capture and enrollment, access
//! history, device settings, and maintenance.

pub mod client;
pub mod endpoints;
pub mod response;

// Re-export key types
pub use client::DeviceClient;
pub use response::{
    AccessHistory, AccessRecord, Ack, CaptureResult, DoorConfig, EncodingQuality,
    EnrollmentResult, PerformanceSettings, PerformanceSettingsAck, UserEntry, UsersList,
};
