//! Device event types and typed payloads.
//!
//! Every frame the device sends is tagged with a `type` string. This module
//! gives each known tag a variant, and each payload a struct, so consumers
//! of the event stream do not have to poke at raw JSON.

use serde::{Deserialize, Serialize};

use dg_core::constants::lifecycle;

/// All event names that flow over the bus.
///
/// Device tags map 1:1 to the `type` field on the wire. `ConnectionStatus`
/// and `Error` are published by the client itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceEventType {
    // -- Responses --
    /// Reply to `add_user`; also broadcast to every client on enrollment.
    UserAdded,
    /// Reply to `remove_user`; also broadcast on removal.
    UserRemoved,
    UnlockResponse,
    LockResponse,
    UsersList,
    AccessHistory,
    WebcamCaptureResponse,
    UserAddedFromWebcam,
    /// Partial update while a webcam enrollment captures samples.
    UserEnrollmentProgress,
    RebootResponse,
    PerformanceSettingsResponse,
    ConfigResponse,
    AuthorizationResponse,
    ResetFaceDataResponse,
    Pong,

    // -- Unsolicited pushes --
    /// Lock state; sent on connect and in reply to `get_door_status`.
    DoorStatus,
    /// One annotated camera frame with recognition results.
    Frame,
    Recognition,
    DoorUnlocked,
    DoorLocked,
    MotionDetected,
    SecurityAlert,
    UserAuthorizationChanged,
    ConfigUpdated,
    FaceDataReset,
    SystemRebooting,

    // -- Client lifecycle --
    ConnectionStatus,
    Error,

    /// Unknown/unhandled event name.
    Unknown(String),
}

impl DeviceEventType {
    /// Parse an event name.
    pub fn from_name(s: &str) -> Self {
        match s {
            "user_added" => Self::UserAdded,
            "user_removed" => Self::UserRemoved,
            "unlock_response" => Self::UnlockResponse,
            "lock_response" => Self::LockResponse,
            "users_list" => Self::UsersList,
            "access_history" => Self::AccessHistory,
            "webcam_capture_response" => Self::WebcamCaptureResponse,
            "user_added_from_webcam" => Self::UserAddedFromWebcam,
            "user_enrollment_progress" => Self::UserEnrollmentProgress,
            "reboot_response" => Self::RebootResponse,
            "performance_settings_response" => Self::PerformanceSettingsResponse,
            "config_response" => Self::ConfigResponse,
            "authorization_response" => Self::AuthorizationResponse,
            "reset_face_data_response" => Self::ResetFaceDataResponse,
            "pong" => Self::Pong,
            "door_status" => Self::DoorStatus,
            "frame" => Self::Frame,
            "recognition" => Self::Recognition,
            "door_unlocked" => Self::DoorUnlocked,
            "door_locked" => Self::DoorLocked,
            "motion_detected" => Self::MotionDetected,
            "security_alert" => Self::SecurityAlert,
            "user_authorization_changed" => Self::UserAuthorizationChanged,
            "config_updated" => Self::ConfigUpdated,
            "face_data_reset" => Self::FaceDataReset,
            "system_rebooting" => Self::SystemRebooting,
            lifecycle::CONNECTION_STATUS => Self::ConnectionStatus,
            lifecycle::ERROR => Self::Error,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The event name as used on the wire and as the bus key.
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserAdded => "user_added",
            Self::UserRemoved => "user_removed",
            Self::UnlockResponse => "unlock_response",
            Self::LockResponse => "lock_response",
            Self::UsersList => "users_list",
            Self::AccessHistory => "access_history",
            Self::WebcamCaptureResponse => "webcam_capture_response",
            Self::UserAddedFromWebcam => "user_added_from_webcam",
            Self::UserEnrollmentProgress => "user_enrollment_progress",
            Self::RebootResponse => "reboot_response",
            Self::PerformanceSettingsResponse => "performance_settings_response",
            Self::ConfigResponse => "config_response",
            Self::AuthorizationResponse => "authorization_response",
            Self::ResetFaceDataResponse => "reset_face_data_response",
            Self::Pong => "pong",
            Self::DoorStatus => "door_status",
            Self::Frame => "frame",
            Self::Recognition => "recognition",
            Self::DoorUnlocked => "door_unlocked",
            Self::DoorLocked => "door_locked",
            Self::MotionDetected => "motion_detected",
            Self::SecurityAlert => "security_alert",
            Self::UserAuthorizationChanged => "user_authorization_changed",
            Self::ConfigUpdated => "config_updated",
            Self::FaceDataReset => "face_data_reset",
            Self::SystemRebooting => "system_rebooting",
            Self::ConnectionStatus => lifecycle::CONNECTION_STATUS,
            Self::Error => lifecycle::ERROR,
            Self::Unknown(s) => s.as_str(),
        }
    }

    /// Whether the device sends this without being asked.
    pub fn is_push(&self) -> bool {
        matches!(
            self,
            Self::DoorStatus
                | Self::Frame
                | Self::Recognition
                | Self::DoorUnlocked
                | Self::DoorLocked
                | Self::MotionDetected
                | Self::SecurityAlert
                | Self::UserAuthorizationChanged
                | Self::ConfigUpdated
                | Self::FaceDataReset
                | Self::SystemRebooting
        )
    }

    /// Whether the event was produced by the client rather than the device.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::ConnectionStatus | Self::Error)
    }

    /// Whether the event reports a change to the lock itself.
    pub fn is_door_event(&self) -> bool {
        matches!(self, Self::DoorStatus | Self::DoorUnlocked | Self::DoorLocked)
    }
}

impl std::fmt::Display for DeviceEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock state reported by `door_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorStatus {
    pub is_unlocked: bool,
    /// GPIO pin driving the relay.
    #[serde(default)]
    pub pin: Option<u32>,
    /// Seconds the door stays unlocked after an unlock.
    #[serde(default)]
    pub duration: Option<u64>,
}

/// Bounding box of a detected face, in frame pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLocation {
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
    pub left: i64,
}

/// One face found in a camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceResult {
    pub name: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub is_authorized: bool,
    #[serde(default)]
    pub location: Option<FaceLocation>,
}

impl FaceResult {
    pub fn is_known(&self) -> bool {
        self.name != "Unknown"
    }
}

/// Recognition results attached to a frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameResults {
    #[serde(default)]
    pub faces: Vec<FaceResult>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub door_status: Option<DoorStatus>,
}

/// Live camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePayload {
    /// Base64-encoded JPEG.
    pub image: String,
    #[serde(default)]
    pub results: FrameResults,
}

/// A logged recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionPayload {
    pub name: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub is_authorized: bool,
    #[serde(default)]
    pub door_unlocked: Option<bool>,
}

/// Payload of `door_unlocked`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoorUnlockedPayload {
    /// Who triggered it; "Manual" for client-initiated unlocks.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub auto_unlock: bool,
}

/// Partial progress of a webcam enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentProgress {
    #[serde(default)]
    pub name: Option<String>,
    pub current: u32,
    pub total: u32,
    #[serde(default)]
    pub message: String,
}

/// Payload of `system_rebooting`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemRebootingPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub countdown: Option<u32>,
}

/// Connection lifecycle as published under `connectionStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatusKind {
    Connected,
    Disconnected,
    /// Retry budget exhausted; only a manual reconnect leaves this.
    Failed,
}

impl std::fmt::Display for ConnectionStatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Payload of `connectionStatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatusPayload {
    pub status: ConnectionStatusKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Consecutive failure count when a retry was scheduled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_in_ms: Option<u64>,
}

impl ConnectionStatusPayload {
    pub fn connected() -> Self {
        Self {
            status: ConnectionStatusKind::Connected,
            message: None,
            attempt: None,
            retry_in_ms: None,
        }
    }

    pub fn disconnected(attempt: Option<u32>, retry_in_ms: Option<u64>) -> Self {
        Self {
            status: ConnectionStatusKind::Disconnected,
            message: None,
            attempt,
            retry_in_ms,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ConnectionStatusKind::Failed,
            message: Some(message.into()),
            attempt: None,
            retry_in_ms: None,
        }
    }
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// An event with its type and raw payload.
#[derive(Debug, Clone)]
pub struct DeviceEvent {
    pub event_type: DeviceEventType,
    pub data: serde_json::Value,
}

impl DeviceEvent {
    /// Build an event from a bus name and payload.
    pub fn new(name: &str, data: serde_json::Value) -> Self {
        Self {
            event_type: DeviceEventType::from_name(name),
            data,
        }
    }

    fn parse_as<T: serde::de::DeserializeOwned>(&self, expected: DeviceEventType) -> Option<T> {
        if self.event_type == expected {
            serde_json::from_value(self.data.clone()).ok()
        } else {
            None
        }
    }

    /// Try to parse the data as a DoorStatus.
    pub fn as_door_status(&self) -> Option<DoorStatus> {
        self.parse_as(DeviceEventType::DoorStatus)
    }

    /// Try to parse the data as a FramePayload.
    pub fn as_frame(&self) -> Option<FramePayload> {
        self.parse_as(DeviceEventType::Frame)
    }

    /// Try to parse the data as a RecognitionPayload.
    pub fn as_recognition(&self) -> Option<RecognitionPayload> {
        self.parse_as(DeviceEventType::Recognition)
    }

    /// Try to parse the data as a DoorUnlockedPayload.
    pub fn as_door_unlocked(&self) -> Option<DoorUnlockedPayload> {
        self.parse_as(DeviceEventType::DoorUnlocked)
    }

    /// Try to parse the data as an EnrollmentProgress.
    pub fn as_enrollment_progress(&self) -> Option<EnrollmentProgress> {
        self.parse_as(DeviceEventType::UserEnrollmentProgress)
    }

    /// Try to parse the data as a SystemRebootingPayload.
    pub fn as_system_rebooting(&self) -> Option<SystemRebootingPayload> {
        self.parse_as(DeviceEventType::SystemRebooting)
    }

    /// Try to parse the data as a ConnectionStatusPayload.
    pub fn as_connection_status(&self) -> Option<ConnectionStatusPayload> {
        self.parse_as(DeviceEventType::ConnectionStatus)
    }

    /// Try to parse the data as an ErrorPayload.
    pub fn as_error(&self) -> Option<ErrorPayload> {
        self.parse_as(DeviceEventType::Error)
    }
}
