//! Device response types.
//!
//! Replies arrive as the `data` of a `{type, data}` frame. Most carry a
//! `success` flag and an optional `error`; failures are turned into
//! `DgError::Peer` before these types are decoded, so a decoded value is
//! always a successful reply.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use dg_core::error::{DgError, DgResult};

/// Plain acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    /// Absent on broadcast copies of a reply; treated as success.
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_true() -> bool {
    true
}

/// One enrolled user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    #[serde(default)]
    pub authorized: Option<bool>,
    /// Base64 JPEG thumbnail, possibly as a data URL.
    #[serde(default)]
    pub photo: Option<String>,
}

impl UserEntry {
    /// Decoded photo bytes, if the device sent one.
    pub fn photo_bytes(&self) -> DgResult<Option<Vec<u8>>> {
        self.photo.as_deref().map(decode_image).transpose()
    }
}

/// Reply to `get_users`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsersList {
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl UsersList {
    pub fn find(&self, name: &str) -> Option<&UserEntry> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn authorized_count(&self) -> usize {
        self.users.iter().filter(|u| u.authorized == Some(true)).count()
    }
}

/// One recognition logged by the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRecord {
    pub name: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub is_authorized: bool,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Reply to `get_access_history`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessHistory {
    #[serde(default)]
    pub history: Vec<AccessRecord>,
}

impl AccessHistory {
    /// Records of recognitions that were not authorized.
    pub fn denied(&self) -> impl Iterator<Item = &AccessRecord> {
        self.history.iter().filter(|r| !r.is_authorized)
    }
}

/// Reply to `capture_webcam_photo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResult {
    #[serde(default = "default_true")]
    pub success: bool,
    /// `data:image/jpeg;base64,...`
    #[serde(default)]
    pub image: Option<String>,
}

impl CaptureResult {
    /// Decoded JPEG bytes.
    pub fn jpeg_bytes(&self) -> DgResult<Vec<u8>> {
        let image = self
            .image
            .as_deref()
            .ok_or_else(|| DgError::Protocol("capture reply has no image".into()))?;
        decode_image(image)
    }
}

/// How consistent the captured enrollment samples were.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingQuality {
    pub avg_distance: f64,
    pub max_distance: f64,
}

/// Reply to `add_user_from_webcam`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentResult {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub photos_captured: Option<u32>,
    #[serde(default)]
    pub encoding_quality: Option<EncodingQuality>,
}

/// Camera and recognition tuning. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSettings {
    /// Frames per second. The device stores and echoes this as a float.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_fps: Option<f64>,
    /// Run recognition on every Nth frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recognition_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jpeg_quality: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adaptive_quality: Option<bool>,
}

impl PerformanceSettings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Reply to `update_performance_settings`, echoing the applied settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSettingsAck {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub settings: Option<PerformanceSettings>,
}

/// Lock behaviour. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoorConfig {
    /// Unlock automatically on an authorized recognition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_unlock: Option<bool>,
    /// Minimum confidence for an automatic unlock, 0.0 to 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlock_confidence: Option<f64>,
    /// Seconds the door stays unlocked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_duration: Option<u64>,
}

impl DoorConfig {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Decode a base64 image, with or without a `data:` URL prefix.
pub fn decode_image(data: &str) -> DgResult<Vec<u8>> {
    let encoded = match data.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| DgError::Protocol(format!("invalid base64 image: {e}")))
}

/// Encode JPEG bytes as the data URL the device expects for enrollment.
pub fn encode_jpeg(bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_users_list_deserialization() {
        let list: UsersList = serde_json::from_value(json!({
            "users": [
                {"name": "alice", "authorized": true, "photo": "data:image/jpeg;base64,/9j/"},
                {"name": "bob", "authorized": false, "photo": null}
            ]
        }))
        .unwrap();
        assert_eq!(list.users.len(), 2);
        assert_eq!(list.authorized_count(), 1);
        assert!(list.find("bob").unwrap().photo.is_none());
        assert!(list.find("carol").is_none());
    }

    #[test]
    fn test_access_history_deserialization() {
        let history: AccessHistory = serde_json::from_value(json!({
            "history": [
                {"name": "alice", "timestamp": "2024-05-01T08:00:00", "is_authorized": true, "confidence": 0.71},
                {"name": "Unknown", "timestamp": "2024-05-01T08:05:00", "is_authorized": false, "confidence": 0.0}
            ]
        }))
        .unwrap();
        assert_eq!(history.history.len(), 2);
        assert_eq!(history.denied().count(), 1);
    }

    #[test]
    fn test_ack_without_success_is_success() {
        let ack: Ack = serde_json::from_value(json!({"name": "alice", "authorized": true})).unwrap();
        assert!(ack.success);
    }

    #[test]
    fn test_image_round_trip_through_data_url() {
        let bytes = vec![0xff, 0xd8, 0xff, 0xe0, 0x00, 0x10];
        let url = encode_jpeg(&bytes);
        assert!(url.starts_with("data:image/jpeg;base64,"));
        assert_eq!(decode_image(&url).unwrap(), bytes);
    }

    #[test]
    fn test_decode_bare_base64() {
        assert_eq!(decode_image("aGk=").unwrap(), b"hi");
        assert!(matches!(decode_image("%%%"), Err(DgError::Protocol(_))));
    }

    #[test]
    fn test_capture_without_image_is_protocol_error() {
        let capture = CaptureResult { success: true, image: None };
        assert!(matches!(capture.jpeg_bytes(), Err(DgError::Protocol(_))));
    }

    #[test]
    fn test_settings_serialize_only_set_fields() {
        let settings = PerformanceSettings {
            target_fps: Some(15.0),
            adaptive_quality: Some(false),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&settings).unwrap(),
            json!({"target_fps": 15.0, "adaptive_quality": false})
        );
        assert!(PerformanceSettings::default().is_empty());
    }

    #[test]
    fn test_settings_ack_accepts_device_echo() {
        let ack: PerformanceSettingsAck = serde_json::from_value(json!({
            "success": true,
            "settings": {
                "target_fps": 15.0,
                "recognition_interval": 20,
                "jpeg_quality": 60,
                "max_width": 320,
                "adaptive_quality": true
            }
        }))
        .unwrap();
        let settings = ack.settings.unwrap();
        assert_eq!(settings.target_fps, Some(15.0));
        assert_eq!(settings.max_width, Some(320));

        // Before any update the device reports its integer default.
        let defaults: PerformanceSettings =
            serde_json::from_value(json!({"target_fps": 10, "jpeg_quality": 60})).unwrap();
        assert_eq!(defaults.target_fps, Some(10.0));
    }

    #[test]
    fn test_enrollment_result() {
        let result: EnrollmentResult = serde_json::from_value(json!({
            "success": true,
            "message": "User bob added with 5 photos",
            "photos_captured": 5,
            "encoding_quality": {"avg_distance": 0.21, "max_distance": 0.34}
        }))
        .unwrap();
        assert_eq!(result.photos_captured, Some(5));
        assert!(result.encoding_quality.unwrap().max_distance < 0.6);
    }
}
