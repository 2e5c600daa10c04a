//! Application-wide constants.

/// Application name.
pub const APP_NAME: &str = "DoorGuard";

/// Application version.
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Port the device's WebSocket server listens on.
pub const DEFAULT_DEVICE_PORT: u16 = 8765;

/// Environment variable selecting `development` or `production`.
pub const ENVIRONMENT_VAR: &str = "DOORGUARD_ENV";

/// Base delay before the first reconnect attempt, in milliseconds.
pub const RECONNECT_BASE_DELAY_MS: u64 = 1_000;

/// Upper bound on any single reconnect delay, in milliseconds.
pub const RECONNECT_MAX_DELAY_MS: u64 = 10_000;

/// Consecutive failures after which reconnection stops.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Capacity of the typed event broadcast channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Event names the client itself publishes on the bus.
pub mod lifecycle {
    /// Connection lifecycle changes (`connected`, `disconnected`, `failed`).
    pub const CONNECTION_STATUS: &str = "connectionStatus";
    /// Human-readable transport errors.
    pub const ERROR: &str = "error";
}

/// Per-operation call budgets, in milliseconds.
pub mod timeouts {
    pub const UNLOCK_MS: u64 = 5_000;
    pub const LOCK_MS: u64 = 5_000;
    pub const ADD_USER_MS: u64 = 20_000;
    pub const WEBCAM_ENROLL_MS: u64 = 30_000;
    pub const REMOVE_USER_MS: u64 = 15_000;
    pub const LIST_USERS_MS: u64 = 5_000;
    pub const ACCESS_HISTORY_MS: u64 = 5_000;
    pub const CAPTURE_PHOTO_MS: u64 = 10_000;
    pub const PERFORMANCE_SETTINGS_MS: u64 = 5_000;
    pub const DOOR_CONFIG_MS: u64 = 5_000;
    pub const REBOOT_MS: u64 = 10_000;
    pub const AUTHORIZATION_MS: u64 = 5_000;
    pub const RESET_FACE_DATA_MS: u64 = 15_000;
    pub const PING_MS: u64 = 5_000;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_bounds() {
        assert!(RECONNECT_BASE_DELAY_MS < RECONNECT_MAX_DELAY_MS);
        assert_eq!(MAX_RECONNECT_ATTEMPTS, 5);
    }
}
