//! CLI command implementations.

pub mod listen;
pub mod status;
pub mod door;
pub mod users;
pub mod history;
pub mod capture;
pub mod settings;
pub mod system;
pub mod address;

use std::time::Duration;

use serde_json::Value;

use dg_api::DeviceClient;
use dg_core::config::ConfigHandle;
use dg_core::error::{DgError, DgResult};

/// How long a one-shot command waits for the connection to open.
const CONNECT_WAIT: Duration = Duration::from_secs(20);

/// Helper to create a client for the saved device address.
pub async fn create_client(config: &ConfigHandle) -> DgResult<DeviceClient> {
    let cfg = config.read().await.clone();
    if !cfg.is_server_configured() {
        return Err(DgError::Config(
            "no device address configured. Run `doorguard address set <host>` first.".into(),
        ));
    }
    DeviceClient::from_config(&cfg)
}

/// Helper to create a client and wait until its connection is open.
pub async fn connect_client(config: &ConfigHandle) -> DgResult<DeviceClient> {
    let client = create_client(config).await?;
    client.connect();
    client.wait_until_open(CONNECT_WAIT).await?;
    Ok(client)
}

/// Pretty-print a JSON value for `--format json`.
pub fn print_json(value: &Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Format a 0.0 to 1.0 confidence as a percentage.
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.0}%", (confidence * 100.0).clamp(0.0, 100.0))
}

/// Truncate a string to a maximum length, appending an ellipsis if truncated.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_confidence() {
        assert_eq!(format_confidence(0.613), "61%");
        assert_eq!(format_confidence(1.7), "100%");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("front door", 20), "front door");
        assert_eq!(truncate("front door camera", 8), "front...");
        assert_eq!(truncate("abc", 2), "ab");
    }
}
