//! Listen command - hold a connection open and print device events.

use console::style;
use dialoguer::Input;
use tokio::sync::broadcast::error::RecvError;
use tracing::error;

use dg_core::config::ConfigHandle;
use dg_core::error::{DgError, DgResult};
use dg_socket::{ConnectionStatusKind, DeviceEvent, DeviceEventType};

use crate::OutputFormat;

/// Which events `listen` prints.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter {
    /// Include camera frames.
    pub frames: bool,
    /// Only lock changes.
    pub doors: bool,
    /// Include replies to requests.
    pub all: bool,
}

impl EventFilter {
    /// Connection status and errors always pass.
    pub fn shows(&self, event_type: &DeviceEventType) -> bool {
        if event_type.is_lifecycle() {
            return true;
        }
        if self.doors {
            return event_type.is_door_event();
        }
        if *event_type == DeviceEventType::Frame {
            return self.frames;
        }
        self.all || event_type.is_push()
    }
}

/// Run the listen command.
pub async fn run(
    config: ConfigHandle,
    address: Option<String>,
    save: bool,
    filter: EventFilter,
    format: OutputFormat,
) -> DgResult<()> {
    // Determine address: arg > config > interactive prompt
    let addr = match address {
        Some(a) => a,
        None => {
            let current = config.read().await.server.address.clone();
            if current.trim().is_empty() {
                Input::<String>::new()
                    .with_prompt("Device address")
                    .interact_text()
                    .map_err(|e| DgError::Internal(e.to_string()))?
            } else {
                current
            }
        }
    };
    config.write().await.server.address = addr.trim().to_string();

    let client = super::create_client(&config).await?;
    let mut rx = client.events();

    println!(
        "{} Connecting to {}...",
        style("[1/2]").bold().dim(),
        client.target()
    );
    client.connect();

    // Wait for the first lifecycle verdict.
    loop {
        match rx.recv().await {
            Ok(ev) => {
                if let Some(status) = ev.as_connection_status() {
                    match status.status {
                        ConnectionStatusKind::Connected => break,
                        ConnectionStatusKind::Disconnected => println!(
                            "  {} Attempt {} failed, retrying in {}ms",
                            style("RETRY").yellow(),
                            status.attempt.unwrap_or(0),
                            status.retry_in_ms.unwrap_or(0)
                        ),
                        ConnectionStatusKind::Failed => {
                            let message = status.message.unwrap_or_default();
                            println!("  {} {message}", style("FAIL").red().bold());
                            return Err(DgError::NotConnected);
                        }
                    }
                } else if let Some(err) = ev.as_error() {
                    println!("  {} {}", style("ERROR").red(), err.message);
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return Err(DgError::NotConnected),
        }
    }
    println!("  {} Connected.", style("OK").green().bold());

    if save {
        config.save_address(&addr).await?;
        println!("  {} Address saved.", style("OK").green());
    }

    println!(
        "{} Listening for events... (Ctrl+C to stop)",
        style("[2/2]").bold().dim(),
    );
    println!();
    client.request_status();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        if !filter.shows(&ev.event_type) {
                            continue;
                        }
                        print_event(&ev, format);
                        if ev
                            .as_connection_status()
                            .is_some_and(|s| s.status == ConnectionStatusKind::Failed)
                        {
                            error!("device unreachable, giving up");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        println!(
                            "  {} Missed {n} events (slow consumer)",
                            style("WARN").yellow()
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\n  Disconnecting...");
                client.disconnect();
                break;
            }
        }
    }

    Ok(())
}

fn print_event(ev: &DeviceEvent, format: OutputFormat) {
    if let OutputFormat::Json = format {
        println!(
            "{}",
            serde_json::json!({"type": ev.event_type.as_str(), "data": ev.data})
        );
        return;
    }

    let tag = style(format!("[{}]", ev.event_type.as_str())).cyan();
    let line = describe(ev).unwrap_or_else(|| ev.data.to_string());
    println!("  {tag} {line}");
}

/// One-line summary for the events worth reading.
fn describe(ev: &DeviceEvent) -> Option<String> {
    match ev.event_type {
        DeviceEventType::DoorStatus => ev.as_door_status().map(|s| {
            if s.is_unlocked {
                "door is unlocked".to_string()
            } else {
                "door is locked".to_string()
            }
        }),
        DeviceEventType::Recognition => ev.as_recognition().map(|r| {
            format!(
                "{} ({}) {}",
                r.name,
                super::format_confidence(r.confidence),
                if r.is_authorized { "authorized" } else { "denied" }
            )
        }),
        DeviceEventType::DoorUnlocked => ev.as_door_unlocked().map(|u| {
            let who = u.user.unwrap_or_else(|| "manual".into());
            match u.duration {
                Some(secs) => format!("unlocked by {who} for {secs}s"),
                None => format!("unlocked by {who}"),
            }
        }),
        DeviceEventType::Frame => ev.as_frame().map(|f| {
            let names: Vec<_> = f.results.faces.iter().map(|face| face.name.as_str()).collect();
            if names.is_empty() {
                "no faces".to_string()
            } else {
                names.join(", ")
            }
        }),
        DeviceEventType::SystemRebooting => ev.as_system_rebooting().map(|r| r.message),
        DeviceEventType::ConnectionStatus => ev.as_connection_status().map(|s| match s.status {
            ConnectionStatusKind::Connected => "connected".to_string(),
            ConnectionStatusKind::Disconnected => match s.retry_in_ms {
                Some(ms) => format!("disconnected, retrying in {ms}ms"),
                None => "disconnected".to_string(),
            },
            ConnectionStatusKind::Failed => s.message.unwrap_or_else(|| "failed".into()),
        }),
        DeviceEventType::Error => ev.as_error().map(|e| e.message),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_shows_pushes_only() {
        let filter = EventFilter::default();
        assert!(filter.shows(&DeviceEventType::Recognition));
        assert!(filter.shows(&DeviceEventType::ConnectionStatus));
        assert!(!filter.shows(&DeviceEventType::Frame));
        assert!(!filter.shows(&DeviceEventType::UsersList));
    }

    #[test]
    fn test_door_filter() {
        let filter = EventFilter { doors: true, ..Default::default() };
        assert!(filter.shows(&DeviceEventType::DoorUnlocked));
        assert!(filter.shows(&DeviceEventType::Error));
        assert!(!filter.shows(&DeviceEventType::Recognition));
        assert!(!filter.shows(&DeviceEventType::Frame));
    }

    #[test]
    fn test_all_and_frames() {
        let filter = EventFilter { all: true, ..Default::default() };
        assert!(filter.shows(&DeviceEventType::UnlockResponse));
        assert!(!filter.shows(&DeviceEventType::Frame));

        let filter = EventFilter { frames: true, ..Default::default() };
        assert!(filter.shows(&DeviceEventType::Frame));
    }
}
