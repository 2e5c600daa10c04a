//! Status command - show connection, door and device status.

use std::time::Duration;

use console::style;
use tokio::time::timeout;

use dg_core::config::ConfigHandle;
use dg_core::error::DgResult;
use dg_socket::DoorStatus;

use crate::OutputFormat;

/// How long to wait for the pushed `door_status`.
const DOOR_STATUS_WAIT: Duration = Duration::from_secs(3);

/// Run the status command.
pub async fn run(config: ConfigHandle, format: OutputFormat) -> DgResult<()> {
    let client = super::connect_client(&config).await?;

    let latency = client.ping().await.ok();
    let door = fetch_door_status(&client).await;
    let users = client.list_users().await.ok();
    let target = client.target();
    client.disconnect();

    match format {
        OutputFormat::Json => {
            super::print_json(&serde_json::json!({
                "device": target.url(),
                "reachable": true,
                "latency_ms": latency.map(|d| d.as_millis() as u64),
                "door": door,
                "users": users.as_ref().map(|u| u.users.len()),
                "authorized_users": users.as_ref().map(|u| u.authorized_count()),
            }));
        }
        OutputFormat::Text => {
            println!("{}", style("Connection").bold().underlined());
            println!("  Device:    {}", target.url());
            match latency {
                Some(d) => println!(
                    "  Status:    {} ({}ms)",
                    style("connected").green(),
                    d.as_millis()
                ),
                None => println!("  Status:    {} (ping unanswered)", style("connected").yellow()),
            }

            println!();
            println!("{}", style("Door").bold().underlined());
            match &door {
                Some(status) => {
                    println!(
                        "  State:     {}",
                        if status.is_unlocked {
                            style("unlocked").yellow().to_string()
                        } else {
                            style("locked").green().to_string()
                        }
                    );
                    if let Some(secs) = status.duration {
                        println!("  Unlock:    {secs}s");
                    }
                    if let Some(pin) = status.pin {
                        println!("  Relay pin: {pin}");
                    }
                }
                None => println!("  State:     {}", style("unknown").dim()),
            }

            if let Some(users) = users {
                println!();
                println!("{}", style("Users").bold().underlined());
                println!("  Enrolled:   {}", users.users.len());
                println!("  Authorized: {}", users.authorized_count());
            }
        }
    }

    Ok(())
}

/// Ask for the door status and wait briefly for the push.
async fn fetch_door_status(client: &dg_api::DeviceClient) -> Option<DoorStatus> {
    let mut rx = client.events();
    if !client.request_status() {
        return None;
    }
    let wait = async {
        while let Ok(ev) = rx.recv().await {
            if let Some(status) = ev.as_door_status() {
                return Some(status);
            }
        }
        None
    };
    timeout(DOOR_STATUS_WAIT, wait).await.ok().flatten()
}
