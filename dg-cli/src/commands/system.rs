//! System commands - reboot, face data reset and ping.

use clap::Subcommand;
use console::style;
use dialoguer::Confirm;

use dg_core::config::ConfigHandle;
use dg_core::error::{DgError, DgResult};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum SystemAction {
    /// Reboot the device.
    Reboot {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Forget every enrolled face.
    ResetFaces {
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
    /// Measure round-trip latency to the device.
    Ping {
        /// Number of pings to send.
        #[arg(short = 'n', long, default_value = "3")]
        count: u32,
    },
}

pub async fn run(config: ConfigHandle, action: SystemAction, format: OutputFormat) -> DgResult<()> {
    match action {
        SystemAction::Reboot { yes } => {
            if !yes && !confirm("Reboot the device?")? {
                return Ok(());
            }
            let client = super::connect_client(&config).await?;
            let result = client.reboot().await;
            client.disconnect();
            let ack = result?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::to_value(&ack)?),
                OutputFormat::Text => println!(
                    "{} {}",
                    style("OK").green().bold(),
                    ack.message.as_deref().unwrap_or("Device is rebooting.")
                ),
            }
        }
        SystemAction::ResetFaces { yes } => {
            if !yes && !confirm("Delete all enrolled faces? This cannot be undone")? {
                return Ok(());
            }
            let client = super::connect_client(&config).await?;
            let result = client.reset_face_data().await;
            client.disconnect();
            let ack = result?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::to_value(&ack)?),
                OutputFormat::Text => println!(
                    "{} {}",
                    style("OK").green().bold(),
                    ack.message.as_deref().unwrap_or("Face data reset.")
                ),
            }
        }
        SystemAction::Ping { count } => {
            let client = super::connect_client(&config).await?;
            let mut samples = Vec::new();
            for seq in 1..=count.max(1) {
                match client.ping().await {
                    Ok(rtt) => {
                        if let OutputFormat::Text = format {
                            println!("  pong seq={seq} time={}ms", rtt.as_millis());
                        }
                        samples.push(rtt.as_millis() as u64);
                    }
                    Err(e) => {
                        if let OutputFormat::Text = format {
                            println!("  {} seq={seq} {e}", style("LOST").red());
                        }
                    }
                }
            }
            client.disconnect();

            let sent = count.max(1) as usize;
            let avg = if samples.is_empty() {
                None
            } else {
                Some(samples.iter().sum::<u64>() / samples.len() as u64)
            };
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({
                    "sent": sent,
                    "received": samples.len(),
                    "rtt_ms": samples,
                    "avg_ms": avg,
                })),
                OutputFormat::Text => {
                    println!("{}/{} answered", samples.len(), sent);
                    if let Some(avg) = avg {
                        println!("avg {avg}ms");
                    }
                }
            }
        }
    }
    Ok(())
}

fn confirm(prompt: &str) -> DgResult<bool> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .map_err(|e| DgError::Internal(e.to_string()))
}
