//! Address commands - show or change the saved device address.

use clap::Subcommand;
use console::style;

use dg_core::config::{ConfigHandle, Environment};
use dg_core::error::DgResult;

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum AddressAction {
    /// Show the saved address and the URL it resolves to.
    Show,
    /// Save a new device address (host, host:port or ws/wss URL).
    Set {
        /// Device address.
        address: String,
    },
}

pub async fn run(config: ConfigHandle, action: AddressAction, format: OutputFormat) -> DgResult<()> {
    match action {
        AddressAction::Show => {
            let cfg = config.read().await;
            let environment = Environment::resolve(cfg.server.environment);
            let url = cfg.target().ok().map(|t| t.url());
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({
                    "address": cfg.server.address,
                    "environment": environment,
                    "url": url,
                })),
                OutputFormat::Text => {
                    if !cfg.is_server_configured() {
                        println!("No device address saved.");
                        return Ok(());
                    }
                    println!("  Address:     {}", cfg.server.address);
                    println!("  Environment: {environment:?}");
                    match url {
                        Some(url) => println!("  URL:         {url}"),
                        None => println!("  URL:         {}", style("invalid").red()),
                    }
                }
            }
        }
        AddressAction::Set { address } => {
            config.save_address(&address).await?;
            let url = config.read().await.target()?.url();
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({
                    "address": address.trim(),
                    "url": url,
                })),
                OutputFormat::Text => {
                    println!("{} Device address saved: {url}", style("OK").green().bold())
                }
            }
        }
    }
    Ok(())
}
