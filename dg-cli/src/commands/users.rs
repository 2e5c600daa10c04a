//! User commands - list, enroll, remove and authorize.

use std::path::PathBuf;

use clap::Subcommand;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use dg_core::config::ConfigHandle;
use dg_core::error::{DgError, DgResult};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum UsersAction {
    /// List enrolled users.
    List,
    /// Enroll a user from a JPEG containing exactly one face.
    Add {
        /// User name.
        name: String,
        /// Path to the photo.
        #[arg(short, long)]
        photo: PathBuf,
        /// Enroll without permission to unlock the door.
        #[arg(long)]
        unauthorized: bool,
    },
    /// Enroll a user from photos taken by the device camera.
    Enroll {
        /// User name.
        name: String,
    },
    /// Remove an enrolled user.
    Remove {
        /// User name.
        name: String,
    },
    /// Grant a user permission to unlock the door.
    Authorize {
        /// User name.
        name: String,
    },
    /// Revoke a user's permission to unlock the door.
    Revoke {
        /// User name.
        name: String,
    },
    /// Save a user's enrollment photo to disk.
    Photo {
        /// User name.
        name: String,
        /// Where to write the JPEG (defaults to `<name>.jpg`).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run(config: ConfigHandle, action: UsersAction, format: OutputFormat) -> DgResult<()> {
    let client = super::connect_client(&config).await?;
    let result = dispatch(&client, action, format).await;
    client.disconnect();
    result
}

async fn dispatch(client: &dg_api::DeviceClient, action: UsersAction, format: OutputFormat) -> DgResult<()> {
    match action {
        UsersAction::List => {
            let list = client.list_users().await?;
            match format {
                OutputFormat::Json => {
                    let json: Vec<_> = list
                        .users
                        .iter()
                        .map(|u| {
                            serde_json::json!({
                                "name": u.name,
                                "authorized": u.authorized,
                                "has_photo": u.photo.is_some(),
                            })
                        })
                        .collect();
                    super::print_json(&serde_json::json!(json));
                }
                OutputFormat::Text => {
                    if list.users.is_empty() {
                        println!("No users enrolled.");
                        return Ok(());
                    }
                    let mut table = Table::new();
                    table
                        .load_preset(UTF8_FULL)
                        .apply_modifier(UTF8_ROUND_CORNERS)
                        .set_content_arrangement(ContentArrangement::Dynamic);
                    table.set_header(vec!["Name", "Authorized", "Photo"]);
                    for user in &list.users {
                        let authorized = match user.authorized {
                            Some(true) => "yes",
                            Some(false) => "no",
                            None => "-",
                        };
                        let photo = if user.photo.is_some() { "yes" } else { "-" };
                        table.add_row(vec![super::truncate(&user.name, 32), authorized.into(), photo.into()]);
                    }
                    println!("{table}");
                    println!(
                        "{} users, {} authorized",
                        list.users.len(),
                        list.authorized_count()
                    );
                }
            }
        }
        UsersAction::Add { name, photo, unauthorized } => {
            let bytes = std::fs::read(&photo)?;
            let ack = client.add_user_jpeg(&name, &bytes, !unauthorized).await?;
            report(format, &name, ack.message.as_deref(), "enrolled");
        }
        UsersAction::Enroll { name } => {
            println!("Look at the camera, {name}.");
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::with_template("  {bar:30.cyan/blue} {pos}/{len} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            let progress = bar.clone();
            let result = client
                .add_user_from_webcam(&name, move |update| {
                    progress.set_length(update.total as u64);
                    progress.set_position(update.current as u64);
                    progress.set_message(update.message);
                })
                .await;
            bar.finish_and_clear();
            let result = result?;

            match format {
                OutputFormat::Json => super::print_json(&serde_json::to_value(&result)?),
                OutputFormat::Text => {
                    println!(
                        "{} {}",
                        style("OK").green().bold(),
                        result.message.as_deref().unwrap_or("User enrolled.")
                    );
                    if let Some(quality) = result.encoding_quality {
                        println!(
                            "  Sample spread: avg {:.2}, max {:.2}",
                            quality.avg_distance, quality.max_distance
                        );
                    }
                }
            }
        }
        UsersAction::Remove { name } => {
            let ack = client.remove_user(&name).await?;
            report(format, &name, ack.message.as_deref(), "removed");
        }
        UsersAction::Authorize { name } => {
            let ack = client.set_user_authorization(&name, true).await?;
            report(format, &name, ack.message.as_deref(), "authorized");
        }
        UsersAction::Revoke { name } => {
            let ack = client.set_user_authorization(&name, false).await?;
            report(format, &name, ack.message.as_deref(), "revoked");
        }
        UsersAction::Photo { name, output } => {
            let list = client.list_users().await?;
            let user = list
                .find(&name)
                .ok_or_else(|| DgError::Peer(format!("User {name} not found")))?;
            let bytes = user
                .photo_bytes()?
                .ok_or_else(|| DgError::Protocol(format!("no photo stored for {name}")))?;
            let path = output.unwrap_or_else(|| PathBuf::from(format!("{name}.jpg")));
            std::fs::write(&path, &bytes)?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({
                    "name": name,
                    "path": path.display().to_string(),
                    "bytes": bytes.len(),
                })),
                OutputFormat::Text => println!(
                    "{} Saved {} ({} bytes)",
                    style("OK").green().bold(),
                    path.display(),
                    bytes.len()
                ),
            }
        }
    }
    Ok(())
}

fn report(format: OutputFormat, name: &str, message: Option<&str>, verb: &str) {
    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "name": name,
            "result": verb,
            "message": message,
        })),
        OutputFormat::Text => match message {
            Some(m) => println!("{} {m}", style("OK").green().bold()),
            None => println!("{} {name} {verb}.", style("OK").green().bold()),
        },
    }
}
