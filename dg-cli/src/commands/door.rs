//! Door commands - unlock and lock.

use console::style;

use dg_core::config::ConfigHandle;
use dg_core::error::DgResult;

use crate::OutputFormat;

pub async fn unlock(config: ConfigHandle, duration: Option<u64>, format: OutputFormat) -> DgResult<()> {
    let client = super::connect_client(&config).await?;
    let result = client.unlock(duration).await;
    client.disconnect();
    let unlocked = result?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "unlocked": unlocked,
            "duration": duration,
        })),
        OutputFormat::Text => match (unlocked, duration) {
            (true, Some(secs)) => println!("{} Door unlocked for {secs}s.", style("OK").green().bold()),
            (true, None) => println!("{} Door unlocked.", style("OK").green().bold()),
            (false, _) => println!("{} Device did not unlock the door.", style("FAIL").red().bold()),
        },
    }
    Ok(())
}

pub async fn lock(config: ConfigHandle, format: OutputFormat) -> DgResult<()> {
    let client = super::connect_client(&config).await?;
    let result = client.lock().await;
    client.disconnect();
    let locked = result?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({ "locked": locked })),
        OutputFormat::Text if locked => println!("{} Door locked.", style("OK").green().bold()),
        OutputFormat::Text => println!("{} Device did not lock the door.", style("FAIL").red().bold()),
    }
    Ok(())
}
