//! Capture command - save a photo from the device camera.

use std::path::PathBuf;

use console::style;

use dg_core::config::ConfigHandle;
use dg_core::error::DgResult;

use crate::OutputFormat;

pub async fn run(config: ConfigHandle, output: PathBuf, format: OutputFormat) -> DgResult<()> {
    let client = super::connect_client(&config).await?;
    let result = client.capture_photo().await;
    client.disconnect();

    let jpeg = result?.jpeg_bytes()?;
    std::fs::write(&output, &jpeg)?;

    match format {
        OutputFormat::Json => super::print_json(&serde_json::json!({
            "path": output.display().to_string(),
            "bytes": jpeg.len(),
        })),
        OutputFormat::Text => println!(
            "{} Saved {} ({} bytes)",
            style("OK").green().bold(),
            output.display(),
            jpeg.len()
        ),
    }
    Ok(())
}
