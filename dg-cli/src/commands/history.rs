//! History command - show logged recognitions.

use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, ContentArrangement, Table};
use console::style;

use dg_core::config::ConfigHandle;
use dg_core::error::DgResult;

use crate::OutputFormat;

pub async fn run(
    config: ConfigHandle,
    denied_only: bool,
    limit: Option<usize>,
    format: OutputFormat,
) -> DgResult<()> {
    let client = super::connect_client(&config).await?;
    let result = client.access_history().await;
    client.disconnect();
    let history = result?;

    let mut records: Vec<_> = if denied_only {
        history.denied().collect()
    } else {
        history.history.iter().collect()
    };
    if let Some(n) = limit {
        let skip = records.len().saturating_sub(n);
        records.drain(..skip);
    }

    match format {
        OutputFormat::Json => super::print_json(&serde_json::to_value(&records)?),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No access records.");
                return Ok(());
            }
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .apply_modifier(UTF8_ROUND_CORNERS)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Time", "Name", "Confidence", "Result"]);
            for record in &records {
                table.add_row(vec![
                    record.timestamp.clone().unwrap_or_else(|| "-".into()),
                    super::truncate(&record.name, 24),
                    record
                        .confidence
                        .map(super::format_confidence)
                        .unwrap_or_else(|| "-".into()),
                    if record.is_authorized {
                        style("granted").green().to_string()
                    } else {
                        style("denied").red().to_string()
                    },
                ]);
            }
            println!("{table}");
        }
    }
    Ok(())
}
