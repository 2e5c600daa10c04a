//! Settings commands - door behaviour and camera performance.

use clap::Subcommand;
use console::style;

use dg_api::{DoorConfig, PerformanceSettings};
use dg_core::config::ConfigHandle;
use dg_core::error::{DgError, DgResult};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Change lock behaviour. Omitted options keep their current value.
    Door {
        /// Unlock automatically on an authorized recognition.
        #[arg(long)]
        auto_unlock: Option<bool>,
        /// Minimum confidence for an automatic unlock (0.0 to 1.0).
        #[arg(long)]
        confidence: Option<f64>,
        /// Seconds the door stays unlocked.
        #[arg(long)]
        duration: Option<u64>,
    },
    /// Tune the camera pipeline. Omitted options keep their current value.
    Performance {
        /// Target camera frame rate.
        #[arg(long)]
        fps: Option<f64>,
        /// Run recognition on every Nth frame.
        #[arg(long)]
        interval: Option<u32>,
        /// JPEG quality of streamed frames (1 to 100).
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
        quality: Option<u8>,
        /// Maximum width of streamed frames, in pixels.
        #[arg(long)]
        max_width: Option<u32>,
        /// Let the device lower quality under load.
        #[arg(long)]
        adaptive: Option<bool>,
    },
}

pub async fn run(config: ConfigHandle, action: SettingsAction, format: OutputFormat) -> DgResult<()> {
    match action {
        SettingsAction::Door { auto_unlock, confidence, duration } => {
            if let Some(c) = confidence {
                if !(0.0..=1.0).contains(&c) {
                    return Err(DgError::Config(format!("confidence {c} is outside 0.0..=1.0")));
                }
            }
            let door = DoorConfig {
                auto_unlock,
                unlock_confidence: confidence,
                lock_duration: duration,
            };
            if door.is_empty() {
                return Err(DgError::Config("nothing to change".into()));
            }

            let client = super::connect_client(&config).await?;
            let result = client.update_door_config(&door).await;
            client.disconnect();
            let ack = result?;

            match format {
                OutputFormat::Json => super::print_json(&serde_json::to_value(&door)?),
                OutputFormat::Text => println!(
                    "{} {}",
                    style("OK").green().bold(),
                    ack.message.as_deref().unwrap_or("Door configuration updated.")
                ),
            }
        }
        SettingsAction::Performance { fps, interval, quality, max_width, adaptive } => {
            if let Some(f) = fps {
                if !(f > 0.0 && f.is_finite()) {
                    return Err(DgError::Config(format!("frame rate {f} must be positive")));
                }
            }
            let settings = PerformanceSettings {
                target_fps: fps,
                recognition_interval: interval,
                jpeg_quality: quality,
                max_width,
                adaptive_quality: adaptive,
            };
            if settings.is_empty() {
                return Err(DgError::Config("nothing to change".into()));
            }

            let client = super::connect_client(&config).await?;
            let result = client.update_performance_settings(&settings).await;
            client.disconnect();
            let applied = result?.settings.unwrap_or(settings);

            match format {
                OutputFormat::Json => super::print_json(&serde_json::to_value(&applied)?),
                OutputFormat::Text => {
                    println!("{} Performance settings applied.", style("OK").green().bold());
                    if let Some(v) = applied.target_fps {
                        println!("  Frame rate:      {v} fps");
                    }
                    if let Some(v) = applied.recognition_interval {
                        println!("  Recognition:     every {v} frame(s)");
                    }
                    if let Some(v) = applied.jpeg_quality {
                        println!("  JPEG quality:    {v}");
                    }
                    if let Some(v) = applied.max_width {
                        println!("  Max width:       {v}px");
                    }
                    if let Some(v) = applied.adaptive_quality {
                        println!("  Adaptive:        {v}");
                    }
                }
            }
        }
    }
    Ok(())
}
