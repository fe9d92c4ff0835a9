//! Ingest command - push one file through the pipeline.

use super::{parse_channel, Pipeline};
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pixsync_core::WatchedFile;
use pixsync_ingest::IngestOutcome;
use std::path::Path;
use std::time::Duration;

pub async fn run(path: &Path, channel: &str, keep: bool) -> Result<()> {
    let channel = parse_channel(channel)?;
    if !path.is_file() {
        anyhow::bail!("Not a file: {}", path.display());
    }
    let pipeline = Pipeline::open()?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message(format!("Ingesting {} into {}", path.display(), channel));
    pb.enable_steady_tick(Duration::from_millis(100));

    let record = if keep {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Unusable file name: {}", path.display()))?;
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Some(
            pipeline
                .coordinator
                .ingest_bytes(channel, name, data.into())
                .await?,
        )
    } else {
        match pipeline
            .coordinator
            .ingest_file(WatchedFile::new(path, channel))
            .await?
        {
            IngestOutcome::Ingested(record) => Some(record),
            IngestOutcome::CleanedUp(_) | IngestOutcome::InFlight => None,
        }
    };

    match record {
        Some(record) => {
            pb.finish_with_message(format!("{} {}", "Ingested:".green().bold(), record.name));
            println!("  ID: {}", record.id);
            println!("  URL: {}", record.url);
        }
        None => pb.finish_with_message(format!("{} {}", "Done:".green().bold(), path.display())),
    }

    Ok(())
}
