//! Recent command - list the newest records of a channel.

use super::{parse_channel, Pipeline};
use anyhow::Result;
use colored::Colorize;
use pixsync_db::MetadataIndex;

pub async fn run(channel: &str, limit: usize) -> Result<()> {
    let channel = parse_channel(channel)?;
    let pipeline = Pipeline::open()?;

    let records = pipeline.index.query(channel, Some(limit)).await?;

    if records.is_empty() {
        println!(
            "{}",
            format!("No records in {}. Drop an image into its inbox to add one.", channel).dimmed()
        );
        return Ok(());
    }

    println!("{}", format!("Recent {} Records", channel).cyan().bold());
    println!("{}", "─".repeat(70));

    for record in records {
        let date = record.created_at.format("%Y-%m-%d %H:%M:%S").to_string();
        println!(
            "{} {} {}",
            record.name.white().bold(),
            format!("[{}]", record.id).dimmed(),
            date.dimmed()
        );
        println!("  {}", record.url.dimmed());
    }

    Ok(())
}
