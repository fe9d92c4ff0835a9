//! Watch command - headless inbox sync.

use super::Pipeline;
use anyhow::Result;
use colored::Colorize;
use tracing::info;

pub async fn run() -> Result<()> {
    let pipeline = Pipeline::open()?;
    let source = pipeline.inbox_source()?;

    println!("{}", "Starting inbox sync...".cyan());
    pipeline.print_inboxes();
    println!("\nPress Ctrl+C to stop.\n");

    tokio::select! {
        _ = pipeline.coordinator.run(source) => {
            info!("Inbox source closed");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C signal");
        }
    }

    println!("{}", "Stopped.".yellow());
    Ok(())
}
