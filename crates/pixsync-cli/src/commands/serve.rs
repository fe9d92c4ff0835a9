//! Serve command - server, inbox pipeline, relay and snapshots in one process.

use super::Pipeline;
use anyhow::{Context, Result};
use colored::Colorize;
use pixsync_config::StorageBackend;
use pixsync_db::SnapshotStore;
use pixsync_notify::{spawn_relay, Notifier};
use pixsync_server::AppState;
use std::sync::Arc;
use tracing::info;

pub async fn run(bind: Option<String>) -> Result<()> {
    let pipeline = Pipeline::open()?;
    let config = &pipeline.config;
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());

    let notifier = Notifier::new();
    let relay = spawn_relay(pipeline.index.as_ref(), notifier.clone());

    let source = pipeline.inbox_source()?;
    let coordinator = pipeline.coordinator.clone();
    let ingest = tokio::spawn(async move { coordinator.run(source).await });

    let snapshots = config.snapshot.interval().map(|period| {
        SnapshotStore::new(config.snapshot.root_dir()).spawn_periodic(
            pipeline.index.clone(),
            config.inbox.channels.clone(),
            period,
        )
    });

    let mut state = AppState::new(
        pipeline.index.clone(),
        pipeline.store.clone(),
        pipeline.coordinator.clone(),
        notifier,
    )
    .with_subscriber_buffer(config.notifier.subscriber_buffer);
    if pipeline.store.backend() == StorageBackend::Local {
        state = state.with_static_dir(config.storage.root_dir());
    }
    let app = pixsync_server::router(Arc::new(state), config.server.max_upload_bytes);

    println!("{} http://{}", "Serving on".cyan().bold(), bind);
    pipeline.print_inboxes();
    println!("\nPress Ctrl+C to stop.\n");

    pixsync_server::serve(&bind, app, shutdown_signal())
        .await
        .context("Server failed")?;

    ingest.abort();
    relay.abort();
    if let Some(handle) = snapshots {
        handle.abort();
    }

    println!("{}", "Stopped.".yellow());
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl+C signal");
    } else {
        // No signal handler; run until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("Shutting down gracefully...");
}
