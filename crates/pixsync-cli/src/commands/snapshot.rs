//! Export and import commands.

use super::{parse_channel, Pipeline};
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use pixsync_core::Channel;
use pixsync_db::SnapshotStore;
use pixsync_storage::BlobStore;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

fn selected_channels(pipeline: &Pipeline, channel: Option<String>, all: bool) -> Result<Vec<Channel>> {
    match (channel, all) {
        (Some(name), _) => Ok(vec![parse_channel(&name)?]),
        (None, true) => Ok(pipeline.config.inbox.channels.clone()),
        (None, false) => anyhow::bail!("Name a channel or pass --all"),
    }
}

pub async fn export(channel: Option<String>, all: bool) -> Result<()> {
    let pipeline = Pipeline::open()?;
    let snapshots = SnapshotStore::new(pipeline.config.snapshot.root_dir());

    for channel in selected_channels(&pipeline, channel, all)? {
        let summary = snapshots
            .export(pipeline.index.as_ref(), channel)
            .await
            .with_context(|| format!("Failed to export {}", channel))?;
        println!(
            "{} {} records of {} to {}",
            "✓".green(),
            summary.records,
            channel,
            summary.path.display()
        );
    }

    Ok(())
}

pub async fn import(
    channel: Option<String>,
    all: bool,
    file: Option<PathBuf>,
    with_blobs: Option<PathBuf>,
) -> Result<()> {
    let pipeline = Pipeline::open()?;
    let snapshots = SnapshotStore::new(pipeline.config.snapshot.root_dir());

    for channel in selected_channels(&pipeline, channel, all)? {
        let path = file.clone().unwrap_or_else(|| snapshots.path_for(channel));
        if all && !path.exists() {
            println!("{} No snapshot for {}", "-".dimmed(), channel);
        } else {
            let summary = snapshots
                .import(pipeline.index.as_ref(), channel, Some(&path))
                .await
                .with_context(|| format!("Failed to import {}", channel))?;
            println!(
                "{} {} records into {} from {}",
                "✓".green(),
                summary.records,
                channel,
                summary.path.display()
            );
        }

        if let Some(dir) = &with_blobs {
            restore_blobs(pipeline.store.as_ref(), channel, dir).await?;
        }
    }

    Ok(())
}

/// Upload every file under `<dir>/<Channel>/` to the channel's prefix.
async fn restore_blobs(store: &dyn BlobStore, channel: Channel, dir: &Path) -> Result<()> {
    let source = dir.join(channel.as_str());
    if !source.is_dir() {
        println!("{} No image folder for {} in {}", "-".dimmed(), channel, dir.display());
        return Ok(());
    }

    let files: Vec<PathBuf> = WalkDir::new(&source)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut failed = 0;
    for path in &files {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            failed += 1;
            pb.inc(1);
            continue;
        };
        pb.set_message(name.to_string());
        if let Err(e) = store.put_file(path, channel, name).await {
            pb.println(format!("{} {}: {}", "Failed:".red(), path.display(), e));
            failed += 1;
        }
        pb.inc(1);
    }

    pb.finish_with_message(format!(
        "{} {} blobs restored to {}",
        "✓".green(),
        files.len() - failed,
        channel
    ));

    Ok(())
}
