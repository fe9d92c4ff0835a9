//! Configuration commands.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use pixsync_config::{Config, ScanMode};

pub fn show() -> Result<()> {
    let paths = get_paths()?;

    if !paths.config_file.exists() {
        anyhow::bail!("Config file not found. Run 'pixsync init' first.");
    }

    let contents =
        std::fs::read_to_string(&paths.config_file).context("Failed to read config file")?;

    println!("{}", "Current Configuration".cyan().bold());
    println!("{}", "─".repeat(50));
    println!("{}", contents);

    Ok(())
}

pub fn path() -> Result<()> {
    let paths = get_paths()?;
    println!("{}", paths.config_file.display());
    Ok(())
}

pub fn set_mode(mode: &str) -> Result<()> {
    let mode = match mode {
        "polling" => ScanMode::Polling,
        "event" => ScanMode::Event,
        other => anyhow::bail!("Unknown mode '{}'. Use 'polling' or 'event'.", other),
    };

    let paths = get_paths()?;
    let mut config = Config::load_from(&paths.config_file).context("Failed to load config")?;
    config.inbox.mode = mode;
    config
        .save_to(&paths.config_file)
        .context("Failed to save config")?;

    println!("{} Set {} = {}", "✓".green(), "inbox.mode".cyan(), mode);

    Ok(())
}
