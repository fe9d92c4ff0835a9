//! Initialize Pixsync.

use super::get_paths;
use anyhow::{Context, Result};
use colored::Colorize;
use pixsync_config::Config;
use pixsync_db::Database;
use pixsync_ingest::InboxScanner;

pub fn run() -> Result<()> {
    let paths = get_paths()?;

    if paths.is_initialized() {
        println!("{} Pixsync is already initialized.", "Note:".yellow().bold());
        println!("  Config: {}", paths.config_file.display());
        println!("  Database: {}", paths.database_file.display());
        return Ok(());
    }

    println!("{}", "Initializing Pixsync...".cyan().bold());

    paths.ensure_dirs().context("Failed to create directories")?;
    println!("  {} Created directories", "✓".green());

    Config::create_default_file(&paths.config_file).context("Failed to create config file")?;
    println!("  {} Created config: {}", "✓".green(), paths.config_file.display());

    let config = Config::load_from(&paths.config_file).context("Failed to load config")?;
    let database = config.database_path(&paths);
    let _db = Database::open(&database).context("Failed to initialize database")?;
    println!("  {} Created database: {}", "✓".green(), database.display());

    let scanner = InboxScanner::from_config(&config.inbox);
    scanner
        .ensure_dirs()
        .context("Failed to create inbox directories")?;
    for (channel, dir) in scanner.inboxes() {
        println!("  {} Inbox {}: {}", "✓".green(), channel, dir.display());
    }

    println!();
    println!("{}", "Pixsync initialized successfully!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Review config: {}", "pixsync config show".cyan());
    println!("  2. Start syncing: {}", "pixsync serve".cyan());
    println!("  3. Drop an image into an inbox and check: {}", "pixsync recent Original".cyan());

    Ok(())
}
