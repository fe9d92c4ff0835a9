//! CLI command implementations.

pub mod config;
pub mod ingest;
pub mod init;
pub mod recent;
pub mod serve;
pub mod snapshot;
pub mod watch;

use anyhow::{Context, Result};
use pixsync_config::{AppPaths, Config, ScanMode};
use pixsync_core::Channel;
use pixsync_db::{Database, SqliteIndex};
use pixsync_ingest::{Coordinator, EventSource, InboxScanner, InboxSource, PollingSource};
use pixsync_storage::ObjectBlobStore;
use std::sync::Arc;

/// Get the application paths.
pub fn get_paths() -> Result<AppPaths> {
    AppPaths::new().context("Failed to determine application directories")
}

/// Load the config, ensuring pixsync is initialized.
pub fn load_config(paths: &AppPaths) -> Result<Config> {
    if !paths.is_initialized() {
        anyhow::bail!("Pixsync is not initialized. Run 'pixsync init' first.");
    }
    Config::load_from(&paths.config_file).context("Failed to load config")
}

/// Parse a channel argument.
pub fn parse_channel(name: &str) -> Result<Channel> {
    Channel::parse(name).with_context(|| {
        let valid: Vec<_> = Channel::ALL.iter().map(Channel::as_str).collect();
        format!("Unknown channel '{}'. Valid channels: {}", name, valid.join(", "))
    })
}

/// Everything a running pipeline needs, built from config.
pub struct Pipeline {
    pub config: Config,
    pub index: Arc<SqliteIndex>,
    pub store: Arc<ObjectBlobStore>,
    pub scanner: Arc<InboxScanner>,
    pub coordinator: Coordinator,
}

impl Pipeline {
    pub fn open() -> Result<Self> {
        let paths = get_paths()?;
        let config = load_config(&paths)?;

        let db = Database::open(config.database_path(&paths)).context("Failed to open database")?;
        let index = Arc::new(SqliteIndex::new(db));
        let store = Arc::new(
            ObjectBlobStore::from_config(&config.storage).context("Failed to set up blob store")?,
        );
        let scanner = Arc::new(InboxScanner::from_config(&config.inbox));
        scanner
            .ensure_dirs()
            .context("Failed to create inbox directories")?;
        let coordinator = Coordinator::from_config(&config, store.clone(), index.clone());

        Ok(Self {
            config,
            index,
            store,
            scanner,
            coordinator,
        })
    }

    /// Discovery strategy selected by `inbox.mode`.
    pub fn inbox_source(&self) -> Result<Box<dyn InboxSource>> {
        let source: Box<dyn InboxSource> = match self.config.inbox.mode {
            ScanMode::Polling => Box::new(PollingSource::new(
                self.scanner.clone(),
                self.config.inbox.poll_interval(),
            )),
            ScanMode::Event => Box::new(
                EventSource::new(self.scanner.clone(), self.config.inbox.grace_period())
                    .context("Failed to start file watcher")?,
            ),
        };
        Ok(source)
    }

    /// Print which inboxes are being watched.
    pub fn print_inboxes(&self) {
        use colored::Colorize;

        println!("Watching inboxes ({} mode):", self.config.inbox.mode);
        for (channel, dir) in self.scanner.inboxes() {
            println!("  {} {:<10} {}", "+".green(), channel.as_str(), dir.display());
        }
    }
}
