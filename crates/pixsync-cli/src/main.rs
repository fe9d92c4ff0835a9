//! Pixsync CLI - Inbox folders to object storage, indexed and pushed live.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Pixsync - Watch, upload, index and notify
#[derive(Parser)]
#[command(name = "pixsync")]
#[command(version)]
#[command(about = "Sync image inboxes to object storage with live change feeds", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Pixsync (create config, database and inboxes)
    Init,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Run the HTTP/WebSocket server together with the inbox pipeline
    Serve {
        /// Address to bind (default: from config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Watch the inboxes and ingest new files (no server)
    Watch,

    /// Ingest a single file
    Ingest {
        /// Path to the file
        path: PathBuf,

        /// Channel to ingest into (Original, AIService, Photobooth)
        #[arg(short, long)]
        channel: String,

        /// Leave the source file in place
        #[arg(short, long)]
        keep: bool,
    },

    /// List the newest records of a channel
    Recent {
        channel: String,

        /// Maximum number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Write channel snapshots to the snapshot directory
    Export {
        /// Channel to export
        #[arg(required_unless_present = "all")]
        channel: Option<String>,

        /// Export every channel
        #[arg(long, conflicts_with = "channel")]
        all: bool,
    },

    /// Load channel snapshots back into the index
    Import {
        /// Channel to import
        #[arg(required_unless_present = "all")]
        channel: Option<String>,

        /// Import every channel that has a snapshot
        #[arg(long, conflicts_with = "channel")]
        all: bool,

        /// Read this file instead of the channel's default snapshot
        #[arg(short, long, conflicts_with = "all")]
        file: Option<PathBuf>,

        /// Also upload images from <DIR>/<Channel>/ into the blob store
        #[arg(long, value_name = "DIR")]
        with_blobs: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Print the config file location
    Path,

    /// Switch between polling and filesystem events
    SetMode {
        /// polling or event
        mode: String,
    },
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pixsync=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pixsync=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init => commands::init::run(),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::show(),
            ConfigCommands::Path => commands::config::path(),
            ConfigCommands::SetMode { mode } => commands::config::set_mode(&mode),
        },
        Commands::Serve { bind } => commands::serve::run(bind).await,
        Commands::Watch => commands::watch::run().await,
        Commands::Ingest {
            path,
            channel,
            keep,
        } => commands::ingest::run(&path, &channel, keep).await,
        Commands::Recent { channel, limit } => commands::recent::run(&channel, limit).await,
        Commands::Export { channel, all } => commands::snapshot::export(channel, all).await,
        Commands::Import {
            channel,
            all,
            file,
            with_blobs,
        } => commands::snapshot::import(channel, all, file, with_blobs).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
