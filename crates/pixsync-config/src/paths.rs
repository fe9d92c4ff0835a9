//! Where pixsync keeps its config file and index database.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Overrides the platform directories with a single root.
pub const HOME_ENV: &str = "PIXSYNC_HOME";

/// Config and data locations of one pixsync installation.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    pub database_file: PathBuf,
}

impl AppPaths {
    /// `$PIXSYNC_HOME` when set, the platform directories otherwise.
    pub fn new() -> Option<Self> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|h| !h.is_empty()) {
            return Some(Self::under(PathBuf::from(home)));
        }

        let dirs = ProjectDirs::from("com", "pixsync", "pixsync")?;
        Some(Self::with_dirs(
            dirs.config_dir().to_path_buf(),
            dirs.data_dir().to_path_buf(),
        ))
    }

    /// Everything below one directory: `config.toml` and `data/index.db`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::with_dirs(root.to_path_buf(), root.join("data"))
    }

    fn with_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_file: config_dir.join("config.toml"),
            database_file: data_dir.join("index.db"),
            config_dir,
            data_dir,
        }
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)
    }

    /// A config file exists, so `pixsync init` has run.
    pub fn is_initialized(&self) -> bool {
        self.config_file.is_file()
    }
}

/// Expand a leading `~` in a configured path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}
