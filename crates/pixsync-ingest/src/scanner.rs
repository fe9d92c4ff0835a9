//! Inbox directory listing.

use glob::Pattern;
use pixsync_config::InboxConfig;
use pixsync_core::{Channel, WatchedFile};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Decides which inbox entries are ingestible.
#[derive(Debug, Clone, Default)]
pub struct InboxFilter {
    /// Lowercase extensions without the dot; empty accepts any.
    pub extensions: Vec<String>,
    pub ignore_patterns: Vec<Pattern>,
    /// Entries modified more recently than this are left for a later scan.
    pub min_age: Duration,
}

impl InboxFilter {
    pub fn from_config(config: &InboxConfig) -> Self {
        let ignore_patterns = config
            .ignore_patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("Skipping invalid ignore pattern {:?}: {}", p, e);
                    None
                }
            })
            .collect();

        Self {
            extensions: config.extensions.iter().map(|e| e.to_lowercase()).collect(),
            ignore_patterns,
            min_age: config.grace_period(),
        }
    }

    /// Name-based checks: hidden files, ignore patterns, extensions.
    pub fn accepts_name(&self, path: &Path) -> bool {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };

        // Hidden files include our own in-progress writes.
        if filename.starts_with('.') {
            return false;
        }

        if self.ignore_patterns.iter().any(|p| p.matches(filename)) {
            return false;
        }

        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
            .unwrap_or(false)
    }

    /// Whether the file has not been written to for at least `min_age`.
    pub fn is_settled(&self, path: &Path) -> bool {
        if self.min_age.is_zero() {
            return true;
        }
        let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };
        SystemTime::now()
            .duration_since(modified)
            .map(|age| age >= self.min_age)
            .unwrap_or(false)
    }
}

/// Lists the inbox directory of each enabled channel.
///
/// Anything still on disk in an inbox has not been durably ingested, so
/// re-running a scan after a crash re-discovers all unfinished work.
#[derive(Debug, Clone, Default)]
pub struct InboxScanner {
    inboxes: Vec<(Channel, PathBuf)>,
    filter: InboxFilter,
}

impl InboxScanner {
    pub fn new(filter: InboxFilter) -> Self {
        Self {
            inboxes: Vec::new(),
            filter,
        }
    }

    /// Watch `dir` as the inbox of `channel`.
    pub fn with_inbox(mut self, channel: Channel, dir: impl Into<PathBuf>) -> Self {
        self.inboxes.retain(|(c, _)| *c != channel);
        self.inboxes.push((channel, dir.into()));
        self
    }

    /// Scanner over `root/<Channel>` for every configured channel.
    pub fn from_config(config: &InboxConfig) -> Self {
        config
            .channels
            .iter()
            .fold(Self::new(InboxFilter::from_config(config)), |scanner, channel| {
                scanner.with_inbox(*channel, config.inbox_dir(*channel))
            })
    }

    pub fn inboxes(&self) -> &[(Channel, PathBuf)] {
        &self.inboxes
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.inboxes.iter().map(|(c, _)| *c)
    }

    pub fn inbox_dir(&self, channel: Channel) -> Option<&Path> {
        self.inboxes
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, dir)| dir.as_path())
    }

    pub fn filter(&self) -> &InboxFilter {
        &self.filter
    }

    /// Create every inbox directory that does not exist yet.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for (_, dir) in &self.inboxes {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Files currently waiting in a channel's inbox, in name order.
    ///
    /// The listing is lazy and only looks at the top level of the inbox.
    pub fn scan(&self, channel: Channel) -> impl Iterator<Item = WatchedFile> + '_ {
        self.inbox_dir(channel)
            .into_iter()
            .flat_map(|dir| {
                WalkDir::new(dir)
                    .min_depth(1)
                    .max_depth(1)
                    .sort_by_file_name()
                    .into_iter()
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable inbox entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter(move |entry| self.filter.accepts_name(entry.path()))
            .filter(move |entry| self.filter.is_settled(entry.path()))
            .map(move |entry| WatchedFile::new(entry.into_path(), channel))
    }

    /// One pass over every inbox.
    pub fn scan_all(&self) -> Vec<WatchedFile> {
        self.inboxes
            .iter()
            .flat_map(|(channel, _)| self.scan(*channel))
            .collect()
    }

    /// Resolve a path reported by the OS to a pending file, if it is one.
    ///
    /// The channel comes from the inbox directory containing the file.
    pub fn classify(&self, path: &Path) -> Option<WatchedFile> {
        let parent = path.parent()?;
        let channel = self.inboxes.iter().find_map(|(channel, dir)| {
            let same = parent == dir.as_path()
                || matches!(
                    (parent.canonicalize(), dir.canonicalize()),
                    (Ok(a), Ok(b)) if a == b
                );
            same.then_some(*channel)
        })?;

        if !path.is_file() || !self.filter.accepts_name(path) {
            return None;
        }
        Some(WatchedFile::new(path, channel))
    }
}
