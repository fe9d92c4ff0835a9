//! Set of files currently moving through the pipeline.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Paths dispatched to the coordinator and not yet finished.
///
/// A path can only be claimed once at a time; the claim is released when
/// its [`InFlightGuard`] drops, whether the file succeeded or failed.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        // Only inserts and removes happen under the lock, so a poisoned set is still consistent.
        self.paths.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim `path`, or `None` if it is already in flight.
    pub fn claim(&self, path: &Path) -> Option<InFlightGuard> {
        if self.lock().insert(path.to_path_buf()) {
            Some(InFlightGuard {
                set: self.clone(),
                path: path.to_path_buf(),
            })
        } else {
            None
        }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Releases its path from the [`InFlight`] set on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    set: InFlight,
    path: PathBuf,
}

impl InFlightGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.path);
    }
}
