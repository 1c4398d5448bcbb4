use std::path::{Component, Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use notify::RecursiveMode;
use notify_debouncer_mini::{new_debouncer, DebouncedEvent, Debouncer};

use super::walker::FileWalker;
use crate::error::{Result, TagrefError};

const DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, PartialEq, Eq)]
pub enum WatchEvent {
    /// Files under a watched root changed.
    Changed(Vec<PathBuf>),
    /// The poll interval elapsed without relevant changes.
    Elapsed,
}

/// Watches source roots for changes that call for a rebuild.
///
/// Hidden paths, paths matched by the scanner ignore globs and the excluded
/// paths (the index file itself) are not reported.
pub struct FileWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    receiver: Receiver<std::result::Result<Vec<DebouncedEvent>, notify::Error>>,
    roots: Vec<PathBuf>,
    walker: FileWalker,
    exclude: Vec<PathBuf>,
}

/// Canonical form of `path`, resolving the nearest existing ancestor when the
/// path itself is gone.
fn canonical(path: &Path) -> PathBuf {
    if let Ok(p) = path.canonicalize() {
        return p;
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => canonical(parent).join(name),
        _ => path.to_path_buf(),
    }
}

impl FileWatcher {
    pub fn new<P: AsRef<Path>>(roots: &[P], ignore: &[String], exclude: &[PathBuf]) -> Result<Self> {
        let (tx, rx) = channel();

        let mut debouncer =
            new_debouncer(DEBOUNCE, tx).map_err(|e| TagrefError::Watcher(e.to_string()))?;

        let mut canonical_roots = Vec::new();
        for root in roots {
            let root = root.as_ref();
            debouncer
                .watcher()
                .watch(root, RecursiveMode::Recursive)
                .map_err(|e| TagrefError::Watcher(format!("{}: {}", root.display(), e)))?;
            canonical_roots.push(canonical(root));
        }

        Ok(Self {
            _debouncer: debouncer,
            receiver: rx,
            roots: canonical_roots,
            walker: FileWalker::new(ignore)?,
            exclude: exclude.iter().map(|p| canonical(p)).collect(),
        })
    }

    /// True if a change at `path` may affect the index.
    pub fn is_relevant(&self, path: &Path) -> bool {
        let path = canonical(path);

        if self.exclude.iter().any(|e| *e == path) {
            return false;
        }

        let Some(rel) = self.roots.iter().find_map(|r| path.strip_prefix(r).ok()) else {
            return false;
        };

        let hidden = rel.components().any(|c| match c {
            Component::Normal(s) => s.to_string_lossy().starts_with('.'),
            _ => false,
        });

        !hidden && !self.walker.is_ignored(rel, path.is_dir())
    }

    /// Blocks until a relevant change arrives or `timeout` elapses.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<WatchEvent> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let received = match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    match self.receiver.recv_timeout(left) {
                        Ok(r) => r,
                        Err(RecvTimeoutError::Timeout) => return Ok(WatchEvent::Elapsed),
                        Err(RecvTimeoutError::Disconnected) => {
                            return Err(TagrefError::Watcher("watcher closed".to_string()))
                        }
                    }
                }
                None => self
                    .receiver
                    .recv()
                    .map_err(|_| TagrefError::Watcher("watcher closed".to_string()))?,
            };

            let events = received.map_err(|e| TagrefError::Watcher(e.to_string()))?;

            let changed: Vec<PathBuf> = events
                .into_iter()
                .map(|e| e.path)
                .filter(|p| self.is_relevant(p))
                .collect();

            if !changed.is_empty() {
                tracing::info!(files = changed.len(), "files changed");
                return Ok(WatchEvent::Changed(changed));
            }
        }
    }
}
