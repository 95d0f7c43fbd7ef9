//! The set of currently followed files.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::future::join_all;

use super::discovery::resolve_patterns;
use super::follower::{FileFollower, FollowerHandle, FollowerOptions};
use super::sink::RecordSink;
use crate::position::PositionStore;

/// What to watch and how to read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Comma-separated glob patterns.
    pub patterns: String,
    /// Tag attached to every batch.
    pub tag: String,
    /// Per-file read settings.
    pub follower: FollowerOptions,
}

/// Files started and stopped by one [`WatchSetManager::refresh`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Newly followed files.
    pub started: Vec<PathBuf>,
    /// Files that stopped matching and were dropped.
    pub stopped: Vec<PathBuf>,
}

impl RefreshSummary {
    /// Whether the refresh changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty()
    }
}

/// Keeps one follower running for every file matched by the patterns.
pub struct WatchSetManager {
    options: WatchOptions,
    store: Arc<PositionStore>,
    sink: Arc<dyn RecordSink>,
    followers: Mutex<HashMap<PathBuf, FollowerHandle>>,
}

impl WatchSetManager {
    /// Create a manager with nothing watched yet.
    #[must_use]
    pub fn new(
        options: WatchOptions,
        store: Arc<PositionStore>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            options,
            store,
            sink,
            followers: Mutex::new(HashMap::new()),
        }
    }

    /// Re-resolve the patterns and start or stop followers to match.
    ///
    /// Pattern expansion runs on the blocking pool. Files that disappeared
    /// lose their stored position.
    pub async fn refresh(&self) -> RefreshSummary {
        let patterns = self.options.patterns.clone();
        match tokio::task::spawn_blocking(move || resolve_patterns(&patterns)).await {
            Ok(matched) => self.apply(matched),
            Err(e) => {
                tracing::warn!(error = %e, "Pattern resolution failed");
                RefreshSummary::default()
            }
        }
    }

    fn apply(&self, matched: BTreeSet<PathBuf>) -> RefreshSummary {
        let mut followers = self.followers();

        let stopped: Vec<PathBuf> = followers
            .keys()
            .filter(|path| !matched.contains(*path))
            .cloned()
            .collect();
        for path in &stopped {
            if let Some(handle) = followers.remove(path) {
                handle.cancel();
            }
            self.store.remove(path);
            tracing::info!(path = %path.display(), "Stopped watching file");
        }

        let started: Vec<PathBuf> = matched
            .into_iter()
            .filter(|path| !followers.contains_key(path))
            .collect();
        for path in &started {
            let position = self.store.get(path);
            tracing::info!(
                path = %path.display(),
                offset = position.read_offset(),
                "Started watching file"
            );
            let follower =
                FileFollower::new(position, Arc::clone(&self.store), self.options.follower);
            let handle = follower.spawn(self.options.tag.clone(), Arc::clone(&self.sink));
            followers.insert(path.clone(), handle);
        }

        RefreshSummary { started, stopped }
    }

    /// Paths currently followed, sorted.
    #[must_use]
    pub fn watched(&self) -> BTreeSet<PathBuf> {
        self.followers().keys().cloned().collect()
    }

    /// Number of followed files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.followers().len()
    }

    /// Whether no files are followed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.followers().is_empty()
    }

    /// Stop every follower and wait for them to finish.
    ///
    /// Stored positions are kept so reading resumes after a restart.
    pub async fn shutdown(&self) {
        let handles: Vec<FollowerHandle> = self.followers().drain().map(|(_, h)| h).collect();
        let count = handles.len();
        join_all(handles.into_iter().map(FollowerHandle::stop)).await;
        tracing::debug!(count, "Stopped all followers");
    }

    fn followers(&self) -> MutexGuard<'_, HashMap<PathBuf, FollowerHandle>> {
        self.followers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
