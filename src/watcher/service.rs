//! Top-level tailing service.
//!
//! Runs the periodic watch-set refresh and position flush, and performs the
//! final flush on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::error::WatcherError;
use super::sink::RecordSink;
use super::watch_set::{WatchOptions, WatchSetManager};
use crate::position::PositionStore;

/// Settings for a [`TailService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Watch-set and per-file settings.
    pub watch: WatchOptions,
    /// How often the patterns are re-resolved.
    pub refresh_interval: Duration,
    /// How often the position file is checked and rewritten.
    pub flush_interval: Duration,
}

/// Follows every matching log file until shut down.
pub struct TailService {
    manager: Arc<WatchSetManager>,
    store: Arc<PositionStore>,
    refresh_interval: Duration,
    flush_interval: Duration,
}

impl TailService {
    /// Create a service. Nothing runs until [`run`](Self::run) is called.
    #[must_use]
    pub fn new(
        options: ServiceOptions,
        store: Arc<PositionStore>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        let manager = WatchSetManager::new(options.watch, Arc::clone(&store), sink);
        Self {
            manager: Arc::new(manager),
            store,
            refresh_interval: options.refresh_interval,
            flush_interval: options.flush_interval,
        }
    }

    /// The watch-set manager driven by this service.
    #[must_use]
    pub fn manager(&self) -> &Arc<WatchSetManager> {
        &self.manager
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// The first refresh happens immediately. On shutdown the refresh and
    /// flush tasks are cancelled, every follower is stopped with its
    /// position kept, and the store is flushed once regardless of whether
    /// anything changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails or its task panics.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), WatcherError> {
        let tasks = shutdown.child_token();
        let refresh = tokio::spawn(refresh_loop(
            Arc::clone(&self.manager),
            self.refresh_interval,
            tasks.clone(),
        ));
        let flush = tokio::spawn(flush_loop(
            Arc::clone(&self.store),
            self.flush_interval,
            tasks.clone(),
        ));

        shutdown.cancelled().await;
        tracing::info!("Shutting down");

        tasks.cancel();
        for (name, task) in [("refresh", refresh), ("flush", flush)] {
            if let Err(e) = task.await {
                tracing::warn!(task = name, error = %e, "Periodic task failed");
            }
        }

        self.manager.shutdown().await;
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.flush()).await??;
        Ok(())
    }
}

async fn refresh_loop(
    manager: Arc<WatchSetManager>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let summary = manager.refresh().await;
        if !summary.is_empty() {
            tracing::info!(
                started = summary.started.len(),
                stopped = summary.stopped.len(),
                watched = manager.len(),
                "Refreshed watched files"
            );
        }
    }
}

async fn flush_loop(store: Arc<PositionStore>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let task_store = Arc::clone(&store);
        match tokio::task::spawn_blocking(move || task_store.flush_if_dirty()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Failed to write position file"),
            Err(e) => tracing::warn!(error = %e, "Position flush task failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::{ChannelSink, FollowerOptions};
    use std::fs;
    use tempfile::TempDir;

    fn options(patterns: String) -> ServiceOptions {
        ServiceOptions {
            watch: WatchOptions {
                patterns,
                tag: "iis".to_string(),
                follower: FollowerOptions {
                    read_interval: Duration::from_millis(10),
                    ..FollowerOptions::default()
                },
            },
            refresh_interval: Duration::from_millis(20),
            flush_interval: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_run_reads_and_flushes_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("iis.log");
        fs::write(&log, "#Fields: date time\n2017-03-05 17:18:49\n").unwrap();
        let pos_file = dir.path().join("iis.pos");

        let store = Arc::new(PositionStore::open(&pos_file).unwrap());
        let (sink, mut rx) = ChannelSink::new();
        let service = Arc::new(TailService::new(
            options(format!("{}/*.log", dir.path().display())),
            store,
            Arc::new(sink),
        ));

        let shutdown = CancellationToken::new();
        let runner = {
            let service = Arc::clone(&service);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { service.run(shutdown).await })
        };

        let batch = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch.records.len(), 2);

        shutdown.cancel();
        runner.await.unwrap().unwrap();

        assert!(service.manager().is_empty());
        let content = fs::read_to_string(&pos_file).unwrap();
        assert_eq!(content, format!("{} 0 39\n", log.display()));
    }
}
