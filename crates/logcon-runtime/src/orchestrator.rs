//! Async monitoring orchestrator.
//!
//! Periodically snapshots the [`LogStore`], aggregates it and sends a
//! [`MonitoringSnapshot`] through an `mpsc` channel, so the consumer never
//! touches the store directly.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time;

use logcon_core::data_processors::TimestampProcessor;
use logcon_data::aggregator::{LogAggregator, LogStats, Report, TimelineBucket};

use crate::store::LogStore;

// ── Public types ──────────────────────────────────────────────────────────────

/// One monitoring refresh.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoringSnapshot {
    pub stats: Report<LogStats>,
    pub timeline: Report<Vec<TimelineBucket>>,
    /// Records in the store when the snapshot was taken.
    pub total_count: usize,
    pub storage_type: &'static str,
    pub generated_at: String,
}

impl MonitoringSnapshot {
    /// Aggregate the current contents of `store` as of `now`.
    pub fn collect(store: &LogStore, window_minutes: u32, now: DateTime<Utc>) -> Self {
        let records = store.snapshot();
        Self {
            stats: LogAggregator::aggregate_stats_at(&records, now),
            timeline: LogAggregator::aggregate_timeline_at(&records, window_minutes, now),
            total_count: records.len(),
            storage_type: store.storage_type(),
            generated_at: TimestampProcessor::format(now),
        }
    }
}

// ── MonitoringOrchestrator ────────────────────────────────────────────────────

/// Background monitoring coordinator.
///
/// Call [`MonitoringOrchestrator::start`] to run the loop in a tokio task and
/// receive the channel end for [`MonitoringSnapshot`] updates.
pub struct MonitoringOrchestrator {
    update_interval: Duration,
    /// Trailing timeline window in minutes.
    window_minutes: u32,
    store: Arc<LogStore>,
}

impl MonitoringOrchestrator {
    pub fn new(update_interval_secs: u64, window_minutes: u32, store: Arc<LogStore>) -> Self {
        Self {
            update_interval: Duration::from_secs(update_interval_secs),
            window_minutes,
            store,
        }
    }

    /// Spawn the monitoring loop.
    pub fn start(self) -> (mpsc::Receiver<MonitoringSnapshot>, MonitoringHandle) {
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(async move {
            self.monitoring_loop(tx).await;
        });

        (rx, MonitoringHandle { handle })
    }

    // ── Private implementation ────────────────────────────────────────────

    /// Sends one snapshot immediately, then one per `update_interval`. Exits
    /// once the receiver is dropped.
    async fn monitoring_loop(self, tx: mpsc::Sender<MonitoringSnapshot>) {
        if !self.collect_and_send(&tx).await {
            return;
        }

        let mut interval = time::interval(self.update_interval);
        // The first tick fires immediately.
        interval.tick().await;

        loop {
            interval.tick().await;

            if tx.is_closed() {
                tracing::debug!("monitoring channel closed; exiting loop");
                break;
            }

            if !self.collect_and_send(&tx).await {
                break;
            }
        }
    }

    /// Returns `false` when the receiver is gone.
    async fn collect_and_send(&self, tx: &mpsc::Sender<MonitoringSnapshot>) -> bool {
        let store = Arc::clone(&self.store);
        let window = self.window_minutes;
        let collected = tokio::task::spawn_blocking(move || {
            MonitoringSnapshot::collect(&store, window, Utc::now())
        })
        .await;

        let snapshot = match collected {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "aggregation task failed; skipping send");
                return true;
            }
        };

        if let Err(e) = tx.send(snapshot).await {
            tracing::warn!(error = %e, "failed to send monitoring snapshot; receiver dropped");
            return false;
        }
        true
    }
}

// ── MonitoringHandle ──────────────────────────────────────────────────────────

/// Handle to the background monitoring task.
pub struct MonitoringHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl MonitoringHandle {
    /// Immediately abort the monitoring loop.
    pub fn abort(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StorageConfig;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use logcon_core::models::{LogRecord, Severity};
    use serde_json::json;
    use tempfile::TempDir;

    // ── helpers ───────────────────────────────────────────────────────────

    fn ram_store(dir: &TempDir) -> Arc<LogStore> {
        Arc::new(
            LogStore::new(StorageConfig {
                enable_ram: true,
                enable_file: false,
                max_ram_logs: 100,
                logs_dir: dir.path().to_path_buf(),
            })
            .unwrap(),
        )
    }

    fn record_at(ts: DateTime<Utc>, severity: Severity) -> LogRecord {
        LogRecord::new(ts, ts, "event", severity).with_attribute("source", json!("log-synthesis"))
    }

    // ── orchestrator creation ─────────────────────────────────────────────

    #[test]
    fn test_orchestrator_creation() {
        let dir = TempDir::new().unwrap();
        let orch = MonitoringOrchestrator::new(5, 30, ram_store(&dir));
        assert_eq!(orch.update_interval, Duration::from_secs(5));
        assert_eq!(orch.window_minutes, 30);
    }

    // ── MonitoringSnapshot::collect ───────────────────────────────────────

    #[test]
    fn test_collect_empty_store() {
        let dir = TempDir::new().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 12, 0, 0).unwrap();
        let snapshot = MonitoringSnapshot::collect(&ram_store(&dir), 60, now);

        assert!(snapshot.stats.is_empty());
        assert!(snapshot.timeline.is_empty());
        assert_eq!(snapshot.total_count, 0);
        assert_eq!(snapshot.storage_type, "ram");
        assert_eq!(snapshot.generated_at, "2025-01-02T12:00:00Z");
    }

    #[test]
    fn test_collect_aggregates_store_contents() {
        let dir = TempDir::new().unwrap();
        let store = ram_store(&dir);
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 12, 0, 0).unwrap();
        store.store_batch(&[
            record_at(now - ChronoDuration::minutes(2), Severity::Info),
            record_at(now - ChronoDuration::minutes(1), Severity::Error),
        ]);

        let snapshot = MonitoringSnapshot::collect(&store, 5, now);
        assert_eq!(snapshot.total_count, 2);

        let stats = snapshot.stats.ready().unwrap();
        assert_eq!(stats.summary.total_logs, 2);

        let timeline = snapshot.timeline.ready().unwrap();
        assert_eq!(timeline.len(), 5);
        let counted: usize = timeline.iter().map(|b| b.count).sum();
        assert_eq!(counted, 2);
    }

    #[test]
    fn test_snapshot_serializes_sentinels() {
        let dir = TempDir::new().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 2, 12, 0, 0).unwrap();
        let value =
            serde_json::to_value(MonitoringSnapshot::collect(&ram_store(&dir), 60, now)).unwrap();
        assert!(value["stats"]["message"].is_string());
        assert_eq!(value["storage_type"], json!("ram"));
    }

    // ── async: start / abort ──────────────────────────────────────────────

    #[tokio::test]
    async fn test_orchestrator_start_and_abort() {
        let dir = TempDir::new().unwrap();
        let orch = MonitoringOrchestrator::new(60, 60, ram_store(&dir));
        let (_rx, handle) = orch.start();

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
    }

    #[tokio::test]
    async fn test_orchestrator_sends_initial_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = ram_store(&dir);
        store.store_batch(&[record_at(Utc::now(), Severity::Warn)]);

        let orch = MonitoringOrchestrator::new(60, 60, Arc::clone(&store));
        let (mut rx, handle) = orch.start();

        let snapshot = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for snapshot")
            .expect("channel closed before receiving snapshot");

        assert_eq!(snapshot.total_count, 1);
        assert!(!snapshot.stats.is_empty());

        handle.abort();
    }

    #[tokio::test]
    async fn test_orchestrator_exits_when_receiver_dropped() {
        let dir = TempDir::new().unwrap();
        let orch = MonitoringOrchestrator::new(1, 60, ram_store(&dir));
        let (rx, handle) = orch.start();
        drop(rx);

        tokio::time::timeout(Duration::from_secs(5), async {
            while !handle.is_finished() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("monitoring loop did not exit");
    }
}
