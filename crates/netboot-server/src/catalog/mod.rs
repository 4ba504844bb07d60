// SPDX-License-Identifier: Apache-2.0

//! Live distribution catalog.
//!
//! The catalog owns the current snapshot and republishes it to watchers after
//! every successful scan. Scans are serialized, so watchers observe snapshots
//! in scan order. A watcher that falls behind only ever sees the newest
//! snapshot; publishing never waits on a watcher.

pub mod scan;
pub mod scheduler;

pub use scan::{reconcile_defaults, scan_distributions, ScanError, SoftFailure};
pub use scheduler::{spawn_refresh_scheduler, RescanTrigger};

use crate::store::DistroStore;
use crate::telemetry::ScanMetrics;
use netboot_model::BootEntry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tracing::{error, info, warn};

pub type Snapshot = Arc<Vec<BootEntry>>;
pub type SnapshotReceiver = watch::Receiver<Snapshot>;

pub struct Catalog {
    store: Arc<dyn DistroStore>,
    metrics: Arc<ScanMetrics>,
    current: RwLock<Snapshot>,
    watchers: watch::Sender<Snapshot>,
    fatal_errors: mpsc::Sender<ScanError>,
    scan_lock: Mutex<()>,
}

impl Catalog {
    /// Builds the catalog and runs the first scan. A failed first scan is
    /// returned to the caller and is not forwarded to `fatal_errors`.
    pub async fn load(
        store: Arc<dyn DistroStore>,
        metrics: Arc<ScanMetrics>,
        fatal_errors: mpsc::Sender<ScanError>,
    ) -> Result<Arc<Self>, ScanError> {
        let initial = run_scan(Arc::clone(&store), Arc::clone(&metrics)).await?;
        let snapshot: Snapshot = Arc::new(initial);
        record_success(&metrics, &snapshot);
        info!(
            backend = store.backend_tag(),
            entries = snapshot.len(),
            "distribution catalog loaded"
        );
        let (watchers, _) = watch::channel(Arc::clone(&snapshot));
        Ok(Arc::new(Self {
            store,
            metrics,
            current: RwLock::new(snapshot),
            watchers,
            fatal_errors,
            scan_lock: Mutex::new(()),
        }))
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<ScanMetrics> {
        &self.metrics
    }

    pub async fn current_snapshot(&self) -> Snapshot {
        Arc::clone(&*self.current.read().await)
    }

    /// Receiver whose first `changed()` resolves immediately with the
    /// current snapshot.
    #[must_use]
    pub fn register_watcher(&self) -> SnapshotReceiver {
        let mut rx = self.watchers.subscribe();
        rx.mark_changed();
        rx
    }

    /// Rescans the store. On success the new snapshot becomes current and is
    /// published; on failure the previous snapshot is kept and the error is
    /// also offered to the fatal error channel.
    pub async fn trigger_scan(&self) -> Result<Snapshot, ScanError> {
        let _serialized = self.scan_lock.lock().await;
        match run_scan(Arc::clone(&self.store), Arc::clone(&self.metrics)).await {
            Ok(entries) => {
                let snapshot: Snapshot = Arc::new(entries);
                {
                    let mut current = self.current.write().await;
                    *current = Arc::clone(&snapshot);
                }
                self.watchers.send_replace(Arc::clone(&snapshot));
                record_success(&self.metrics, &snapshot);
                info!(
                    entries = snapshot.len(),
                    watchers = self.watchers.receiver_count(),
                    "distribution catalog refreshed"
                );
                Ok(snapshot)
            }
            Err(err) => {
                self.forward_fatal(err.clone());
                Err(err)
            }
        }
    }

    fn forward_fatal(&self, err: ScanError) {
        match self.fatal_errors.try_send(err) {
            Ok(()) => {}
            Err(TrySendError::Full(err)) => {
                self.metrics
                    .fatal_errors_dropped
                    .fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "fatal error channel full; dropping error");
            }
            Err(TrySendError::Closed(err)) => {
                self.metrics
                    .fatal_errors_dropped
                    .fetch_add(1, Ordering::Relaxed);
                warn!(error = %err, "fatal error channel closed; dropping error");
            }
        }
    }
}

fn record_success(metrics: &ScanMetrics, snapshot: &Snapshot) {
    metrics.scan_count.fetch_add(1, Ordering::Relaxed);
    metrics
        .scan_distro_success
        .store(snapshot.len() as u64, Ordering::Relaxed);
}

// Directory listing is blocking I/O.
async fn run_scan(
    store: Arc<dyn DistroStore>,
    metrics: Arc<ScanMetrics>,
) -> Result<Vec<BootEntry>, ScanError> {
    let task_metrics = Arc::clone(&metrics);
    match tokio::task::spawn_blocking(move || scan_distributions(store.as_ref(), &task_metrics))
        .await
    {
        Ok(result) => result,
        Err(join_err) => {
            let err = ScanError::ScanTaskFailed {
                message: join_err.to_string(),
            };
            metrics.record_hard_failure(err.reason());
            error!(reason = err.reason(), error = %err, "distribution scan aborted");
            Err(err)
        }
    }
}
