// SPDX-License-Identifier: Apache-2.0

use super::Catalog;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Operator request for an out-of-band rescan. Requests made while a scan
/// runs coalesce into one follow-up scan.
#[derive(Debug, Clone, Default)]
pub struct RescanTrigger(Arc<Notify>);

impl RescanTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.notify_one();
    }

    async fn requested(&self) {
        self.0.notified().await;
    }
}

pub fn spawn_refresh_scheduler(
    catalog: Arc<Catalog>,
    interval: Duration,
    trigger: RescanTrigger,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = interval.as_millis() as u64, "distribution scanner started");
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("distribution scanner stopped");
                    return;
                }
                () = trigger.requested() => {
                    catalog.metrics().scan_trigger_count.fetch_add(1, Ordering::Relaxed);
                    info!("rescan requested");
                }
                _ = ticker.tick() => {
                    catalog.metrics().scan_timer_count.fetch_add(1, Ordering::Relaxed);
                    debug!("periodic rescan");
                }
            }
            if let Err(err) = catalog.trigger_scan().await {
                warn!(error = %err, "rescan failed; keeping previous snapshot");
            }
        }
    })
}

/// Turns `SIGHUP` into rescan requests until shutdown.
#[cfg(unix)]
pub fn spawn_hangup_listener(
    trigger: RescanTrigger,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    use tokio::signal::unix::{signal, SignalKind};
    tokio::spawn(async move {
        let mut hangups = match signal(SignalKind::hangup()) {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGHUP; signal rescans disabled");
                return;
            }
        };
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => return,
                received = hangups.recv() => {
                    if received.is_none() {
                        return;
                    }
                    info!("SIGHUP received");
                    trigger.request();
                }
            }
        }
    })
}
