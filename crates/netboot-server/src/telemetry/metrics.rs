// SPDX-License-Identifier: Apache-2.0

//! Counters injected into the catalog and the HTTP layer, rendered as
//! Prometheus text.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub const METRIC_SUBSYSTEM: &str = "netboot";
pub const METRIC_VERSION: &str = env!("CARGO_PKG_VERSION");

const LATENCY_BOUNDS_SECONDS: [f64; 7] = [0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];
const LATENCY_SAMPLE_WINDOW: usize = 1024;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn base_labels() -> String {
    format!("subsystem=\"{METRIC_SUBSYSTEM}\",version=\"{METRIC_VERSION}\"")
}

#[derive(Default)]
pub struct ScanMetrics {
    pub scan_count: AtomicU64,
    pub scan_timer_count: AtomicU64,
    pub scan_trigger_count: AtomicU64,
    pub scan_distro_success: AtomicU64,
    pub fatal_errors_dropped: AtomicU64,
    soft_failures: Mutex<BTreeMap<&'static str, u64>>,
    hard_failures: Mutex<BTreeMap<&'static str, u64>>,
}

impl ScanMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_soft_failure(&self, reason: &'static str) {
        *lock(&self.soft_failures).entry(reason).or_insert(0) += 1;
    }

    pub fn record_hard_failure(&self, reason: &'static str) {
        *lock(&self.hard_failures).entry(reason).or_insert(0) += 1;
    }

    #[must_use]
    pub fn soft_failures(&self, reason: &str) -> u64 {
        lock(&self.soft_failures).get(reason).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn hard_failures(&self, reason: &str) -> u64 {
        lock(&self.hard_failures).get(reason).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let labels = base_labels();
        let mut body = String::new();
        for (name, value) in [
            ("netboot_scan_count", &self.scan_count),
            ("netboot_scan_timer_count", &self.scan_timer_count),
            ("netboot_scan_trigger_count", &self.scan_trigger_count),
            ("netboot_scan_distro_success", &self.scan_distro_success),
            ("netboot_fatal_errors_dropped", &self.fatal_errors_dropped),
        ] {
            let _ = writeln!(
                body,
                "{name}{{{labels}}} {}",
                value.load(Ordering::Relaxed)
            );
        }
        for (name, map) in [
            ("netboot_scan_soft_failure", &self.soft_failures),
            ("netboot_scan_hard_failure", &self.hard_failures),
        ] {
            for (reason, count) in lock(map).iter() {
                let _ = writeln!(body, "{name}{{{labels},reason=\"{reason}\"}} {count}");
            }
        }
        body
    }
}

#[derive(Default)]
struct RouteStats {
    by_status: BTreeMap<u16, u64>,
    latency_ns: VecDeque<u64>,
}

/// Per-route request counts and a bounded latency window.
#[derive(Default)]
pub struct RequestMetrics {
    routes: Mutex<BTreeMap<String, RouteStats>>,
}

impl RequestMetrics {
    pub fn observe(&self, route: &str, status: u16, latency: Duration) {
        let mut routes = lock(&self.routes);
        let stats = routes.entry(route.to_string()).or_default();
        *stats.by_status.entry(status).or_insert(0) += 1;
        if stats.latency_ns.len() == LATENCY_SAMPLE_WINDOW {
            stats.latency_ns.pop_front();
        }
        stats
            .latency_ns
            .push_back(u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX));
    }

    #[must_use]
    pub fn requests(&self, route: &str, status: u16) -> u64 {
        lock(&self.routes)
            .get(route)
            .and_then(|s| s.by_status.get(&status).copied())
            .unwrap_or(0)
    }

    #[must_use]
    pub fn render_prometheus(&self) -> String {
        let labels = base_labels();
        let mut body = String::new();
        for (route, stats) in lock(&self.routes).iter() {
            for (status, count) in &stats.by_status {
                let _ = writeln!(
                    body,
                    "netboot_http_requests_total{{{labels},route=\"{route}\",status=\"{status}\"}} {count}"
                );
            }
            let samples: Vec<u64> = stats.latency_ns.iter().copied().collect();
            push_histogram_from_samples(
                &mut body,
                "netboot_http_request_duration_seconds",
                &format!("{labels},route=\"{route}\""),
                &samples,
                &LATENCY_BOUNDS_SECONDS,
            );
        }
        body
    }
}

fn push_histogram_from_samples(
    body: &mut String,
    metric_name: &str,
    base_labels: &str,
    samples_ns: &[u64],
    bounds_seconds: &[f64],
) {
    let mut count_le = vec![0_u64; bounds_seconds.len()];
    let mut sum_seconds = 0.0_f64;
    for sample in samples_ns {
        let seconds = *sample as f64 / 1_000_000_000.0;
        sum_seconds += seconds;
        for (i, bound) in bounds_seconds.iter().enumerate() {
            if seconds <= *bound {
                count_le[i] += 1;
            }
        }
    }
    for (i, bound) in bounds_seconds.iter().enumerate() {
        let _ = writeln!(
            body,
            "{metric_name}_bucket{{{base_labels},le=\"{bound}\"}} {}",
            count_le[i]
        );
    }
    let _ = writeln!(
        body,
        "{metric_name}_bucket{{{base_labels},le=\"+Inf\"}} {}",
        samples_ns.len()
    );
    let _ = writeln!(body, "{metric_name}_sum{{{base_labels}}} {sum_seconds:.9}");
    let _ = writeln!(
        body,
        "{metric_name}_count{{{base_labels}}} {}",
        samples_ns.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_counters_render_with_reason_labels() {
        let metrics = ScanMetrics::new();
        metrics.scan_count.fetch_add(2, Ordering::Relaxed);
        metrics.record_soft_failure("manifest_decode_failed");
        metrics.record_soft_failure("manifest_decode_failed");
        metrics.record_hard_failure("root_read_failed");

        assert_eq!(metrics.soft_failures("manifest_decode_failed"), 2);
        assert_eq!(metrics.hard_failures("version_scan_failed"), 0);

        let body = metrics.render_prometheus();
        assert!(body.contains("netboot_scan_count{subsystem=\"netboot\""));
        assert!(body.contains("reason=\"manifest_decode_failed\"} 2\n"));
        assert!(body.contains("reason=\"root_read_failed\"} 1\n"));
    }

    #[test]
    fn request_window_is_bounded() {
        let metrics = RequestMetrics::default();
        for _ in 0..(LATENCY_SAMPLE_WINDOW + 10) {
            metrics.observe("/healthz", 200, Duration::from_millis(1));
        }
        assert_eq!(
            metrics.requests("/healthz", 200),
            (LATENCY_SAMPLE_WINDOW + 10) as u64
        );
        let body = metrics.render_prometheus();
        assert!(body.contains(&format!(
            "netboot_http_request_duration_seconds_count{{{},route=\"/healthz\"}} {LATENCY_SAMPLE_WINDOW}",
            base_labels()
        )));
    }
}
