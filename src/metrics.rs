//! Redraw telemetry counters and the periodic diagnostic reporter.
//!
//! Two monotonic counters track how well coalescing is working: one repaint
//! actually delivered versus one normal request displaced while still
//! waiting in the slot. Producers only touch relaxed atomics, so counting
//! never blocks the PTY reader or input handlers. A background task logs a
//! summary line at a fixed interval for diagnostics.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Monotonic redraw counters.
#[derive(Debug)]
pub struct RefreshMetrics {
    rendered: AtomicU64,
    coalesced: AtomicU64,
    started_at: Instant,
    last_report: Mutex<LastReport>,
}

#[derive(Debug, Clone, Copy)]
struct LastReport {
    at: Instant,
    rendered: u64,
    coalesced: u64,
}

/// Non-destructive snapshot of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Repaints actually delivered (either priority path).
    pub rendered: u64,
    /// Normal requests displaced while still pending in the slot.
    pub coalesced: u64,
}

impl MetricsSnapshot {
    /// Fraction of normal requests that were coalesced away, in `0.0..=1.0`.
    pub fn coalescing_ratio(&self) -> f64 {
        let total = self.rendered + self.coalesced;
        if total == 0 {
            0.0
        } else {
            self.coalesced as f64 / total as f64
        }
    }
}

impl Default for RefreshMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshMetrics {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            rendered: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            started_at: now,
            last_report: Mutex::new(LastReport {
                at: now,
                rendered: 0,
                coalesced: 0,
            }),
        }
    }

    pub fn note_rendered(&self) {
        self.rendered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn note_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rendered: self.rendered.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
        }
    }

    /// Log one diagnostic line covering the interval since the last report.
    pub fn report(&self) {
        let now = Instant::now();
        // Snapshot under the lock: concurrent reporters must each see a
        // baseline no newer than their own snapshot, or the interval
        // arithmetic underflows.
        let (snapshot, interval_rendered, interval_coalesced, elapsed) = {
            let mut last = self.last_report.lock();
            let snapshot = self.snapshot();
            let rendered = snapshot.rendered - last.rendered;
            let coalesced = snapshot.coalesced - last.coalesced;
            let elapsed = now.saturating_duration_since(last.at);
            *last = LastReport {
                at: now,
                rendered: snapshot.rendered,
                coalesced: snapshot.coalesced,
            };
            (snapshot, rendered, coalesced, elapsed)
        };
        log::debug!(
            "redraw telemetry: {interval_rendered} rendered, {interval_coalesced} coalesced in {:.1?} \
             (lifetime {} rendered / {} coalesced, ratio {:.2}, up {:.0?})",
            elapsed,
            snapshot.rendered,
            snapshot.coalesced,
            snapshot.coalescing_ratio(),
            now.saturating_duration_since(self.started_at),
        );
    }
}

/// Spawn the periodic reporter task. The caller owns the handle and aborts
/// it on shutdown.
pub(crate) fn spawn_reporter(
    runtime: &Handle,
    metrics: Arc<RefreshMetrics>,
    interval: Duration,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            metrics.report();
        }
    })
}
