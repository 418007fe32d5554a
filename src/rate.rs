//! Arrival-rate tracking and scheduling-mode classification.
//!
//! The classifier watches the stream of normal-priority redraw requests and
//! decides how long each coalesced redraw should be delayed before painting:
//! a short delay while the user is interacting, a longer one while bulk
//! output is flooding the terminal. Two deferred one-shot checks keep the
//! classifier from getting stuck or flapping:
//!
//! - entering high-volume mode arms a fallback check that drops back to
//!   interactive if the rate has collapsed below the exit threshold, so a
//!   quiet half second with no samples at all cannot pin the longer delay;
//! - an immediate-priority redraw arms a nudge check that drops back to
//!   interactive after a short grace period, so a flurry of keystrokes is
//!   not misclassified as bulk output.

use crate::config::RefreshConfig;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Width of the sliding window used to measure the event rate.
const RATE_WINDOW: Duration = Duration::from_secs(1);

/// Scheduling mode chosen by the classifier.
///
/// Only these two modes are ever stored; the zero-delay immediate path is a
/// bypass, not a mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingMode {
    /// User is interacting; keep redraw latency low.
    Interactive,
    /// Bulk output is arriving; coalesce harder to bound repaints per second.
    HighVolume,
}

impl SchedulingMode {
    /// Delay applied to a normal-priority redraw in this mode.
    pub fn delay(self, config: &RefreshConfig) -> Duration {
        match self {
            Self::Interactive => config.interactive_delay(),
            Self::HighVolume => config.high_volume_delay(),
        }
    }
}

/// Bounded sliding-time-window sample counter.
///
/// Holds the timestamps of recent events; after pruning, the window length
/// is the current rate in events/second.
#[derive(Debug, Default)]
struct RateWindow {
    samples: VecDeque<Instant>,
}

impl RateWindow {
    fn record(&mut self, now: Instant) {
        self.samples.push_back(now);
    }

    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.samples.front() {
            if now.saturating_duration_since(*oldest) > RATE_WINDOW {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn rate(&self) -> usize {
        self.samples.len()
    }
}

#[derive(Debug)]
struct ClassifierState {
    window: RateWindow,
    mode: SchedulingMode,
    last_transition_at: Instant,
}

/// Adaptive classifier with hysteresis.
///
/// All state mutation happens under one internal lock, held only for the
/// sample-and-classify computation itself, never across a delay or repaint.
pub struct ModeClassifier {
    config: RefreshConfig,
    runtime: Handle,
    state: Mutex<ClassifierState>,
    /// One-shot fallback check armed on every transition into high-volume mode.
    fallback_check: Mutex<Option<JoinHandle<()>>>,
    /// One-shot nudge check armed on every immediate-priority redraw.
    nudge_check: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ModeClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeClassifier")
            .field("mode", &self.current_mode())
            .finish_non_exhaustive()
    }
}

impl ModeClassifier {
    pub fn new(config: RefreshConfig, runtime: Handle) -> Arc<Self> {
        Arc::new(Self {
            config,
            runtime,
            state: Mutex::new(ClassifierState {
                window: RateWindow::default(),
                mode: SchedulingMode::Interactive,
                last_transition_at: Instant::now(),
            }),
            fallback_check: Mutex::new(None),
            nudge_check: Mutex::new(None),
        })
    }

    /// Record one event and return the mode that now applies.
    ///
    /// Rate above the enter threshold selects high-volume; anything else
    /// selects interactive. A transition is applied only when the target
    /// differs from the current mode.
    pub fn sample(self: &Arc<Self>, now: Instant) -> SchedulingMode {
        let (mode, entered_high_volume, previous_for) = {
            let mut state = self.state.lock();
            state.window.record(now);
            state.window.prune(now);
            let target = if state.window.rate() > self.config.high_volume_enter_rate {
                SchedulingMode::HighVolume
            } else {
                SchedulingMode::Interactive
            };
            if target != state.mode {
                let held_for = now.saturating_duration_since(state.last_transition_at);
                state.mode = target;
                state.last_transition_at = now;
                (target, target == SchedulingMode::HighVolume, Some(held_for))
            } else {
                (target, false, None)
            }
        };

        if let Some(held_for) = previous_for {
            log::debug!("redraw scheduling mode -> {mode:?} (previous mode held {held_for:?})");
        }
        if entered_high_volume {
            self.arm_fallback_check();
        }
        mode
    }

    /// Bias the classifier back toward interactive use.
    ///
    /// Called by the immediate dispatch path. The immediate event itself is
    /// not recorded into the rate window (that would push the rate toward
    /// the bulk-output classification); instead a deferred check drops the
    /// mode back to interactive once the grace period has passed, provided
    /// the rate no longer justifies high-volume mode.
    pub fn note_interactive(self: &Arc<Self>) {
        let classifier = Arc::downgrade(self);
        let grace = self.config.interactive_grace();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(classifier) = classifier.upgrade() {
                classifier.force_interactive_if_quiet(
                    Instant::now(),
                    classifier.config.high_volume_enter_rate,
                    "interactive nudge",
                );
            }
        });
        if let Some(previous) = self.nudge_check.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Mode currently in effect, without recording a sample.
    pub fn current_mode(&self) -> SchedulingMode {
        self.state.lock().mode
    }

    /// Delay currently applied to normal-priority redraws.
    pub fn current_delay(&self) -> Duration {
        self.current_mode().delay(&self.config)
    }

    /// Abort any pending deferred checks. Called on scheduler shutdown.
    pub fn cancel_pending(&self) {
        if let Some(handle) = self.fallback_check.lock().take() {
            handle.abort();
        }
        if let Some(handle) = self.nudge_check.lock().take() {
            handle.abort();
        }
    }

    /// Arm (or re-arm) the one-shot fallback check.
    ///
    /// If the rate has fallen below the exit threshold by the time the check
    /// fires, the mode is forced back to interactive even though no new
    /// sample arrived to trigger a reclassification.
    fn arm_fallback_check(self: &Arc<Self>) {
        let classifier = Arc::downgrade(self);
        let delay = self.config.hysteresis_check_delay();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(classifier) = classifier.upgrade() {
                classifier.force_interactive_if_quiet(
                    Instant::now(),
                    classifier.config.high_volume_exit_rate,
                    "high-volume fallback",
                );
            }
        });
        if let Some(previous) = self.fallback_check.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Drop back to interactive mode if the observed rate is below `threshold`.
    fn force_interactive_if_quiet(&self, now: Instant, threshold: usize, reason: &str) {
        let flipped = {
            let mut state = self.state.lock();
            state.window.prune(now);
            if state.mode == SchedulingMode::HighVolume && state.window.rate() < threshold {
                state.mode = SchedulingMode::Interactive;
                state.last_transition_at = now;
                true
            } else {
                false
            }
        };
        if flipped {
            log::debug!("redraw scheduling mode -> Interactive ({reason})");
        }
    }
}

impl Drop for ModeClassifier {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
