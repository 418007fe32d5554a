//! The redraw scheduler: entry points, processing loop, immediate dispatch.
//!
//! Producers (PTY reader, input handling, resize handling, buffer listeners)
//! call the two fire-and-forget entry points from any thread. Normal
//! requests pass the synchronization gate, feed the rate classifier, and
//! land in the single-slot coalescing handoff; one consumer task drains the
//! slot, applies the classified delay, and invokes the repaint target.
//! Immediate requests bypass the slot entirely so a burst of independent
//! latency-critical events can never be coalesced away.
//!
//! The consumer task self-heals: a panicking repaint target aborts one
//! drain cycle, which the outer loop restarts after a short cooldown. The
//! restart is iterative, so repeated faults degrade latency toward the
//! cooldown interval but can neither grow the stack nor freeze the UI.

use crate::config::RefreshConfig;
use crate::conflate::{ConflatedSlot, RedrawRequest};
use crate::error::RefreshFault;
use crate::gate::SyncGate;
use crate::metrics::{MetricsSnapshot, RefreshMetrics, spawn_reporter};
use crate::rate::{ModeClassifier, SchedulingMode};
use crate::view_state::{CursorShape, ViewState};
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Boundary to the rendering/UI layer.
///
/// Implementations must be callable from any thread and are responsible for
/// marshalling the actual repaint onto the UI execution context (a
/// `winit::Window`, for example, already guarantees this for
/// `request_redraw`). Returning an error marks a single failed repaint; the
/// scheduler logs it and moves on.
pub trait RedrawTarget: Send + Sync {
    fn request_redraw(&self) -> anyhow::Result<()>;
}

impl<F> RedrawTarget for F
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    fn request_redraw(&self) -> anyhow::Result<()> {
        self()
    }
}

/// Ways a repaint target invocation can go wrong.
enum InvokeError {
    /// Target returned an error; log and continue with the next request.
    Failed(anyhow::Error),
    /// Target panicked; abort the current drain cycle.
    Fault(RefreshFault),
}

/// State shared between the scheduler handle and its background tasks.
struct SchedulerCore {
    config: RefreshConfig,
    gate: SyncGate,
    slot: ConflatedSlot,
    classifier: Arc<ModeClassifier>,
    metrics: Arc<RefreshMetrics>,
    view: ViewState,
    target: Arc<dyn RedrawTarget>,
    /// Monotonic frame counter; each increment means "repaint now".
    frames: watch::Sender<u64>,
    /// Set by `shutdown`. Both entry points check it, so the immediate
    /// bypass path cannot deliver after the scheduler stopped and the
    /// classifier's deferred checks cannot be re-armed.
    stopped: AtomicBool,
}

/// Decides when a repaint may happen.
///
/// One instance per display; owns the consumer task and the telemetry
/// reporter, both of which are cancelled on drop. The entry points never
/// block, never error, and are safe to call from any thread.
pub struct RedrawScheduler {
    core: Arc<SchedulerCore>,
    runtime: Handle,
    loop_task: Mutex<Option<JoinHandle<()>>>,
    reporter_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for RedrawScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedrawScheduler")
            .field("mode", &self.core.classifier.current_mode())
            .field("frames", &self.frame_count())
            .field("synchronized", &self.core.gate.is_enabled())
            .finish_non_exhaustive()
    }
}

impl RedrawScheduler {
    /// Create a scheduler and start its consumer and reporter tasks on the
    /// given runtime.
    pub fn new(config: RefreshConfig, target: Arc<dyn RedrawTarget>, runtime: &Handle) -> Self {
        let classifier = ModeClassifier::new(config.clone(), runtime.clone());
        let (frames, _) = watch::channel(0_u64);
        let scheduler = Self {
            core: Arc::new(SchedulerCore {
                config,
                gate: SyncGate::new(),
                slot: ConflatedSlot::new(),
                classifier,
                metrics: Arc::new(RefreshMetrics::new()),
                view: ViewState::new(),
                target,
                frames,
                stopped: AtomicBool::new(false),
            }),
            runtime: runtime.clone(),
            loop_task: Mutex::new(None),
            reporter_task: Mutex::new(None),
        };
        scheduler.start();
        scheduler
    }

    /// Request a normal-priority, coalescable redraw.
    pub fn request_redraw(&self) {
        if self.core.stopped.load(Ordering::Relaxed) {
            return;
        }
        if !self.core.gate.admit() {
            return;
        }
        self.core.classifier.sample(Instant::now());
        if self.core.slot.send(RedrawRequest::now()) {
            self.core.metrics.note_coalesced();
        }
    }

    /// Request a latency-critical redraw that bypasses coalescing.
    ///
    /// Delivered synchronously to the repaint target, independent of slot
    /// occupancy, so none of a burst of immediate requests is ever dropped.
    /// Also nudges the classifier back toward interactive mode.
    pub fn request_immediate_redraw(&self) {
        if self.core.stopped.load(Ordering::Relaxed) {
            return;
        }
        if !self.core.gate.admit() {
            return;
        }
        self.core.classifier.note_interactive();
        if let Err(outcome) = Self::invoke_target(&self.core) {
            match outcome {
                InvokeError::Failed(error) => {
                    log::warn!("immediate redraw failed: {error:#}");
                }
                InvokeError::Fault(fault) => {
                    log::error!("immediate redraw: {fault}");
                }
            }
        }
    }

    /// Toggle synchronized-update suppression (DEC private mode 2026).
    ///
    /// Disabling may synchronously issue one catch-up redraw when requests
    /// were absorbed during suppression.
    pub fn set_synchronized_updates(&self, enabled: bool) {
        let flush = self.core.gate.set_enabled(enabled);
        log::debug!(
            "synchronized updates {}",
            if enabled { "enabled" } else { "disabled" }
        );
        if flush {
            self.request_redraw();
        }
    }

    /// Report a cursor move; redraws only when the position changed.
    pub fn set_cursor_position(&self, col: u16, row: u16) {
        let changed = self.core.view.set_cursor_position(col, row);
        if changed {
            self.request_redraw();
        }
    }

    /// Report a cursor shape change; redraws only when the shape changed.
    pub fn set_cursor_shape(&self, shape: CursorShape) {
        let changed = self.core.view.set_cursor_shape(shape);
        if changed {
            self.request_redraw();
        }
    }

    /// Report cursor visibility; redraws only when it changed.
    pub fn set_cursor_visible(&self, visible: bool) {
        let changed = self.core.view.set_cursor_visible(visible);
        if changed {
            self.request_redraw();
        }
    }

    /// Report a window resize; redraws only when the size changed.
    pub fn set_window_size(&self, cols: u16, rows: u16) {
        let changed = self.core.view.set_window_size(cols, rows);
        if changed {
            self.request_redraw();
        }
    }

    /// Report an alternate-screen-buffer toggle.
    ///
    /// Always repaints immediately: switching between the primary and
    /// alternate buffer replaces the whole visible surface, so change
    /// detection is deliberately not applied.
    pub fn set_alt_screen(&self, enabled: bool) {
        self.core.view.set_alt_screen(enabled);
        self.request_immediate_redraw();
    }

    /// Current value of the observable frame counter.
    pub fn frame_count(&self) -> u64 {
        *self.core.frames.borrow()
    }

    /// Subscribe to frame counter increments. Each change means
    /// "repaint now"; the UI re-reads its own state snapshot.
    pub fn subscribe_frames(&self) -> watch::Receiver<u64> {
        self.core.frames.subscribe()
    }

    /// Non-destructive snapshot of the telemetry counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }

    /// Scheduling mode currently in effect.
    pub fn current_mode(&self) -> SchedulingMode {
        self.core.classifier.current_mode()
    }

    /// Stop the consumer and reporter tasks and cancel pending deferred
    /// classifier checks. In-flight repaints complete; no new ones start:
    /// both entry points become no-ops until [`RedrawScheduler::start`] is
    /// called again.
    pub fn shutdown(&self) {
        // Flag first, so the immediate bypass path stops delivering even
        // while the task aborts are still in flight.
        self.core.stopped.store(true, Ordering::Relaxed);
        if let Some(task) = self.loop_task.lock().take() {
            task.abort();
        }
        if let Some(task) = self.reporter_task.lock().take() {
            task.abort();
        }
        self.core.classifier.cancel_pending();
        log::debug!("redraw scheduler stopped");
    }

    /// Start (or restart, after [`RedrawScheduler::shutdown`]) the consumer
    /// and reporter tasks.
    ///
    /// Any previous instances are cancelled before their replacements are
    /// spawned, so two consumers can never race on the slot.
    pub fn start(&self) {
        if let Some(previous) = self.loop_task.lock().take() {
            previous.abort();
        }
        if let Some(previous) = self.reporter_task.lock().take() {
            previous.abort();
        }
        self.core.stopped.store(false, Ordering::Relaxed);
        let consumer = self.runtime.spawn(Self::drive(Arc::clone(&self.core)));
        *self.loop_task.lock() = Some(consumer);
        let reporter = spawn_reporter(
            &self.runtime,
            Arc::clone(&self.core.metrics),
            self.core.config.report_interval(),
        );
        *self.reporter_task.lock() = Some(reporter);
    }

    /// Outer recovery loop.
    ///
    /// Restarts the drain cycle by iteration, never recursion, so repeated
    /// faults cannot grow the stack. Deliberate shutdown is a task abort
    /// and is never retried; everything else gets a cooldown and a fresh
    /// cycle that resumes draining the slot.
    async fn drive(core: Arc<SchedulerCore>) {
        let cooldown = core.config.fault_cooldown();
        loop {
            let fault = Self::run_cycle(&core).await;
            log::error!("redraw processing loop fault: {fault}; restarting in {cooldown:?}");
            tokio::time::sleep(cooldown).await;
        }
    }

    /// One drain-and-process cycle; runs until a loop-fatal fault.
    async fn run_cycle(core: &Arc<SchedulerCore>) -> RefreshFault {
        loop {
            let request = core.slot.recv().await;
            let delay = core.classifier.current_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match Self::invoke_target(core) {
                Ok(()) => {
                    log::trace!(
                        "redraw delivered {:?} after request",
                        request.requested_at.elapsed()
                    );
                }
                Err(InvokeError::Failed(error)) => {
                    // Single-item failure: skip it, keep draining.
                    log::warn!("repaint failed, continuing: {error:#}");
                }
                Err(InvokeError::Fault(fault)) => return fault,
            }
        }
    }

    /// Invoke the repaint target once, containing panics at the boundary.
    fn invoke_target(core: &SchedulerCore) -> Result<(), InvokeError> {
        // A panicking renderer must not take the scheduler's tasks down.
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| core.target.request_redraw()));
        match result {
            Ok(Ok(())) => {
                core.metrics.note_rendered();
                core.frames.send_modify(|frame| *frame += 1);
                Ok(())
            }
            Ok(Err(error)) => Err(InvokeError::Failed(error)),
            Err(payload) => Err(InvokeError::Fault(RefreshFault::from_panic(payload))),
        }
    }
}

impl Drop for RedrawScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
