//! End-to-end tests for the redraw scheduler.
//!
//! All tests run on a paused tokio clock so the 8ms/50ms/500ms scheduling
//! delays elapse deterministically without wall-clock sleeps.

use anyhow::anyhow;
use par_term_refresh::scheduler::{RedrawScheduler, RedrawTarget};
use par_term_refresh::{CursorShape, RefreshConfig, SchedulingMode};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;

/// Repaint target that just counts invocations.
#[derive(Default)]
struct CountingTarget {
    calls: AtomicU64,
}

impl CountingTarget {
    fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl RedrawTarget for CountingTarget {
    fn request_redraw(&self) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Repaint target that fails (or panics) on its first N invocations.
struct FlakyTarget {
    calls: AtomicU64,
    fail_first: u64,
    panic_instead: bool,
}

impl FlakyTarget {
    fn failing(fail_first: u64) -> Self {
        Self {
            calls: AtomicU64::new(0),
            fail_first,
            panic_instead: false,
        }
    }

    fn panicking(fail_first: u64) -> Self {
        Self {
            calls: AtomicU64::new(0),
            fail_first,
            panic_instead: true,
        }
    }

    fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl RedrawTarget for FlakyTarget {
    fn request_redraw(&self) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        if call <= self.fail_first {
            if self.panic_instead {
                panic!("simulated renderer crash on call {call}");
            }
            return Err(anyhow!("simulated renderer failure on call {call}"));
        }
        Ok(())
    }
}

fn scheduler_with(target: Arc<dyn RedrawTarget>) -> RedrawScheduler {
    RedrawScheduler::new(RefreshConfig::default(), target, &Handle::current())
}

/// Wait until the observable frame counter reaches `count`.
async fn wait_for_frames(scheduler: &RedrawScheduler, count: u64) {
    let mut frames = scheduler.subscribe_frames();
    tokio::time::timeout(Duration::from_secs(30), async {
        while *frames.borrow_and_update() < count {
            frames.changed().await.expect("scheduler dropped");
        }
    })
    .await
    .unwrap_or_else(|_| panic!("frame counter never reached {count}"));
}

/// Advance well past every scheduling delay and assert the frame counter
/// did not move.
async fn assert_no_more_frames(scheduler: &RedrawScheduler, expected: u64) {
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(scheduler.frame_count(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_single_normal_request_eventually_repaints() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = scheduler_with(target.clone());

    scheduler.request_redraw();
    wait_for_frames(&scheduler, 1).await;

    assert_eq!(target.calls(), 1);
    assert_eq!(scheduler.metrics().rendered, 1);
    assert_eq!(scheduler.metrics().coalesced, 0);
}

#[tokio::test(start_paused = true)]
async fn test_interactive_delay_is_applied() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = scheduler_with(target.clone());
    let mut frames = scheduler.subscribe_frames();

    scheduler.request_redraw();
    // Nothing may be painted before the 8ms interactive delay.
    let early = tokio::time::timeout(Duration::from_millis(5), frames.changed()).await;
    assert!(early.is_err(), "repaint fired before the interactive delay");
    wait_for_frames(&scheduler, 1).await;
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_normal_requests_coalesces() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = scheduler_with(target.clone());

    // Issued back to back without yielding, so the consumer cannot drain
    // between them: the slot holds one and displaces the other 99.
    for _ in 0..100 {
        scheduler.request_redraw();
    }

    wait_for_frames(&scheduler, 1).await;
    assert_no_more_frames(&scheduler, 1).await;

    let metrics = scheduler.metrics();
    assert_eq!(metrics.rendered, 1);
    assert_eq!(metrics.coalesced, 99);
    assert!((metrics.coalescing_ratio() - 0.99).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn test_immediate_requests_are_never_dropped() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = scheduler_with(target.clone());

    // Occupy the coalescing slot first; immediates must not care.
    scheduler.request_redraw();
    for _ in 0..5 {
        scheduler.request_immediate_redraw();
    }

    // All five delivered synchronously, before any scheduling delay.
    assert_eq!(target.calls(), 5);
    assert_eq!(scheduler.frame_count(), 5);

    // The queued normal request still drains afterwards.
    wait_for_frames(&scheduler, 6).await;
    assert_eq!(scheduler.metrics().rendered, 6);
}

#[tokio::test(start_paused = true)]
async fn test_suppression_flushes_exactly_once() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = scheduler_with(target.clone());

    scheduler.set_synchronized_updates(true);
    for _ in 0..10 {
        scheduler.request_redraw();
    }
    scheduler.request_immediate_redraw();

    // Zero repaints while suppressed, either path.
    assert_no_more_frames(&scheduler, 0).await;
    assert_eq!(target.calls(), 0);

    scheduler.set_synchronized_updates(false);
    wait_for_frames(&scheduler, 1).await;
    assert_no_more_frames(&scheduler, 1).await;
}

#[tokio::test(start_paused = true)]
async fn test_suppression_without_requests_flushes_nothing() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = scheduler_with(target.clone());

    scheduler.set_synchronized_updates(true);
    scheduler.set_synchronized_updates(false);

    assert_no_more_frames(&scheduler, 0).await;
}

#[tokio::test(start_paused = true)]
async fn test_state_setters_are_change_detected() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = scheduler_with(target.clone());

    scheduler.set_cursor_position(10, 3);
    wait_for_frames(&scheduler, 1).await;

    // Same values again: no redraw from any of these.
    scheduler.set_cursor_position(10, 3);
    scheduler.set_cursor_visible(true);
    scheduler.set_cursor_shape(CursorShape::Block);
    scheduler.set_window_size(80, 24);
    assert_no_more_frames(&scheduler, 1).await;

    scheduler.set_cursor_shape(CursorShape::Bar);
    wait_for_frames(&scheduler, 2).await;
}

#[tokio::test(start_paused = true)]
async fn test_alt_screen_toggle_always_repaints_immediately() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = scheduler_with(target.clone());

    // Even re-entering the current state repaints: no change detection on
    // the alternate-screen path.
    scheduler.set_alt_screen(false);
    scheduler.set_alt_screen(true);
    scheduler.set_alt_screen(true);
    assert_eq!(scheduler.frame_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_failing_repaint_does_not_stop_the_loop() {
    let target = Arc::new(FlakyTarget::failing(1));
    let scheduler = scheduler_with(target.clone());

    scheduler.request_redraw();
    // Let the first (failing) repaint attempt happen.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(target.calls(), 1);
    assert_eq!(scheduler.frame_count(), 0);

    scheduler.request_redraw();
    wait_for_frames(&scheduler, 1).await;
    assert_eq!(target.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_repaint_restarts_the_loop() {
    let target = Arc::new(FlakyTarget::panicking(1));
    let scheduler = scheduler_with(target.clone());

    scheduler.request_redraw();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(target.calls(), 1);
    assert_eq!(scheduler.frame_count(), 0);

    // The loop restarts after its cooldown and keeps draining.
    scheduler.request_redraw();
    wait_for_frames(&scheduler, 1).await;
    assert_eq!(target.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sustained_burst_switches_to_high_volume_delay() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = scheduler_with(target.clone());
    let mut frames = scheduler.subscribe_frames();

    for _ in 0..101 {
        scheduler.request_redraw();
    }
    assert_eq!(scheduler.current_mode(), SchedulingMode::HighVolume);

    // The coalesced repaint now waits for the 50ms high-volume delay.
    let early = tokio::time::timeout(Duration::from_millis(40), frames.changed()).await;
    assert!(early.is_err(), "repaint fired before the high-volume delay");
    wait_for_frames(&scheduler, 1).await;

    // Once the burst ages out of the rate window, the next request is
    // classified as interactive again.
    tokio::time::sleep(Duration::from_millis(1200)).await;
    scheduler.request_redraw();
    assert_eq!(scheduler.current_mode(), SchedulingMode::Interactive);
    wait_for_frames(&scheduler, 2).await;
}

#[tokio::test(start_paused = true)]
async fn test_immediate_redraw_failure_is_contained() {
    let target = Arc::new(FlakyTarget::failing(1));
    let scheduler = scheduler_with(target.clone());

    // Fire-and-forget: the failure is logged, not surfaced.
    scheduler.request_immediate_redraw();
    assert_eq!(target.calls(), 1);
    assert_eq!(scheduler.frame_count(), 0);

    scheduler.request_immediate_redraw();
    assert_eq!(scheduler.frame_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_the_consumer() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = scheduler_with(target.clone());

    scheduler.shutdown();
    scheduler.request_redraw();
    assert_no_more_frames(&scheduler, 0).await;
    assert_eq!(target.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_immediate_dispatch() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = scheduler_with(target.clone());

    scheduler.shutdown();
    // The bypass path delivers synchronously, so it must check the stopped
    // flag itself rather than rely on the consumer task being gone.
    scheduler.request_immediate_redraw();
    scheduler.set_alt_screen(true);
    assert_eq!(target.calls(), 0);
    assert_eq!(scheduler.frame_count(), 0);
    assert_no_more_frames(&scheduler, 0).await;
}

#[tokio::test(start_paused = true)]
async fn test_start_after_shutdown_resumes_delivery() {
    let target = Arc::new(CountingTarget::default());
    let scheduler = scheduler_with(target.clone());

    scheduler.shutdown();
    scheduler.request_immediate_redraw();
    assert_eq!(scheduler.frame_count(), 0);

    // Restarting replaces (never duplicates) the consumer; both paths work
    // again and a burst still coalesces to a single repaint.
    scheduler.start();
    scheduler.request_immediate_redraw();
    assert_eq!(scheduler.frame_count(), 1);
    for _ in 0..10 {
        scheduler.request_redraw();
    }
    wait_for_frames(&scheduler, 2).await;
    assert_no_more_frames(&scheduler, 2).await;
    assert_eq!(scheduler.metrics().coalesced, 9);
}
