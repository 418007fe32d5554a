//! Synchronized-update suppression gate (DEC private mode 2026).
//!
//! While an application has synchronized output enabled, every redraw
//! request from either priority path is absorbed; the gate only remembers
//! that at least one arrived. Disabling synchronized output reports whether
//! anything was absorbed so the caller can issue exactly one catch-up
//! redraw. The flush decision is made under the gate's lock but the flush
//! itself must happen after the lock is released, so the gate never
//! participates in a lock-ordering cycle with the coalescing slot.

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct GateState {
    enabled: bool,
    /// Whether any request was absorbed since suppression was enabled.
    pending: bool,
}

/// Suppression switch shared by both redraw entry points.
#[derive(Debug, Default)]
pub struct SyncGate {
    state: Mutex<GateState>,
}

impl SyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable suppression.
    ///
    /// Returns `true` when suppression was just disabled and at least one
    /// request was absorbed while it was active; the caller must then issue
    /// exactly one normal-priority redraw, after this call returns.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let mut state = self.state.lock();
        if enabled {
            state.enabled = true;
            state.pending = false;
            false
        } else {
            let should_flush = state.pending;
            state.enabled = false;
            state.pending = false;
            should_flush
        }
    }

    /// Ask the gate whether a request may proceed.
    ///
    /// Returns `false` while suppression is active, in which case the
    /// request has been absorbed and must not be forwarded.
    pub fn admit(&self) -> bool {
        let mut state = self.state.lock();
        if state.enabled {
            state.pending = true;
            false
        } else {
            true
        }
    }

    /// Whether suppression is currently active.
    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }
}
