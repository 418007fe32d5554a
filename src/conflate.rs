//! Single-slot keep-latest handoff between producers and the processing loop.
//!
//! Arbitrarily many producers hand normal-priority redraw requests to the
//! one consumer task through a slot of capacity one. A request arriving
//! while one is already waiting silently replaces it; the displaced request
//! is reported back to the caller so telemetry can count it as coalesced.
//! Dropping redundant normal requests is the entire point of this slot —
//! immediate-priority requests never pass through it.

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

/// A normal-priority redraw request.
///
/// Created at the call site, consumed exactly once by the processing loop
/// (or displaced by a newer request before the loop gets to it).
#[derive(Debug, Clone, Copy)]
pub struct RedrawRequest {
    /// When the request was submitted. Survives coalescing only as the most
    /// recent submission's timestamp.
    pub requested_at: Instant,
}

impl RedrawRequest {
    pub fn now() -> Self {
        Self {
            requested_at: Instant::now(),
        }
    }
}

/// Capacity-one overwrite-on-full handoff.
#[derive(Debug, Default)]
pub struct ConflatedSlot {
    slot: Mutex<Option<RedrawRequest>>,
    ready: Notify,
}

impl ConflatedSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a request into the slot, replacing any request already waiting.
    ///
    /// Never blocks and never fails. Returns `true` when a still-pending
    /// request was displaced.
    pub fn send(&self, request: RedrawRequest) -> bool {
        let displaced = self.slot.lock().replace(request).is_some();
        self.ready.notify_one();
        displaced
    }

    /// Take the waiting request, suspending until one exists.
    ///
    /// Cancel-safe: if the returned future is dropped while waiting, a
    /// request left in the slot stays there for the next call.
    pub async fn recv(&self) -> RedrawRequest {
        loop {
            if let Some(request) = self.slot.lock().take() {
                return request;
            }
            self.ready.notified().await;
        }
    }

    /// Whether a request is currently waiting. Used by telemetry tests.
    pub fn is_occupied(&self) -> bool {
        self.slot.lock().is_some()
    }
}
