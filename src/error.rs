//! Typed fault type for the processing loop.
//!
//! A fault is a condition that aborts one drain-and-process cycle of the
//! processing loop. Faults never escape the scheduler: the loop logs them,
//! waits a short cooldown, and restarts. They are distinct from a plain
//! `Err` returned by a repaint target, which is logged and skipped without
//! restarting anything.

use thiserror::Error;

/// A loop-fatal condition inside the redraw processing loop.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RefreshFault {
    /// The repaint target panicked while handling a redraw.
    ///
    /// The panic is caught at the callback boundary so a misbehaving
    /// renderer cannot take the scheduler down with it.
    #[error("repaint target panicked: {message}")]
    TargetPanic {
        /// Stringified panic payload, or a placeholder when the payload was
        /// not a string.
        message: String,
    },
}

impl RefreshFault {
    /// Build a [`RefreshFault::TargetPanic`] from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::TargetPanic { message }
    }
}
