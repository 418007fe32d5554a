//! Redraw scheduling and coalescing for the par-term terminal emulator.
//!
//! Decides *when* a repaint may happen, not what is painted. Bulk PTY
//! output is coalesced into a bounded number of repaints per second while
//! user-originated events (keystrokes, cursor motion, resizes) keep a
//! zero-perceived-latency bypass path. Provides:
//! - `config`: tuning knobs (delays, hysteresis thresholds, cooldowns)
//! - `rate`: arrival-rate window and interactive/high-volume classifier
//! - `gate`: synchronized-update suppression (DEC private mode 2026)
//! - `conflate`: single-slot keep-latest producer/consumer handoff
//! - `scheduler`: entry points, processing loop, immediate dispatch
//! - `view_state`: change-detected cursor/geometry setters
//! - `metrics`: rendered/coalesced telemetry and periodic reporting

pub mod config;
pub mod conflate;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod rate;
pub mod scheduler;
pub mod view_state;

pub use config::RefreshConfig;
pub use error::RefreshFault;
pub use metrics::{MetricsSnapshot, RefreshMetrics};
pub use rate::SchedulingMode;
pub use scheduler::{RedrawScheduler, RedrawTarget};
pub use view_state::CursorShape;
