//! Scheduler tuning knobs.
//!
//! All timing constants used by the redraw scheduler live here so embedders
//! can persist and override them alongside the rest of their configuration.
//! The defaults are the values the scheduler was tuned with; the asymmetric
//! high-volume enter/exit rates form a hysteresis band and should be kept
//! asymmetric to avoid mode-flapping.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the redraw scheduler.
///
/// Construct with [`RefreshConfig::default`] and override individual fields,
/// or deserialize from the embedder's config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Delay applied to normal-priority redraws while in interactive mode (ms)
    pub interactive_delay_ms: u64,

    /// Delay applied to normal-priority redraws while in high-volume mode (ms)
    pub high_volume_delay_ms: u64,

    /// Events/second above which the classifier switches to high-volume mode
    pub high_volume_enter_rate: usize,

    /// Events/second below which the deferred hysteresis check drops the
    /// classifier back to interactive mode
    pub high_volume_exit_rate: usize,

    /// How long after entering high-volume mode the one-shot fallback check
    /// fires (ms)
    pub hysteresis_check_delay_ms: u64,

    /// Grace period after an immediate-priority redraw before the classifier
    /// is nudged back toward interactive mode (ms)
    pub interactive_grace_ms: u64,

    /// Cooldown between restarts of the processing loop after an unexpected
    /// fault (ms)
    pub fault_cooldown_ms: u64,

    /// Interval between telemetry log lines (seconds)
    pub report_interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interactive_delay_ms: 8,
            high_volume_delay_ms: 50,
            high_volume_enter_rate: 100,
            high_volume_exit_rate: 50,
            hysteresis_check_delay_ms: 500,
            interactive_grace_ms: 100,
            fault_cooldown_ms: 100,
            report_interval_secs: 5,
        }
    }
}

impl RefreshConfig {
    /// Delay for normal-priority redraws in interactive mode
    pub fn interactive_delay(&self) -> Duration {
        Duration::from_millis(self.interactive_delay_ms)
    }

    /// Delay for normal-priority redraws in high-volume mode
    pub fn high_volume_delay(&self) -> Duration {
        Duration::from_millis(self.high_volume_delay_ms)
    }

    /// Delay before the one-shot high-volume fallback check fires
    pub fn hysteresis_check_delay(&self) -> Duration {
        Duration::from_millis(self.hysteresis_check_delay_ms)
    }

    /// Grace period before the immediate-path nudge takes effect
    pub fn interactive_grace(&self) -> Duration {
        Duration::from_millis(self.interactive_grace_ms)
    }

    /// Cooldown between processing-loop restarts after a fault
    pub fn fault_cooldown(&self) -> Duration {
        Duration::from_millis(self.fault_cooldown_ms)
    }

    /// Interval between telemetry reports, clamped to at least one second
    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs.max(1))
    }
}
