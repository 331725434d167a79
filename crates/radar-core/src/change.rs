use crate::frame::{MetricsFrame, VelocityChange, CHANNEL_COUNT};

/// Default minimum absolute velocity delta that counts as a change.
pub const DEFAULT_MIN_VELOCITY_CHANGE: f64 = 0.01;

/// Stateful per-channel velocity-change detector.
///
/// Single-writer: one acquisition loop drives `detect`. Concurrent readers
/// of the last-published velocities (for diagnostics) must take the same
/// lock the acquisition loop holds around its frame processing — this type
/// itself performs no locking.
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    last_velocities: [f64; CHANNEL_COUNT],
    min_change: f64,
}

impl ChangeDetector {
    #[must_use]
    pub fn new(min_change: f64) -> Self {
        Self {
            last_velocities: [0.0; CHANNEL_COUNT],
            min_change,
        }
    }

    #[must_use]
    pub fn last_velocities(&self) -> [f64; CHANNEL_COUNT] {
        self.last_velocities
    }

    /// Computes `Δ_i` for every channel against the frame, emits an event
    /// for every channel whose `|Δ_i| >= min_change`, then replaces every
    /// `last_i` with `new_i` — including unchanged channels, per §4.2.
    pub fn detect(&mut self, frame: &MetricsFrame) -> Vec<VelocityChange> {
        let mut changes = Vec::new();
        for i in 0..CHANNEL_COUNT {
            let old = self.last_velocities[i];
            let new = frame.velocities[i];
            let delta = new - old;
            if delta.abs() >= self.min_change {
                changes.push(VelocityChange {
                    index: i,
                    old_value: old,
                    new_value: new,
                    delta,
                    timestamp: frame.timestamp,
                });
            }
        }
        self.last_velocities = frame.velocities;
        changes
    }
}
