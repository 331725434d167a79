use radar_core::{Status, CHANNEL_COUNT};
use serde::{Deserialize, Serialize};

/// `get_current_snapshot()`'s return value: missing keys default to zero,
/// status defaults to `unknown`, per §4.3's read contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub status: Status,
    pub timestamp_ms: i64,
    pub positions: [f64; CHANNEL_COUNT],
    pub velocities: [f64; CHANNEL_COUNT],
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            status: Status::Unknown,
            timestamp_ms: 0,
            positions: [0.0; CHANNEL_COUNT],
            velocities: [0.0; CHANNEL_COUNT],
        }
    }
}

/// A velocity-change event as persisted under `…:vel_change:N:T`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub index: usize,
    pub old_value: f64,
    pub new_value: f64,
    pub change_value: f64,
    pub timestamp_ms: i64,
}

/// One entry in a `…:posN:history` / `…:velN:history` sorted set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    pub value: f64,
    pub timestamp_ms: i64,
}
