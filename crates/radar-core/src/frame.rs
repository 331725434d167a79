use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Positions and velocities always carry exactly this many channels.
pub const CHANNEL_COUNT: usize = 7;

/// Acquisition/connection status tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    Obstructed,
    CommFailure,
    Initializing,
    Unknown,
}

impl Status {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::Obstructed => "obstructed",
            Status::CommFailure => "comm_failure",
            Status::Initializing => "initializing",
            Status::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Unknown
    }
}

/// One immutable, value-typed metrics record produced by one acquisition tick.
///
/// Two frames with identical timestamps are equivalent. Produced by exactly
/// one producer and never mutated after publication.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsFrame {
    pub timestamp: DateTime<Utc>,
    pub positions: [f64; CHANNEL_COUNT],
    pub velocities: [f64; CHANNEL_COUNT],
    pub status: Status,
}

impl MetricsFrame {
    /// A frame with all channels zeroed and `status = Unknown`, timestamped `at`.
    #[must_use]
    pub fn zeroed(at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            positions: [0.0; CHANNEL_COUNT],
            velocities: [0.0; CHANNEL_COUNT],
            status: Status::Unknown,
        }
    }

    /// All seven positions are exactly zero — the Acquisition Loop, not the
    /// decoder, turns this into `Status::Obstructed`.
    #[must_use]
    pub fn positions_all_zero(&self) -> bool {
        self.positions.iter().all(|p| *p == 0.0)
    }
}

/// A significant per-channel velocity delta, caused by exactly one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VelocityChange {
    pub index: usize,
    pub old_value: f64,
    pub new_value: f64,
    pub delta: f64,
    pub timestamp: DateTime<Utc>,
}

/// Status record, monotonically updated by the Acquisition Loop.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub status: Status,
    pub timestamp: DateTime<Utc>,
    pub last_error: Option<String>,
    pub consecutive_errors: u32,
    pub connection_descriptor: Option<String>,
}

impl StatusRecord {
    #[must_use]
    pub fn initial(at: DateTime<Utc>) -> Self {
        Self {
            status: Status::Initializing,
            timestamp: at,
            last_error: None,
            consecutive_errors: 0,
            connection_descriptor: None,
        }
    }
}
