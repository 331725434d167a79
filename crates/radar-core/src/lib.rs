//! Core data types and pure logic for the radar acquisition pipeline:
//! the metrics frame/status model, the ASCII decoder, the change
//! detector, and the bounded ring used for rolling history.

pub mod change;
pub mod decode;
pub mod frame;
pub mod ring;

pub use change::ChangeDetector;
pub use decode::{decode, DecodeOutcome};
pub use frame::{MetricsFrame, Status, StatusRecord, VelocityChange, CHANNEL_COUNT};
pub use ring::Ring;
