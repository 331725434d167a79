//! The optional industrial-controller (PLC) metrics mirror. Its interface
//! is defined here but its internals are out of scope; this crate only
//! defines the seam the Acquisition Loop calls on step 8 ("notify any
//! registered in-process metrics handlers").

use radar_core::MetricsFrame;

pub trait MetricsSink: Send + Sync {
    fn notify(&self, frame: &MetricsFrame);
}

/// Used when no industrial-controller address is configured.
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn notify(&self, _frame: &MetricsFrame) {}
}

/// Logs every frame at `trace` instead of writing to a fieldbus device —
/// a stand-in so the seam is exercised without a PLC internals
/// implementation.
pub struct LoggingSink {
    pub address: String,
}

impl MetricsSink for LoggingSink {
    fn notify(&self, frame: &MetricsFrame) {
        tracing::trace!(address = %self.address, status = %frame.status, "industrial controller mirror tick");
    }
}
