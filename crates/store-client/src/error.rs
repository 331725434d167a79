/// Errors surfaced by the time-series store adapter.
///
/// Per §7, store unavailability marks the adapter disconnected and is
/// logged; it never propagates as a process-fatal error.
#[derive(Debug)]
pub enum StoreError {
    Connect(String),
    Command(String),
    /// `get_channel_history`/`write_frame` called with a channel index
    /// outside `[1, 7]`.
    BadArgument(String),
    /// A read was attempted while the adapter is marked disconnected.
    Disconnected,
    /// A Redis call did not complete within the adapter's bounded timeout.
    Timeout,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Connect(s) => write!(f, "store connect error: {s}"),
            StoreError::Command(s) => write!(f, "store command error: {s}"),
            StoreError::BadArgument(s) => write!(f, "bad argument: {s}"),
            StoreError::Disconnected => write!(f, "store is disconnected"),
            StoreError::Timeout => write!(f, "store call timed out"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Command(err.to_string())
    }
}
