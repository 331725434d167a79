//! Time-series store adapter: maps the radar data model onto a
//! Redis-compatible sorted-set store per §4.3's key layout.

pub mod client;
pub mod config;
pub mod error;
pub mod model;

pub use client::StoreClient;
pub use config::StoreConfig;
pub use error::StoreError;
pub use model::{ChangeRecord, HistoryPoint, Snapshot};
