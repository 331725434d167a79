pub mod acquisition;
pub mod config;
pub mod discovery;
pub mod hub;
pub mod http;
pub mod metrics_sink;
pub mod persistence;
pub mod radar_client;
pub mod state;
pub mod ws;

pub use config::{load_config, Config};
pub use state::AppState;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Assembles the full router: the plain HTTP read surface plus the
/// realtime `/ws` upgrade endpoint, a permissive CORS layer (the wire
/// contract accepts any origin), and request tracing.
pub fn build_router(state: AppState) -> Router {
    http::routes()
        .route("/ws", get(ws::upgrade))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
