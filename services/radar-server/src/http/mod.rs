//! HTTP request/response surface — plain reads over `AppState`, no write
//! endpoints. Grounded on `services/server/src/http/mod.rs`'s router
//! assembly and permissive CORS layer (any origin is accepted).

mod handlers;
mod response;

use crate::state::AppState;
use axum::routing::get;
use axum::Router;

/// The plain-read routes, state-typed so the caller can merge in the
/// `/ws` upgrade route before attaching layers and binding state.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/info", get(handlers::info))
        .route("/api/discover", get(handlers::discover))
        .route("/api/status", get(handlers::status))
        .route("/api/current", get(handlers::current))
        .route("/api/velocity-changes", get(handlers::velocity_changes))
        .route("/api/latest-update", get(handlers::latest_update))
        .route("/api/velocity-history/{n}", get(handlers::velocity_history))
}
