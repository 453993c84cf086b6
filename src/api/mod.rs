//! HTTP façade for the dashboard.
//!
//! - `/`, `/login`, `/logout` — page-level navigation
//! - `/devices`, `/refresh` — cached and freshly discovered devices
//! - `/control`, `/set_lock` — device commands and the lock overlay
//! - `/status` — health check

pub mod routes;

use crate::SharedState;
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    routes::dashboard_router(state).layer(TraceLayer::new_for_http())
}
