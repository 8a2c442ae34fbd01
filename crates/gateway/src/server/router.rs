//! Axum router construction.

use axum::{routing::get, Router};
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware, state::AppState};

/// Build the application [`Router`] with all routes and middleware attached.
///
/// Anything not matched by an explicit route is served from the frontend
/// bundle, falling back to `index.html`.
pub fn build(state: AppState) -> Router {
    let frontend = handlers::frontend_assets(&state.frontend_root);
    Router::new()
        .route(
            "/models/packages/:package/*file",
            get(handlers::package_file),
        )
        .route("/config.yaml", get(handlers::config_yaml))
        .route("/", get(handlers::index))
        .fallback_service(frontend)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(middleware::REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .with_state(state)
}
