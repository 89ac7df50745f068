//! RESTful routes: every path under the router's endpoint goes to the catch-all handler.

use crate::handlers::rest::restful;
use crate::state::AppState;
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;

/// Maximum accepted request body.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Mount at the application root (not nested): the router matches full paths
/// including its endpoint prefix.
pub fn restful_routes(state: AppState) -> Router {
    Router::new()
        .fallback(restful)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .with_state(state)
}
