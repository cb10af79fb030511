//! munit API - REST server
//!
//! Provides account registration, login and profile endpoints. Protected
//! routes require an EdDSA-signed bearer token issued by `/login`.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    Router,
};
use state::AppState;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::warn;

/// Build the application router with all global layers
///
/// The timeout wraps the authentication middleware, so a slow user lookup
/// is cut off with the rest of the request.
pub fn create_router(state: Arc<AppState>) -> Router {
    let server = &state.config.server;

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins(&server.cors_origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let timeout = Duration::from_secs(server.request_timeout_secs);
    let body_limit = server.max_body_size;

    routes::api_routes(state.clone())
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Router over a fresh in-memory state, for tests
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(AppState::for_testing()))
}

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(origins)
}
