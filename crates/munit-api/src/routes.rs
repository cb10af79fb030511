//! API route definitions

use crate::auth::middleware::auth_middleware;
use crate::handlers::{auth, health, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/register", post(auth::register_handler))
        .route(
            "/login",
            get(auth::login_handler).post(auth::login_handler),
        );

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route(
            "/profile",
            get(users::get_profile)
                .patch(users::update_profile)
                .delete(users::delete_profile),
        )
        .route("/users/:id", get(users::get_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    // Combine routes
    Router::new().merge(public_routes).merge(protected_routes)
}
