use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::health::not_found;
use crate::handlers::mpesa_handlers;
use crate::state::AppState;

pub fn mpesa_routes() -> Router<AppState> {
    // Unsupported methods on a known path answer 404 like any unknown route.
    Router::new()
        // C2B
        .route(
            "/stk-push",
            post(mpesa_handlers::initiate_stk_push).fallback(not_found),
        )
        .route(
            "/callback",
            post(mpesa_handlers::mpesa_callback).fallback(not_found),
        )
        // Token (testing/admin)
        .route(
            "/token",
            get(mpesa_handlers::get_access_token).fallback(not_found),
        )
}
