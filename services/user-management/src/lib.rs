pub mod config;
pub mod handlers;
pub mod models;
pub mod password_reset;
pub mod routes;
pub mod services;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use mentorhub_common::{cors_layer, handler_404};

pub use services::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server);

    routes::create_routes()
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
        .fallback(handler_404)
}
