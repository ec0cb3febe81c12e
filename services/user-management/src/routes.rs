use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::services::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Account routes
        .route("/signup", post(handlers::signup))
        .route("/login", post(handlers::login))
        .route("/me", get(handlers::get_current_user))
        .route("/change-password", post(handlers::change_password))
        .route("/forgot-password", post(handlers::forgot_password))
        .route("/reset-password/:token", post(handlers::reset_password))

        // Mentee profile routes
        .route("/mentee/profile", get(handlers::get_mentee_profile))
        .route("/mentee/profile/edit", post(handlers::edit_mentee_profile))

        // User management routes (admin only)
        .route("/admin/users", get(handlers::admin_users))
        .route("/admin/users/:user_id/edit", post(handlers::admin_edit_user))
        .route("/admin/users/:user_id/delete", post(handlers::admin_delete_user))
}
