use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

pub fn create_routes() -> Router<AppState> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))

        // Public directory
        .route("/mentors", get(handlers::list_mentors))
        .route("/mentors/:mentor_id", get(handlers::get_mentor))
        .route("/mentors/:mentor_id/availability", get(handlers::mentor_availability))
        .route("/skills", get(handlers::list_skills))

        // Booking and payment
        .route("/book-session/:mentor_id", post(handlers::book_session))
        .route("/payment/:session_id", post(handlers::pay_for_session))
        .route("/session-confirmation/:session_id", get(handlers::session_confirmation))
        .route("/mentee-dashboard", get(handlers::mentee_dashboard))

        // Mentor self-service
        .route("/mentor/apply", post(handlers::apply_as_mentor))
        .route("/mentor/profile", get(handlers::mentor_profile))
        .route("/mentor/profile/edit", post(handlers::edit_mentor_profile))
        .route("/mentor-dashboard", get(handlers::mentor_dashboard))
        .route("/mentor/session/:session_id", get(handlers::mentor_session_detail))
        .route("/mentor/session/:session_id/accept", post(handlers::accept_session))
        .route("/mentor/session/:session_id/set-status", post(handlers::mentor_set_status))

        // Administration
        .route("/admin/dashboard", get(handlers::admin_dashboard))
        .route("/admin/sessions", get(handlers::admin_sessions))
        .route("/admin/sessions/:session_id/set-status", post(handlers::admin_set_session_status))
        .route("/admin/mentors", get(handlers::admin_mentors))
        .route("/admin/mentors/add", post(handlers::admin_add_mentor))
        .route("/admin/mentors/:mentor_id/edit", post(handlers::admin_edit_mentor))
        .route("/admin/mentors/:mentor_id/approve", post(handlers::admin_approve_mentor))
        .route("/admin/mentors/:mentor_id/reject", post(handlers::admin_reject_mentor))
        .route("/admin/mentors/:mentor_id/delete", post(handlers::admin_delete_mentor))
        .route("/admin/skills", get(handlers::admin_skills).post(handlers::admin_add_skill))
        .route("/admin/skills/:skill_id/edit", post(handlers::admin_edit_skill))
        .route("/admin/skills/:skill_id/delete", post(handlers::admin_delete_skill))
}
