pub mod booking;
pub mod config;
pub mod handlers;
pub mod meeting_link;
pub mod mentors;
pub mod models;
pub mod notifications;
pub mod routes;
pub mod store;

use std::sync::Arc;

use axum::{extract::FromRef, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use mentorhub_auth::JwtService;
use mentorhub_common::{cors_layer, handler_404};

use crate::booking::BookingService;
use crate::config::MeetingsConfig;
use crate::meeting_link::MeetingLinkService;
use crate::mentors::MentorService;
use crate::notifications::NotificationOutbox;
use crate::store::{MentorRepository, SessionRepository};

#[derive(Clone)]
pub struct AppState {
    pub config: MeetingsConfig,
    pub jwt_service: JwtService,
    pub booking_service: BookingService,
    pub mentor_service: MentorService,
}

impl FromRef<AppState> for JwtService {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_service.clone()
    }
}

impl AppState {
    pub fn new(
        config: MeetingsConfig,
        sessions: Arc<dyn SessionRepository>,
        mentors: Arc<dyn MentorRepository>,
        links: MeetingLinkService,
        outbox: NotificationOutbox,
    ) -> Self {
        let jwt_service = JwtService::new(config.jwt.clone());
        let booking_service = BookingService::new(
            sessions,
            mentors.clone(),
            links,
            outbox,
            config.booking.clone(),
        );
        let mentor_service = MentorService::new(mentors, config.booking.clone());

        Self {
            config,
            jwt_service,
            booking_service,
            mentor_service,
        }
    }
}

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
