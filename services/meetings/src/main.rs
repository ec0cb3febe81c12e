use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mentorhub_database::{create_pool, run_migrations};
use mentorhub_meetings::{
    config::MeetingsConfig,
    create_app,
    meeting_link::{ConferenceProvider, DisabledProvider, GoogleCalendarProvider, MeetingLinkService},
    notifications::{mailer_from_config, NotificationDispatcher, NotificationOutbox},
    store::PgStore,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mentorhub_meetings=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = MeetingsConfig::from_env();

    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;
    let store = Arc::new(PgStore::new(pool));

    let provider: Arc<dyn ConferenceProvider> = if config.calendar.enable_google_calendar {
        Arc::new(GoogleCalendarProvider::new(&config.calendar)?)
    } else {
        tracing::info!("Google Calendar integration disabled, meeting links use the fallback");
        Arc::new(DisabledProvider)
    };
    let links = MeetingLinkService::new(provider, config.calendar.timezone.clone());

    let mailer = mailer_from_config(&config.notifications)?;
    let (outbox, receiver) = NotificationOutbox::channel();
    NotificationDispatcher::new(mailer, config.notifications.retry.clone()).spawn(receiver);

    let state = AppState::new(config.clone(), store.clone(), store, links, outbox);
    let app = create_app(state);

    let address = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("Meetings service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
