use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mentorhub_database::{create_pool, run_migrations};
use mentorhub_mailer::{mailer_from_config, NotificationDispatcher, NotificationOutbox};
use mentorhub_user_management::{config::UserManagementConfig, create_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mentorhub_user_management=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = UserManagementConfig::from_env();

    let db_pool = create_pool(&config.database).await?;
    run_migrations(&db_pool).await?;

    let mailer = mailer_from_config(&config.notifications)?;
    let (outbox, receiver) = NotificationOutbox::channel();
    NotificationDispatcher::new(mailer, config.notifications.retry.clone()).spawn(receiver);

    let address = config.server.bind_address();
    let app = create_app(AppState::new(db_pool, config, outbox));

    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("User Management Service listening on {}", address);

    axum::serve(listener, app).await?;

    Ok(())
}
