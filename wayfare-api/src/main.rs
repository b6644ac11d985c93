use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use wayfare_api::{
    app,
    state::{AppState, AuthConfig},
};
use wayfare_booking::{BookingCoordinator, LogNotifier};
use wayfare_store::{DbClient, PgBookingStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wayfare_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = wayfare_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Wayfare API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let store = Arc::new(PgBookingStore::new(db.pool.clone()));
    let coordinator = BookingCoordinator::new(store, Arc::new(LogNotifier))
        .with_tx_budget(Duration::from_secs(config.booking_rules.tx_budget_seconds));

    let app_state = AppState {
        coordinator: Arc::new(coordinator),
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app.into_make_service()).await.unwrap();
}
