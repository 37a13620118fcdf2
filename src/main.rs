use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use clinicbook::config::AppConfig;
use clinicbook::db::SqliteStore;
use clinicbook::services::BookingService;
use clinicbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let store = Arc::new(SqliteStore::open(&config.database_url)?);
    if config.reject_overlapping_slots {
        tracing::info!("overlapping slots will be rejected");
    }
    if config.auto_confirm_bookings {
        tracing::info!("bookings are confirmed on creation");
    }

    let state = Arc::new(AppState {
        booking: BookingService::from_config(store, &config),
        config: config.clone(),
    });

    let app = clinicbook::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
