use std::sync::{Arc, Mutex};

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tourbook::config::AppConfig;
use tourbook::db;
use tourbook::handlers;
use tourbook::services::payment::momo::MomoGateway;
use tourbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;

    anyhow::ensure!(
        !config.gateway.secret_key.is_empty(),
        "MOMO_SECRET_KEY must be set"
    );
    let gateway = MomoGateway::new(config.gateway.clone());

    let state = Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: config.clone(),
        gateway: Box::new(gateway),
    });

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings/my", get(handlers::bookings::my_bookings))
        .route(
            "/api/bookings/payment",
            post(handlers::bookings::initiate_payment),
        )
        .route(
            "/api/bookings/momo-return",
            post(handlers::bookings::gateway_return),
        )
        .route(
            "/api/bookings/:id/cancel",
            patch(handlers::bookings::cancel_booking),
        )
        .route("/api/tours/:id/slots", post(handlers::slots::tour_slots))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
