//! Biblio Server - library lending REST API

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biblio_server::{
    api,
    config::{AppConfig, LoggingConfig},
    repository::{MemoryStore, PgStore, Repository},
    services::Services,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    tracing::info!("Starting Biblio Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Lending policy: {} active loans, {} days, {} per day late",
        config.loans.max_active_loans,
        config.loans.loan_duration_days,
        config.loans.fine_per_day
    );

    let repository = connect_store(&config).await?;
    let services = Services::new(repository, &config);

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("biblio_server={},tower_http=debug", logging.level).into());

    let json = logging.format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

/// PostgreSQL pool with migrations applied, or the in-process store
async fn connect_store(config: &AppConfig) -> anyhow::Result<Repository> {
    if config.database.is_memory() {
        tracing::warn!("Using the in-memory store; data is lost on shutdown");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    Ok(Arc::new(PgStore::new(pool)))
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Books
        .route("/books", get(api::books::list_books).post(api::books::create_book))
        .route("/books/available", get(api::books::available_books))
        .route(
            "/books/:id",
            get(api::books::get_book)
                .put(api::books::update_book)
                .delete(api::books::delete_book),
        )
        .route("/books/:id/reservations", get(api::reservations::book_queue))
        // Categories
        .route(
            "/categories",
            get(api::categories::list_categories).post(api::categories::create_category),
        )
        .route(
            "/categories/:id",
            get(api::categories::get_category)
                .put(api::categories::update_category)
                .delete(api::categories::delete_category),
        )
        // Members
        .route("/members", get(api::members::list_members).post(api::members::create_member))
        .route("/members/me", get(api::members::me))
        .route(
            "/members/:id",
            get(api::members::get_member)
                .put(api::members::update_member)
                .delete(api::members::delete_member),
        )
        .route("/members/:id/loans", get(api::members::member_loans))
        .route("/members/:id/fines", get(api::members::member_fines))
        // Loans
        .route("/loans", get(api::loans::list_loans).post(api::loans::create_loan))
        .route("/loans/late", get(api::loans::late_loans))
        .route(
            "/loans/:id",
            get(api::loans::get_loan)
                .put(api::loans::update_loan)
                .delete(api::loans::delete_loan),
        )
        .route("/loans/:id/return", post(api::loans::return_loan))
        // Reservations
        .route(
            "/reservations",
            get(api::reservations::list_reservations).post(api::reservations::create_reservation),
        )
        .route("/reservations/mine", get(api::reservations::my_reservations))
        .route(
            "/reservations/:id",
            get(api::reservations::get_reservation).delete(api::reservations::cancel_reservation),
        )
        // Fines
        .route("/fines", get(api::fines::list_fines).post(api::fines::create_fine))
        .route("/fines/unpaid", get(api::fines::unpaid_fines))
        .route("/fines/:id", get(api::fines::get_fine).delete(api::fines::delete_fine))
        .route("/fines/:id/pay", post(api::fines::pay_fine))
        // Dashboards
        .route("/dashboard/admin", get(api::dashboard::admin_dashboard))
        .route("/dashboard/me", get(api::dashboard::member_dashboard))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
