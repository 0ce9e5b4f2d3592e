use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::Logger, web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bib_gateway::{config::GatewayConfig, db::Database, routes, state::AppState};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = match GatewayConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    let port = config.port;
    let allowed_origins = config.allowed_origins.clone();
    let rate_limit_rpm = config.rate_limit_rpm;

    tracing::info!(
        "Starting bib-gateway on port {} in {} mode",
        port,
        config.environment.as_str()
    );
    tracing::info!("Newsletter service: {}", config.newsletter_service_url);
    tracing::info!(
        "Google sign-in: {}",
        if config.google.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    tracing::info!(
        "Welcome notifications: {}",
        if config.welcome_webhook_url.is_some() {
            "webhook"
        } else {
            "log only"
        }
    );

    // Initialize database
    let db = match Database::new(&config.db_path) {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(error = %e, path = %config.db_path, "failed to initialize database");
            std::process::exit(1);
        }
    };
    tracing::info!("Database initialized at: {}", config.db_path);

    // Create shared state
    let state = AppState::new(config, db).map_err(std::io::Error::other)?;
    let state_data = web::Data::new(state);

    // Configure rate limiter
    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(rate_limit_rpm as u64)
        .finish()
        .ok_or_else(|| std::io::Error::other("invalid rate limiter configuration"))?;

    // Start HTTP server
    HttpServer::new(move || {
        let cors = bib_gateway::cors::build_cors(&allowed_origins);

        App::new()
            .app_data(state_data.clone())
            .app_data(routes::json_config())
            .app_data(web::PayloadConfig::new(routes::JSON_LIMIT)) // 10MB body limit
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Governor::new(&governor_conf))
            .configure(routes::configure)
            .default_service(web::to(routes::not_found))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
