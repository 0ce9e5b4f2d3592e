#![allow(dead_code)]

use actix_web::{middleware, web, App, HttpServer};
use std::net::{SocketAddr, TcpListener};

use bib_gateway::config::{Environment, GatewayConfig, GoogleConfig};
use bib_gateway::{AppState, Database};

pub const JWT_SECRET: &str = "integration-test-jwt-secret-0123456789";

pub fn test_config(newsletter_url: &str) -> GatewayConfig {
    GatewayConfig {
        db_path: ":memory:".to_string(),
        port: 0,
        environment: Environment::Development,
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expire_secs: 3600,
        cookie_expire_days: 30,
        session_secret: b"integration-session-secret".to_vec(),
        google: None,
        frontend_url: "http://frontend.test".to_string(),
        newsletter_service_url: newsletter_url.to_string(),
        allowed_origins: vec!["*".to_string()],
        rate_limit_rpm: 1000,
        metrics_token: None,
        welcome_webhook_url: None,
        welcome_webhook_secret: None,
        proxy_timeout_secs: Some(5),
    }
}

pub fn google_config() -> GoogleConfig {
    GoogleConfig {
        client_id: "test-client".to_string(),
        client_secret: "test-client-secret".to_string(),
        callback_url: "http://localhost:5000/api/auth/google/callback".to_string(),
    }
}

pub fn make_state(config: GatewayConfig) -> web::Data<AppState> {
    let db = Database::new(&config.db_path).unwrap();
    web::Data::new(AppState::new(config, db).unwrap())
}

/// Build the full gateway app around `state`, wired like `main`.
#[macro_export]
macro_rules! gateway_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($state.clone())
                .app_data(bib_gateway::routes::json_config())
                .app_data(actix_web::web::PayloadConfig::new(
                    bib_gateway::routes::JSON_LIMIT,
                ))
                .configure(bib_gateway::routes::configure)
                .default_service(actix_web::web::to(bib_gateway::routes::not_found)),
        )
        .await
    };
}

/// Start a throwaway HTTP server on an ephemeral port.
pub fn spawn_server<F>(configure: F) -> SocketAddr
where
    F: Fn(&mut web::ServiceConfig) + Send + Clone + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(move || App::new().configure(configure.clone()))
        .workers(1)
        .disable_signals()
        .listen(listener)
        .unwrap()
        .run();
    actix_rt::spawn(server);
    addr
}

/// Like [`spawn_server`], with responses compressed whenever the caller allows it.
pub fn spawn_compressing_server<F>(configure: F) -> SocketAddr
where
    F: Fn(&mut web::ServiceConfig) + Send + Clone + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(middleware::Compress::default())
            .configure(configure.clone())
    })
    .workers(1)
    .disable_signals()
    .listen(listener)
    .unwrap()
    .run();
    actix_rt::spawn(server);
    addr
}

/// An address nothing is listening on.
pub fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}
