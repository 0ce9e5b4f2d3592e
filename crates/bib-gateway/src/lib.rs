pub mod config;
pub mod cors;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod notify;
pub mod oauth;
pub mod password;
pub mod platform;
pub mod proxy;
pub mod routes;
pub mod security;
pub mod state;
pub mod token;
pub mod validation;

pub use config::GatewayConfig;
pub use db::Database;
pub use error::GatewayError;
pub use state::AppState;
