use crate::config::GatewayConfig;
use crate::db::Database;
use crate::error::GatewayError;
use crate::notify::WelcomeNotifier;
use crate::oauth::GoogleStrategy;
use crate::token::TokenIssuer;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub db: Arc<Database>,
    pub http_client: reqwest::Client,
    pub tokens: Arc<TokenIssuer>,
    /// Google sign-in (None when GOOGLE_* is not configured)
    pub google: Option<Arc<GoogleStrategy>>,
    pub notifier: WelcomeNotifier,
}

impl AppState {
    pub fn new(config: GatewayConfig, db: Database) -> Result<Self, GatewayError> {
        let mut builder =
            reqwest::Client::builder().redirect(reqwest::redirect::Policy::none()); // Downstream 3xx is relayed, never followed
        if let Some(secs) = config.proxy_timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| GatewayError::Internal(format!("failed to create HTTP client: {e}")))?;

        let tokens = TokenIssuer::new(config.jwt_secret.as_bytes(), config.jwt_expire_secs);

        let google = config.google.clone().map(|g| {
            Arc::new(GoogleStrategy::new(
                g,
                http_client.clone(),
                config.session_secret.clone(),
            ))
        });

        let notifier = WelcomeNotifier::new(
            http_client.clone(),
            config.welcome_webhook_url.clone(),
            config.welcome_webhook_secret.clone(),
        );

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            http_client,
            tokens: Arc::new(tokens),
            google,
            notifier,
        })
    }

    /// Replace the Google strategy, e.g. one pointed at non-default endpoints.
    pub fn with_google(mut self, strategy: GoogleStrategy) -> Self {
        self.google = Some(Arc::new(strategy));
        self
    }
}
