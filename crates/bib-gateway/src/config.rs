use std::env;
use url::Url;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_DB_PATH: &str = "./bitsinbinary.db";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_JWT_EXPIRE: &str = "30d";
const DEFAULT_COOKIE_EXPIRE_DAYS: i64 = 30;
const DEFAULT_RATE_LIMIT_RPM: u32 = 120;
const PRODUCTION_ORIGINS: &[&str] = &["https://bitsinbinary.com", "https://www.bitsinbinary.com"];
const DEV_SESSION_SECRET: &str = "dev-session-secret-change-in-production";

/// Deployment mode, read from `APP_ENV` (falls back to `NODE_ENV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// Google OAuth client registration.
#[derive(Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct GatewayConfig {
    /// SQLite database path
    pub db_path: String,
    /// Server port
    pub port: u16,
    pub environment: Environment,
    /// HS256 signing secret for session tokens
    pub jwt_secret: String,
    /// Token lifetime in seconds
    pub jwt_expire_secs: i64,
    /// Cookie lifetime in days. Deliberately independent of `jwt_expire_secs`.
    pub cookie_expire_days: i64,
    /// HMAC key for the OAuth `state` parameter
    pub session_secret: Vec<u8>,
    /// Google OAuth (None = sign-in with Google disabled)
    pub google: Option<GoogleConfig>,
    /// Frontend base URL used for OAuth redirects
    pub frontend_url: String,
    /// Downstream origin for /api/newsletter
    pub newsletter_service_url: String,
    /// CORS allowed origins
    pub allowed_origins: Vec<String>,
    /// Rate limit requests per minute
    pub rate_limit_rpm: u32,
    /// Bearer token required for /metrics endpoint (None = public)
    pub metrics_token: Option<String>,
    /// Mail relay hook for welcome notifications (None = log only)
    pub welcome_webhook_url: Option<String>,
    pub welcome_webhook_secret: Option<Vec<u8>>,
    /// Downstream timeout in seconds (None = transport default)
    pub proxy_timeout_secs: Option<u64>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("db_path", &self.db_path)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expire_secs", &self.jwt_expire_secs)
            .field("cookie_expire_days", &self.cookie_expire_days)
            .field("session_secret", &"[REDACTED]")
            .field("google", &self.google)
            .field("frontend_url", &self.frontend_url)
            .field("newsletter_service_url", &self.newsletter_service_url)
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("welcome_webhook_url", &self.welcome_webhook_url)
            .field(
                "welcome_webhook_secret",
                &self.welcome_webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("proxy_timeout_secs", &self.proxy_timeout_secs)
            .finish()
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|s| !s.trim().is_empty())
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = optional_var("APP_ENV")
            .or_else(|| optional_var("NODE_ENV"))
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        // Required: token signing secret
        let jwt_secret =
            optional_var("JWT_SECRET").ok_or(ConfigError::MissingRequired("JWT_SECRET"))?;
        if jwt_secret.len() < 32 {
            tracing::warn!(
                "JWT_SECRET is short ({} bytes) — use at least 32 random bytes",
                jwt_secret.len()
            );
        }

        let jwt_expire = env::var("JWT_EXPIRE").unwrap_or_else(|_| DEFAULT_JWT_EXPIRE.to_string());
        let jwt_expire_secs = parse_duration_secs(&jwt_expire)?;

        let cookie_expire_days = match optional_var("COOKIE_EXPIRE_DAYS") {
            Some(v) => v
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|d| *d > 0)
                .ok_or(ConfigError::InvalidNumber("COOKIE_EXPIRE_DAYS", v))?,
            None => DEFAULT_COOKIE_EXPIRE_DAYS,
        };

        // Required: downstream newsletter service
        let newsletter_service_url = optional_var("NEWSLETTER_SERVICE_URL")
            .ok_or(ConfigError::MissingRequired("NEWSLETTER_SERVICE_URL"))?;
        validate_origin(&newsletter_service_url)?;

        let frontend_url = optional_var("FRONTEND_URL")
            .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        Url::parse(&frontend_url).map_err(|_| ConfigError::InvalidUrl(frontend_url.clone()))?;

        let session_secret = match optional_var("SESSION_SECRET") {
            Some(s) => s.into_bytes(),
            None if environment == Environment::Production => {
                return Err(ConfigError::MissingRequired("SESSION_SECRET"));
            }
            None => {
                tracing::warn!("SESSION_SECRET not set — using a development placeholder");
                DEV_SESSION_SECRET.as_bytes().to_vec()
            }
        };

        let google = google_from_env()?;
        if google.is_none() {
            tracing::warn!("Google OAuth not configured — /api/auth/google is disabled");
        }

        let db_path = env::var("DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let allowed_origins: Vec<String> = match optional_var("ALLOWED_ORIGINS") {
            Some(s) => s
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None if environment == Environment::Production => {
                let mut origins = vec![frontend_url.clone()];
                origins.extend(PRODUCTION_ORIGINS.iter().map(|o| o.to_string()));
                origins
            }
            None => vec!["*".to_string()],
        };

        if environment == Environment::Production && allowed_origins.iter().any(|o| o == "*") {
            tracing::warn!("Wildcard CORS origin with credentials enabled in production");
        }

        let rate_limit_rpm = env::var("RATE_LIMIT_RPM")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPM);

        let metrics_token = optional_var("METRICS_TOKEN");
        if metrics_token.is_none() {
            tracing::warn!("METRICS_TOKEN not set — /metrics endpoint is publicly accessible");
        }

        let welcome_webhook_url = optional_var("WELCOME_WEBHOOK_URL");
        if let Some(ref url) = welcome_webhook_url {
            Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.clone()))?;
        }
        let welcome_webhook_secret = optional_var("WELCOME_WEBHOOK_SECRET").map(String::into_bytes);

        let proxy_timeout_secs = match optional_var("PROXY_TIMEOUT_SECS") {
            Some(v) => Some(
                v.trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or(ConfigError::InvalidNumber("PROXY_TIMEOUT_SECS", v))?,
            ),
            None => None,
        };

        Ok(Self {
            db_path,
            port,
            environment,
            jwt_secret,
            jwt_expire_secs,
            cookie_expire_days,
            session_secret,
            google,
            frontend_url,
            newsletter_service_url,
            allowed_origins,
            rate_limit_rpm,
            metrics_token,
            welcome_webhook_url,
            welcome_webhook_secret,
            proxy_timeout_secs,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

fn google_from_env() -> Result<Option<GoogleConfig>, ConfigError> {
    let client_id = optional_var("GOOGLE_CLIENT_ID");
    let client_secret = optional_var("GOOGLE_CLIENT_SECRET");
    let callback_url = optional_var("GOOGLE_CALLBACK_URL");

    match (client_id, client_secret, callback_url) {
        (Some(client_id), Some(client_secret), Some(callback_url)) => {
            Url::parse(&callback_url)
                .map_err(|_| ConfigError::InvalidUrl(callback_url.clone()))?;
            Ok(Some(GoogleConfig {
                client_id,
                client_secret,
                callback_url,
            }))
        }
        (None, None, None) => Ok(None),
        _ => Err(ConfigError::PartialGoogleConfig),
    }
}

/// Downstream origins must be absolute http(s) URLs.
fn validate_origin(origin: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(origin).map_err(|_| ConfigError::InvalidUrl(origin.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ConfigError::InvalidUrl(origin.to_string())),
    }
}

/// Parse a token lifetime such as `3600`, `45m`, `12h` or `30d` into seconds.
pub fn parse_duration_secs(value: &str) -> Result<i64, ConfigError> {
    let value = value.trim();
    let invalid = || ConfigError::InvalidDuration(value.to_string());

    let (digits, multiplier) = match value.char_indices().last() {
        Some((idx, 's')) => (&value[..idx], 1),
        Some((idx, 'm')) => (&value[..idx], 60),
        Some((idx, 'h')) => (&value[..idx], 60 * 60),
        Some((idx, 'd')) => (&value[..idx], 24 * 60 * 60),
        Some(_) => (value, 1),
        None => return Err(invalid()),
    };

    let amount: i64 = digits.trim().parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }
    amount.checked_mul(multiplier).ok_or_else(invalid)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid value for {0}: {1}")]
    InvalidNumber(&'static str, String),

    #[error("GOOGLE_CLIENT_ID, GOOGLE_CLIENT_SECRET and GOOGLE_CALLBACK_URL must be set together")]
    PartialGoogleConfig,
}
