//! Sign-in with Google: authorization-code flow plus local account resolution.
//!
//! The `state` parameter is stateless: `<nonce>.<issued_at>.<hmac>` signed with the
//! session secret, so a callback can be checked without server-side storage.

use rand::{distr::Alphanumeric, Rng};
use serde::Deserialize;

use crate::config::GoogleConfig;
use crate::db::{Database, NewUser, User};
use crate::error::GatewayError;
use crate::security::{compute_hmac, verify_hmac};

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

const SCOPE: &str = "profile email";
const STATE_TTL_SECS: i64 = 600;
const USERNAME_PREFIX_MAX: usize = 13;
const USERNAME_SUFFIX_LEN: usize = 6;
const USERNAME_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("provider returned error: {0}")]
    ProviderDenied(String),
    #[error("missing authorization code")]
    MissingCode,
    #[error("invalid or expired state")]
    InvalidState,
    #[error("token exchange failed: {0}")]
    Exchange(reqwest::Error),
    #[error("profile fetch failed: {0}")]
    Profile(reqwest::Error),
    #[error("provider profile has no e-mail address")]
    MissingEmail,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// The subset of the OpenID userinfo document the gateway uses.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleProfile {
    #[serde(rename = "sub")]
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
}

/// Google OAuth client. Built once at startup and shared through `AppState`.
pub struct GoogleStrategy {
    config: GoogleConfig,
    client: reqwest::Client,
    state_secret: Vec<u8>,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleStrategy {
    pub fn new(config: GoogleConfig, client: reqwest::Client, state_secret: Vec<u8>) -> Self {
        Self {
            config,
            client,
            state_secret,
            auth_url: GOOGLE_AUTH_URL.to_string(),
            token_url: GOOGLE_TOKEN_URL.to_string(),
            userinfo_url: GOOGLE_USERINFO_URL.to_string(),
        }
    }

    /// Point the token and userinfo calls somewhere else (test doubles, proxies).
    pub fn with_endpoints(mut self, token_url: String, userinfo_url: String) -> Self {
        self.token_url = token_url;
        self.userinfo_url = userinfo_url;
        self
    }

    /// Provider consent URL carrying a freshly signed `state`.
    pub fn authorization_url(&self) -> String {
        format!(
            "{base}?client_id={client_id}&redirect_uri={redirect_uri}&response_type=code&scope={scope}&state={state}",
            base = self.auth_url,
            client_id = urlencoding::encode(&self.config.client_id),
            redirect_uri = urlencoding::encode(&self.config.callback_url),
            scope = urlencoding::encode(SCOPE),
            state = self.issue_state(),
        )
    }

    pub fn issue_state(&self) -> String {
        self.issue_state_at(chrono::Utc::now().timestamp())
    }

    fn issue_state_at(&self, issued_at: i64) -> String {
        let nonce: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        let payload = format!("{nonce}.{issued_at}");
        let mac = compute_hmac(&self.state_secret, payload.as_bytes());
        format!("{payload}.{mac}")
    }

    pub fn verify_state(&self, state: &str) -> Result<(), OAuthError> {
        let (payload, mac) = state.rsplit_once('.').ok_or(OAuthError::InvalidState)?;
        if !verify_hmac(&self.state_secret, payload.as_bytes(), mac) {
            return Err(OAuthError::InvalidState);
        }

        let issued_at: i64 = payload
            .rsplit_once('.')
            .and_then(|(_, ts)| ts.parse().ok())
            .ok_or(OAuthError::InvalidState)?;
        let age = chrono::Utc::now().timestamp() - issued_at;
        if !(0..=STATE_TTL_SECS).contains(&age) {
            return Err(OAuthError::InvalidState);
        }
        Ok(())
    }

    /// Trade an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> Result<String, OAuthError> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.config.callback_url.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let body: TokenResponse = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(OAuthError::Exchange)?
            .json()
            .await
            .map_err(OAuthError::Exchange)?;

        Ok(body.access_token)
    }

    pub async fn fetch_profile(&self, access_token: &str) -> Result<GoogleProfile, OAuthError> {
        self.client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(OAuthError::Profile)?
            .json::<GoogleProfile>()
            .await
            .map_err(OAuthError::Profile)
    }
}

/// Derive a username from an e-mail local part: up to 13 sanitized characters,
/// an underscore, then 6 random `[a-z0-9]`.
pub fn derive_username(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut prefix: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(USERNAME_PREFIX_MAX)
        .collect();
    if prefix.is_empty() {
        prefix.push_str("user");
    }

    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(USERNAME_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();

    format!("{prefix}_{suffix}")
}

/// Map a provider profile to a local account.
///
/// Order: existing Google link, then an account with the same e-mail (linked in
/// place), then a new verified account with a derived username.
pub fn resolve_account(db: &Database, profile: &GoogleProfile) -> Result<User, GatewayError> {
    if let Some(user) = db.find_user_by_google_id(&profile.id)? {
        return Ok(user);
    }

    let email = profile
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .unwrap_or_default();

    if let Some(user) = db.find_user_by_email(&email)? {
        tracing::info!(user_id = %user.id, "linking Google account to existing user");
        return db.link_google_account(&user.id, &profile.id, profile.picture.as_deref());
    }

    let name = profile
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

    for _ in 0..USERNAME_ATTEMPTS {
        let username = derive_username(&email);
        if db.username_exists(&username)? {
            continue;
        }

        let new_user = NewUser {
            name: name.clone(),
            username,
            email: email.clone(),
            password_hash: None,
            google_id: Some(profile.id.clone()),
            avatar: profile.picture.clone(),
            is_email_verified: true,
        };
        match db.create_user(&new_user) {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "created account from Google sign-in");
                return Ok(user);
            }
            Err(GatewayError::UserExists("username")) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(GatewayError::Internal(
        "could not derive a free username".to_string(),
    ))
}
