//! Session credentials: HS256 JWTs carrying a user id and an expiry.
//!
//! Tokens are stateless. Nothing is persisted server-side, so logout only clears
//! the client's cookie and an issued token stays valid until `exp`.

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub id: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiration (unix seconds).
    pub exp: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Encode(jsonwebtoken::errors::Error),
    #[error("invalid token: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    expire_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], expire_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::default(),
            expire_secs,
        }
    }

    pub fn expire_secs(&self) -> i64 {
        self.expire_secs
    }

    /// Issue a signed token for a user id.
    pub fn issue(&self, user_id: &str) -> Result<String, TokenError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            id: user_id.to_string(),
            iat: now,
            exp: now + self.expire_secs,
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(TokenError::Encode)
    }

    /// Verify signature and expiry, returning the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"unit-test-token-secret";

    #[test]
    fn issue_and_verify() {
        let issuer = TokenIssuer::new(SECRET, 3600);
        let token = issuer.issue("user-1").unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.id, "user-1");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn garbage_rejected() {
        let issuer = TokenIssuer::new(SECRET, 3600);
        assert!(issuer.verify("not.a.token").is_err());
        assert!(issuer.verify("").is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let issuer = TokenIssuer::new(b"secret-a", 3600);
        let verifier = TokenIssuer::new(b"secret-b", 3600);
        let token = issuer.issue("user-1").unwrap();
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn expired_rejected() {
        // Past the default 60s leeway.
        let issuer = TokenIssuer::new(SECRET, -120);
        let token = issuer.issue("user-1").unwrap();
        assert!(issuer.verify(&token).is_err());
    }
}
