//! HS256 bearer tokens.

use std::sync::Arc;

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

use bookstore_kernel::settings::AuthSettings;

/// Role carried by every token minted at login.
pub const ADMIN_ROLE: &str = "Admin";

/// Claims embedded in every token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (username)
    pub sub: String,
    /// Role granted to the subject
    pub role: String,
    /// Issuer
    pub iss: String,
    /// Issued at, seconds since the epoch
    pub iat: i64,
    /// Expiration, seconds since the epoch
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token has expired")]
    Expired,

    #[error("token is invalid: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

/// Mints signed tokens for authenticated users.
#[derive(Clone)]
pub struct TokenIssuer {
    key: Arc<EncodingKey>,
    issuer: String,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: Arc::new(EncodingKey::from_secret(secret)),
            issuer: issuer.into(),
            ttl,
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(
            settings.jwt_secret.as_bytes(),
            settings.issuer.clone(),
            Duration::minutes(settings.token_ttl_minutes),
        )
    }

    /// Lifetime of freshly issued tokens.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a token for `subject` holding `role`.
    pub fn issue(&self, subject: &str, role: &str) -> Result<String, TokenError> {
        let now = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: subject.to_string(),
            role: role.to_string(),
            iss: self.issuer.clone(),
            iat: now.unix_timestamp(),
            exp: (now + self.ttl).unix_timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.key)?)
    }
}

/// Checks signature, issuer and expiry of presented tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl TokenVerifier {
    pub fn new(secret: &[u8], issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            key: Arc::new(DecodingKey::from_secret(secret)),
            validation: Arc::new(validation),
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        Self::new(settings.jwt_secret.as_bytes(), &settings.issuer)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(err),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"unit-test-secret";

    #[test]
    fn issued_token_verifies() {
        let issuer = TokenIssuer::new(SECRET, "bookstore-api", Duration::hours(2));
        let token = issuer.issue("admin", ADMIN_ROLE).unwrap();

        let claims = TokenVerifier::new(SECRET, "bookstore-api")
            .verify(&token)
            .unwrap();
        assert_eq!(claims.sub, "admin");
        assert_eq!(claims.role, ADMIN_ROLE);
        assert_eq!(claims.exp - claims.iat, 2 * 60 * 60);
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = TokenIssuer::new(SECRET, "bookstore-api", Duration::minutes(-5));
        let token = issuer.issue("admin", ADMIN_ROLE).unwrap();

        let result = TokenVerifier::new(SECRET, "bookstore-api").verify(&token);
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn foreign_issuer_is_rejected() {
        let token = TokenIssuer::new(SECRET, "someone-else", Duration::hours(1))
            .issue("admin", ADMIN_ROLE)
            .unwrap();

        let result = TokenVerifier::new(SECRET, "bookstore-api").verify(&token);
        assert!(matches!(result, Err(TokenError::Invalid(_))));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = TokenIssuer::new(b"other-secret", "bookstore-api", Duration::hours(1))
            .issue("admin", ADMIN_ROLE)
            .unwrap();

        assert!(TokenVerifier::new(SECRET, "bookstore-api")
            .verify(&token)
            .is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(TokenVerifier::new(SECRET, "bookstore-api")
            .verify("not-a-token")
            .is_err());
    }
}
