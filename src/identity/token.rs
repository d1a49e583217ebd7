//! Signed session tokens (HS256)

use crate::{config::AuthConfig, errors::{CaseboxResult, ConfigurationError}};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionClaims {
    pub steam_id: String,
    pub username: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiry (unix seconds)
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenService {
    pub fn new(config: &AuthConfig) -> CaseboxResult<Self> {
        if config.session_secret.trim().is_empty() {
            return Err(ConfigurationError::MissingRequired("auth.session_secret".to_string()).into());
        }

        let ttl = Duration::try_hours(config.token_ttl_hours)
            .filter(|ttl| *ttl > Duration::zero())
            .ok_or_else(|| ConfigurationError::InvalidValue {
                field: "auth.token_ttl_hours".to_string(),
                value: config.token_ttl_hours.to_string(),
                reason: "Token lifetime out of range".to_string(),
            })?;

        let secret = config.session_secret.as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation: Validation::new(Algorithm::HS256),
            ttl,
        })
    }

    pub fn issue(&self, steam_id: &str, username: &str) -> CaseboxResult<String> {
        self.issue_at(steam_id, username, Utc::now())
    }

    pub fn issue_at(&self, steam_id: &str, username: &str, issued_at: DateTime<Utc>) -> CaseboxResult<String> {
        let claims = SessionClaims {
            steam_id: steam_id.to_string(),
            username: username.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?)
    }

    /// Fails with `Unauthorized` on a bad signature, malformed token or expiry
    pub fn verify(&self, token: &str) -> CaseboxResult<SessionClaims> {
        Ok(decode::<SessionClaims>(token, &self.decoding_key, &self.validation)?.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CaseboxError;

    fn service(secret: &str) -> TokenService {
        TokenService::new(&AuthConfig {
            session_secret: secret.to_string(),
            token_ttl_hours: 24,
        })
        .unwrap()
    }

    #[test]
    fn test_round_trip_keeps_identity() {
        let tokens = service("s3cret");
        let token = tokens.issue("76561198000000001", "gaben").unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.steam_id, "76561198000000001");
        assert_eq!(claims.username, "gaben");
        assert_eq!(claims.exp - claims.iat, 24 * 3600);
    }

    #[test]
    fn test_expired_token() {
        let tokens = service("s3cret");
        let token = tokens
            .issue_at("1", "old", Utc::now() - Duration::hours(25))
            .unwrap();

        match tokens.verify(&token) {
            Err(CaseboxError::Unauthorized(msg)) => assert_eq!(msg, "Token expired"),
            other => panic!("expected expiry, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_secret_and_garbage() {
        let token = service("one").issue("1", "x").unwrap();

        for bad in [token.as_str(), "not-a-token", ""] {
            match service("two").verify(bad) {
                Err(CaseboxError::Unauthorized(msg)) => assert_eq!(msg, "Invalid token"),
                other => panic!("expected rejection, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_unrepresentable_lifetime_refused() {
        for hours in [i64::MAX, 0, -1] {
            assert!(TokenService::new(&AuthConfig {
                session_secret: "s3cret".to_string(),
                token_ttl_hours: hours,
            })
            .is_err());
        }
    }

    #[test]
    fn test_empty_secret_refused() {
        assert!(TokenService::new(&AuthConfig {
            session_secret: "  ".to_string(),
            token_ttl_hours: 24,
        })
        .is_err());
    }
}
