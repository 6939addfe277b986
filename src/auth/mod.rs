pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;

const ISSUER: &str = "trellis-api";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Tenant the user belongs to
    pub tenant_id: Uuid,
    pub email: String,
    /// Role within the tenant: owner, admin, member
    pub role: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(user_id: Uuid, tenant_id: Uuid, email: String, role: String) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        Self {
            sub: user_id,
            tenant_id,
            email,
            role,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(expiry_hours as i64)).timestamp(),
        }
    }
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Invalid JWT token: {0}")]
    InvalidToken(String),
}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

/// Validate a token and return its claims.
pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    decode_jwt(token, false)
}

/// Validate a token for refresh: signature and issuer are still enforced,
/// expiry is not. The caller bounds how stale the token may be.
pub fn validate_jwt_allow_expired(token: &str) -> Result<Claims, JwtError> {
    decode_jwt(token, true)
}

fn decode_jwt(token: &str, allow_expired: bool) -> Result<Claims, JwtError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = !allow_expired;

    let token_data = decode::<Claims>(token, &decoding_key, &validation)
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;
    Ok(token_data.claims)
}

/// Refresh window check: an expired token may only be exchanged within the
/// configured grace period after its expiry.
pub fn within_refresh_grace(claims: &Claims) -> bool {
    let grace_hours = config::config().security.refresh_grace_hours;
    let deadline = claims.exp + Duration::hours(grace_hours as i64).num_seconds();
    Utc::now().timestamp() <= deadline
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "owner@example.com".to_string(),
            "owner".to_string(),
        )
    }

    #[test]
    fn generated_token_round_trips() {
        let claims = claims();
        let token = generate_jwt(&claims).expect("generate");
        let decoded = validate_jwt(&token).expect("validate");
        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.tenant_id, claims.tenant_id);
        assert_eq!(decoded.role, "owner");
        assert_eq!(decoded.iss, ISSUER);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let token = generate_jwt(&claims()).expect("generate");
        let mut broken = token.clone();
        broken.push('x');
        assert!(validate_jwt(&broken).is_err());
    }

    #[test]
    fn expired_token_passes_refresh_validation_only() {
        let mut c = claims();
        c.exp = (Utc::now() - Duration::hours(1)).timestamp();
        let token = generate_jwt(&c).expect("generate");

        assert!(validate_jwt(&token).is_err());
        let refreshed = validate_jwt_allow_expired(&token).expect("refresh validation");
        assert_eq!(refreshed.sub, c.sub);
        assert!(within_refresh_grace(&refreshed));
    }

    #[test]
    fn grace_window_expires() {
        let mut c = claims();
        // Expired far beyond any configured grace period
        c.exp = (Utc::now() - Duration::days(400)).timestamp();
        assert!(!within_refresh_grace(&c));
    }
}
