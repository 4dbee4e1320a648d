use crate::models::Role;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SESSION_HOURS: i64 = 8;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Invalid or expired token: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: u64,
    pub role: Role,
    pub exp: usize,
    pub iat: usize,
    pub username: String,
}

pub fn expires_in_seconds() -> u64 {
    (SESSION_HOURS * 60 * 60) as u64
}

pub fn sign_token(user_id: u64, role: Role, username: &str, secret: &str) -> Result<String, TokenError> {
    let now = Utc::now();
    let exp = now + Duration::hours(SESSION_HOURS);
    let claims = Claims {
        sub: user_id,
        role,
        iat: now.timestamp() as usize,
        exp: exp.timestamp() as usize,
        username: username.to_string(),
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|err| TokenError::Signing(err.to_string()))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|err| TokenError::Invalid(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_token_verifies_with_the_same_secret() {
        let token = sign_token(7, Role::Encargada, "rosa", "secret").unwrap();
        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, Role::Encargada);
        assert_eq!(claims.username, "rosa");
        assert_eq!(claims.exp - claims.iat, expires_in_seconds() as usize);
    }

    #[test]
    fn other_secrets_and_garbage_are_rejected() {
        let token = sign_token(1, Role::Dueno, "admin", "secret").unwrap();
        assert!(matches!(verify_token(&token, "other"), Err(TokenError::Invalid(_))));
        assert!(matches!(verify_token("not.a.token", "secret"), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let past = (Utc::now() - Duration::hours(SESSION_HOURS + 1)).timestamp() as usize;
        let claims = Claims {
            sub: 1,
            role: Role::Trabajador,
            exp: past,
            iat: past,
            username: "caja".into(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(b"secret")).unwrap();
        assert!(matches!(verify_token(&token, "secret"), Err(TokenError::Invalid(_))));
    }
}
