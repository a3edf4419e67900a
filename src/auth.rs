use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::{errors::ServiceError, AppState};

/// JWT claims issued by the identity collaborator. This service only
/// validates tokens; account management lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
}

/// The authenticated customer driving a checkout or an admin session.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

impl AuthenticatedUser {
    fn from_claims(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            name: claims.name,
            email: claims.email,
        }
    }
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, ServiceError> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| ServiceError::AuthError(format!("token rejected: {}", e)))
}

/// Issues a token for the given user. Used by tests and local tooling;
/// production tokens come from the identity service.
pub fn encode_token(
    user_id: Uuid,
    name: &str,
    email: &str,
    secret: &str,
    ttl_secs: i64,
) -> Result<String, ServiceError> {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id,
        name: name.to_string(),
        email: email.to_string(),
        iat: now as usize,
        exp: (now + ttl_secs) as usize,
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::new(Algorithm::HS256),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::AuthError(format!("token encode failed: {}", e)))
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthenticatedUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;
        let claims = decode_token(token, &state.config.jwt_secret)?;
        Ok(AuthenticatedUser::from_claims(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit_test_secret_key_that_is_definitely_long_enough_for_hs256_use";

    #[test]
    fn round_trips_a_valid_token() {
        let user_id = Uuid::new_v4();
        let token = encode_token(user_id, "Asha", "asha@example.com", SECRET, 3600).unwrap();
        let claims = decode_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "asha@example.com");
    }

    #[test]
    fn rejects_expired_tokens() {
        let token = encode_token(Uuid::new_v4(), "Asha", "a@example.com", SECRET, -120).unwrap();
        assert!(decode_token(&token, SECRET).is_err());
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let token = encode_token(Uuid::new_v4(), "Asha", "a@example.com", SECRET, 3600).unwrap();
        assert!(decode_token(&token, "a_completely_different_secret_of_sufficient_length_0000").is_err());
    }
}
