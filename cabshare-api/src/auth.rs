use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

/// Resolve the authenticated user from a bearer token. How the token was
/// minted (login, OAuth, session exchange) is someone else's problem; the
/// escrow flow only needs a verified user id.
pub fn authenticate(token: &str, secret: &str) -> Result<Uuid, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(e.to_string()))?;

    Uuid::parse_str(&token_data.claims.sub)
        .map_err(|_| AppError::AuthenticationError("Invalid subject claim".to_string()))
}

/// Extract and verify the bearer token of a request. A missing header is
/// a 401, not the 400 the default header rejection would produce.
pub fn require_user(
    header: Option<TypedHeader<Authorization<Bearer>>>,
    secret: &str,
) -> Result<Uuid, AppError> {
    let TypedHeader(Authorization(bearer)) = header
        .ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;
    authenticate(bearer.token(), secret)
}

/// Mint a token for a user id. Used by tests and local tooling.
pub fn issue_token(user_id: Uuid, secret: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("HS256 signing cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let user = Uuid::new_v4();
        let token = issue_token(user, "test-secret");
        assert_eq!(authenticate(&token, "test-secret").unwrap(), user);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(Uuid::new_v4(), "test-secret");
        assert!(authenticate(&token, "other-secret").is_err());
    }
}
