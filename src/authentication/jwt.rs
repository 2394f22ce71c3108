use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::error::ApiError;
use crate::schema::{UserRole, Uuid};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    /// Id of the `auth_tokens` row backing this token.
    pub jti: uuid::Uuid,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(user_id: Uuid, jti: uuid::Uuid, ttl_hours: i64) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(ttl_hours)).timestamp();

        Self {
            user_id,
            jti,
            iat,
            exp,
        }
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Utc::now().timestamp()).is_negative()
    }
}

/// An authenticated request: the token was valid and its record still exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub token_id: uuid::Uuid,
    pub role: UserRole,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), ApiError> {
        if !action.authenticate(self) {
            return Err(ApiError::forbidden());
        }
        Ok(())
    }

    /// Object-level check for recipe edits: the author or anyone allowed to manage all recipes.
    pub fn ensure_author(&self, author_id: Uuid) -> Result<(), ApiError> {
        self.authenticate(ActionType::ManageOwnRecipes)?;
        if author_id == self.user_id || ActionType::ManageAllRecipes.authenticate(self) {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, ApiError> {
    Hmac::new_from_slice(secret.as_bytes())
        .map_err(|e| ApiError::Internal(format!("invalid signing key: {e}")))
}

pub fn generate_jwt_session(
    user_id: Uuid,
    jti: uuid::Uuid,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, ApiError> {
    let key = signing_key(secret)?;
    let claims = JwtSessionData::new(user_id, jti, ttl_hours);

    claims
        .sign_with_key(&key)
        .map_err(|e| ApiError::Internal(format!("failed to sign token: {e}")))
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, ApiError> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| ApiError::InvalidToken)?;

    if session.is_expired() {
        return Err(ApiError::InvalidToken);
    }
    Ok(session)
}

/// Extracts the token from an `Authorization: Token <token>` header value.
pub fn parse_token_header(header: &str) -> Result<&str, ApiError> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("token") => Ok(token),
        _ => Err(ApiError::InvalidToken),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_token_verifies() {
        let jti = uuid::Uuid::new_v4();
        let token = generate_jwt_session(7, jti, "secret", 1).unwrap();
        let session = verify_jwt_session(&token, "secret").unwrap();

        assert_eq!(session.user_id, 7);
        assert_eq!(session.jti, jti);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_jwt_session(7, uuid::Uuid::new_v4(), "secret", 1).unwrap();
        assert!(matches!(
            verify_jwt_session(&token, "other"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = generate_jwt_session(7, uuid::Uuid::new_v4(), "secret", -1).unwrap();
        assert!(matches!(
            verify_jwt_session(&token, "secret"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(verify_jwt_session("not.a.token", "secret").is_err());
    }

    #[test]
    fn header_needs_token_scheme() {
        assert_eq!(parse_token_header("Token abc.def").unwrap(), "abc.def");
        assert_eq!(parse_token_header("token abc").unwrap(), "abc");
        assert!(parse_token_header("Bearer abc").is_err());
        assert!(parse_token_header("Token").is_err());
        assert!(parse_token_header("Token a b").is_err());
    }
}
