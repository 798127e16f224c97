//! JWT authentication module.
//!
//! Verifies bearer tokens and turns them into a [`Principal`] (user id +
//! role) that handlers use for attribution and role checks. Tokens are
//! issued by the login service; [`JwtManager::issue_token`] exists for
//! tooling and tests.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use bistro_core::Role;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    /// Staff role
    pub role: Role,

    #[serde(default)]
    pub email: Option<String>,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// JWT token manager (HS256).
pub struct JwtManager {
    secret: String,
    lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: String, lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            lifetime_secs,
        }
    }

    /// Signs a token for `user_id`.
    pub fn issue_token(&self, user_id: &str, role: Role, email: Option<&str>) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.lifetime_secs);

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            email: email.map(str::to_string),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
    }

    /// Validate and decode a token.
    pub fn validate_token(&self, token: &str) -> ApiResult<Claims> {
        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ApiError::Unauthorized(format!("Invalid token: {}", e)))?;

        Ok(token_data.claims)
    }

    /// Resolves a raw token to the caller.
    pub fn principal(&self, token: &str) -> ApiResult<Principal> {
        self.validate_token(token).map(Principal::from)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

// =============================================================================
// Principal
// =============================================================================

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
    pub email: Option<String>,
}

impl From<Claims> for Principal {
    fn from(claims: Claims) -> Self {
        Principal {
            user_id: claims.sub,
            role: claims.role,
            email: claims.email,
        }
    }
}

impl Principal {
    /// Fails with `Forbidden` unless the caller has one of `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> ApiResult<()> {
        if self.role.is_any_of(allowed) {
            Ok(())
        } else {
            warn!(user_id = %self.user_id, role = ?self.role, "Role check failed");
            Err(ApiError::Forbidden(format!(
                "role {:?} may not perform this action",
                self.role
            )))
        }
    }
}

/// Validates the `Authorization: Bearer` header on protected routes.
impl FromRequestParts<AppState> for Principal {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(principal.clone());
        }

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing authorization header".into()))?;
        let token = extract_bearer_token(header)
            .ok_or_else(|| ApiError::Unauthorized("Invalid authorization header".into()))?;

        let principal = state.jwt.principal(token)?;
        debug!(user_id = %principal.user_id, role = ?principal.role, "Authenticated");

        parts.extensions.insert(principal.clone());
        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret".to_string(), 3600);

        let token = manager
            .issue_token("waiter-7", Role::Waiter, Some("w7@bistro.test"))
            .unwrap();
        let principal = manager.principal(&token).unwrap();

        assert_eq!(principal.user_id, "waiter-7");
        assert_eq!(principal.role, Role::Waiter);
        assert_eq!(principal.email.as_deref(), Some("w7@bistro.test"));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtManager::new("secret-a".to_string(), 3600);
        let verifier = JwtManager::new("secret-b".to_string(), 3600);

        let token = issuer.issue_token("u1", Role::Cashier, None).unwrap();
        assert!(matches!(
            verifier.validate_token(&token),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = JwtManager::new("test-secret".to_string(), -3600);
        let token = manager.issue_token("u1", Role::Kitchen, None).unwrap();
        assert!(manager.validate_token(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Basic abc"), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
    }

    #[test]
    fn test_require_role() {
        let waiter = Principal {
            user_id: "w".into(),
            role: Role::Waiter,
            email: None,
        };
        assert!(waiter.require_role(&[Role::Waiter, Role::Manager]).is_ok());
        assert!(matches!(
            waiter.require_role(&[Role::Manager, Role::Admin]),
            Err(ApiError::Forbidden(_))
        ));

        let root = Principal {
            role: Role::SuperAdmin,
            ..waiter
        };
        assert!(root.require_role(&[Role::Manager]).is_ok());
    }
}
