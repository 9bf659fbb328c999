/// Authentication and authorization
///
/// Identity arrives as a bearer JWT issued by the upstream identity
/// provider. The first successful verification provisions the account row.
/// [`AdminAuthContext`] is the admin gateway: it rejects before any handler
/// runs unless the caller is an admin AND matches the configured superadmin
/// email.
use crate::{
    context::AppContext,
    db::models::{Account, AccountStatus, Role},
    error::{AppError, AppResult},
};
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Clock skew tolerance for token validation, in seconds
const TOKEN_LEEWAY_SECS: u64 = 300;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Account id
    pub sub: String,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Create a signed token (used by tests and tooling)
pub fn create_token(claims: &Claims, secret: &str) -> AppResult<String> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
}

/// Verify a token and return its claims
pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = TOKEN_LEEWAY_SECS;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token expired".to_string())
        }
        _ => AppError::Unauthorized("Invalid token".to_string()),
    })?;

    Ok(data.claims)
}

/// Authenticated caller, account provisioned on first sight
pub struct AuthContext {
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Unauthorized("Invalid authorization header".to_string()))?;

        let claims = verify_token(token, &state.config.auth.jwt_secret)?;
        let role = Role::parse(&claims.role)
            .map_err(|_| AppError::Unauthorized("Invalid token role".to_string()))?;

        let account = state
            .accounts
            .ensure_account(&claims.sub, &claims.email, role)
            .await?;

        if account.status != AccountStatus::Active {
            return Err(AppError::Forbidden(format!(
                "Account is {}",
                account.status.as_str()
            )));
        }

        Ok(AuthContext { account })
    }
}

/// Admin gateway predicate: admin role plus the configured superadmin email
///
/// Both conditions are required; an admin-role account with any other email
/// is turned away like a regular user.
pub fn authorize_admin(account: &Account, superadmin_email: &str) -> AppResult<()> {
    if !account.is_admin() || account.email != superadmin_email {
        return Err(AppError::Forbidden("Admin access required".to_string()));
    }

    Ok(())
}

/// Admin gateway: admin role plus the configured superadmin email
pub struct AdminAuthContext {
    pub account: Account,
}

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for AdminAuthContext {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        let AuthContext { account } = AuthContext::from_request_parts(parts, state).await?;

        if let Err(e) = authorize_admin(&account, &state.config.auth.superadmin_email) {
            tracing::warn!(account_id = %account.id, "Admin gateway rejected caller");
            return Err(e);
        }

        Ok(AdminAuthContext { account })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const SECRET: &str = "test-secret-test-secret-test-secret!";

    fn claims(exp_offset_secs: i64) -> Claims {
        let now = Utc::now().timestamp();
        Claims {
            sub: "acct-1".to_string(),
            email: "user@example.com".to_string(),
            role: "user".to_string(),
            iat: now,
            exp: now + exp_offset_secs,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let token = create_token(&claims(3600), SECRET).unwrap();
        let verified = verify_token(&token, SECRET).unwrap();

        assert_eq!(verified.sub, "acct-1");
        assert_eq!(verified.role, "user");
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = create_token(&claims(-3600), SECRET).unwrap();

        assert!(matches!(
            verify_token(&token, SECRET),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = create_token(&claims(3600), SECRET).unwrap();

        assert!(matches!(
            verify_token(&token, "another-secret-another-secret-yes!"),
            Err(AppError::Unauthorized(_))
        ));
    }

    fn account(role: Role, email: &str) -> Account {
        Account {
            id: "acct-1".to_string(),
            email: email.to_string(),
            role,
            image_credits: 0,
            video_credits: 0,
            total_granted: 0,
            total_used: 0,
            status: AccountStatus::Active,
            status_reason: None,
            status_actor: None,
            status_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_admin_gateway_accepts_superadmin() {
        let account = account(Role::Admin, "root@example.com");
        authorize_admin(&account, "root@example.com").unwrap();
    }

    #[test]
    fn test_admin_gateway_rejects_admin_with_other_email() {
        let account = account(Role::Admin, "ops@example.com");
        assert!(matches!(
            authorize_admin(&account, "root@example.com"),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn test_admin_gateway_rejects_non_admin_with_matching_email() {
        let account = account(Role::User, "root@example.com");
        assert!(matches!(
            authorize_admin(&account, "root@example.com"),
            Err(AppError::Forbidden(_))
        ));
    }
}
