use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::errors::{AppError, ErrorCode};
use crate::types::auth::{AuthUser, Claims};

const DEV_JWT_SECRET: &str = "development-secret-change-in-production";

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let claims = validate_jwt(&token, &jwt_secret())?;

        if claims.is_expired() {
            return Err(AppError::new(ErrorCode::TokenExpired, "token has expired"));
        }

        Ok(AuthUser::from(claims))
    }
}

/// HS256 secret shared with the identity provider, from `JWT_SECRET`.
pub fn jwt_secret() -> String {
    std::env::var("JWT_SECRET").unwrap_or_else(|_| DEV_JWT_SECRET.to_string())
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::new(ErrorCode::Unauthorized, "invalid authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| AppError::new(ErrorCode::Unauthorized, "authorization header must use Bearer scheme"))
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::new(ErrorCode::TokenExpired, "token has expired")
        }
        _ => AppError::new(ErrorCode::TokenInvalid, format!("invalid token: {e}")),
    })?;

    Ok(token_data.claims)
}

/// Signs claims the way the identity provider does. Used by local tooling
/// and tests.
pub fn sign_jwt(claims: &Claims, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::internal(format!("failed to sign token: {e}")))
}

/// Require Staff or Admin role
pub struct StaffUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for StaffUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_staff() {
            return Err(AppError::forbidden("staff access required"));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::auth::UserRole;
    use axum::http::HeaderValue;
    use uuid::Uuid;

    #[test]
    fn signed_token_round_trips_identity() {
        let profile_id = Uuid::new_v4();
        let claims = Claims::new(profile_id, UserRole::Staff, 3600);
        let token = sign_jwt(&claims, "secret").unwrap();

        let decoded = validate_jwt(&token, "secret").unwrap();
        let user = AuthUser::from(decoded);
        assert_eq!(user.id, profile_id);
        assert!(user.is_staff());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = Claims::new(Uuid::new_v4(), UserRole::Guest, 3600);
        let token = sign_jwt(&claims, "secret").unwrap();

        let err = validate_jwt(&token, "other").unwrap_err();
        assert!(matches!(err, AppError::Known { code: ErrorCode::TokenInvalid, .. }));
    }

    #[test]
    fn bearer_scheme_is_required() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_err());

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc");
    }

    #[test]
    fn guests_are_not_staff() {
        let user = AuthUser::from(Claims::new(Uuid::new_v4(), UserRole::Guest, 60));
        assert!(!user.is_staff());
    }
}
