//! Bearer-token extractors for axum handlers.
//!
//! Any router state works as long as the [`JwtService`] can be pulled out of
//! it with `FromRef`.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use mentorhub_common::{AppError, UserRole};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jwt::{Claims, JwtService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub roles: Vec<UserRole>,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(UserRole::Admin)
    }
}

impl TryFrom<Claims> for AuthenticatedUser {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            user_id: claims.user_id()?,
            username: claims.username,
            email: claims.email,
            roles: claims.roles,
        })
    }
}

pub fn extract_token_from_headers(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Authentication("Missing Authorization header".to_string()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            AppError::Authentication("Invalid Authorization format. Expected: Bearer <token>".to_string())
        })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    JwtService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jwt_service = JwtService::from_ref(state);
        let token = extract_token_from_headers(&parts.headers)?;
        let claims = jwt_service
            .validate_token(token)
            .map_err(|_| AppError::Authentication("Invalid or expired token".to_string()))?;

        AuthenticatedUser::try_from(claims)
    }
}

/// Requires the `admin` role. Rejects with 403 otherwise.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    JwtService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Authorization("Admin role required".to_string()));
        }
        Ok(RequireAdmin(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};
    use mentorhub_common::JwtConfig;

    fn service() -> JwtService {
        JwtService::new(JwtConfig {
            secret: "extractor-secret".to_string(),
            expiration_hours: 1,
            issuer: "mentorhub".to_string(),
        })
    }

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn valid_bearer_token_yields_the_user() {
        let jwt = service();
        let user_id = Uuid::new_v4();
        let token = jwt.issue(user_id, "alice", "alice@example.com", vec![UserRole::Mentee]).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));

        let user = AuthenticatedUser::from_request_parts(&mut parts, &jwt).await.unwrap();
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.username, "alice");
        assert!(!user.is_admin());
    }

    #[tokio::test]
    async fn missing_or_malformed_headers_are_unauthenticated() {
        let jwt = service();

        let err = AuthenticatedUser::from_request_parts(&mut parts_with(None), &jwt)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);

        let err = AuthenticatedUser::from_request_parts(&mut parts_with(Some("Token abc")), &jwt)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 401);
    }

    #[tokio::test]
    async fn admin_extractor_rejects_regular_users() {
        let jwt = service();
        let token = jwt.issue(Uuid::new_v4(), "bob", "", vec![UserRole::Mentor]).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));

        let err = RequireAdmin::from_request_parts(&mut parts, &jwt).await.unwrap_err();
        assert_eq!(err.status_code(), 403);

        let token = jwt.issue(Uuid::new_v4(), "root", "", vec![UserRole::Admin]).unwrap();
        let mut parts = parts_with(Some(&format!("Bearer {}", token)));
        assert!(RequireAdmin::from_request_parts(&mut parts, &jwt).await.is_ok());
    }
}
