//! Bearer-token authentication against the auth provider and admin checks
//! against the administrators table.

use crate::models::{AdminUser, AuthenticatedUser};
use crate::startup::AppState;
use crate::utils::jwt;
use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::{header, request::Parts, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use library_core::error::AppError;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const USER_ROLE_COOKIE: &str = "user_role";

/// The caller, as resolved from its access token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: AuthenticatedUser,
    pub token: String,
}

/// A caller holding an active administrator row.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub user: AuthenticatedUser,
    pub admin: AdminUser,
}

/// `Authorization: Bearer` first, then the `access_token` cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(ACCESS_TOKEN_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|t| !t.is_empty())
    })
}

pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<CurrentUser, AppError> {
    let token = extract_token(headers).ok_or_else(|| {
        AppError::Unauthorized(anyhow::anyhow!("Missing authentication token"))
    })?;

    // Expired tokens never reach the provider.
    jwt::ensure_not_expired(&token)?;

    let user = state.auth.get_user(&token).await?;

    tracing::Span::current().record("user_id", tracing::field::display(user.id));

    Ok(CurrentUser { user, token })
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let current = authenticate(&state, req.headers()).await?;
    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}

/// Re-checks the administrators table on every call; nothing is cached.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let current = authenticate(&state, req.headers()).await?;

    let admin = state
        .store
        .find_admin(current.user.id)
        .await?
        .ok_or_else(|| {
            tracing::warn!(user_id = %current.user.id, path = %req.uri().path(), "Non-admin user denied");
            AppError::Forbidden(anyhow::anyhow!("Administrator access required"))
        })?;

    req.extensions_mut().insert(AdminContext {
        user: current.user.clone(),
        admin,
    });
    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminContext>()
            .cloned()
            .ok_or_else(|| AppError::Forbidden(anyhow::anyhow!("Administrator access required")))
    }
}
