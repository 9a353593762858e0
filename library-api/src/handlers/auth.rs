use crate::dtos::{role_label, LoginRequest, LoginResponse, SessionInfo, SessionResponse};
use crate::middleware::{extract_token, CurrentUser, ACCESS_TOKEN_COOKIE, USER_ROLE_COOKIE};
use crate::models::{actions, ActivityLog};
use crate::startup::AppState;
use axum::{extract::State, http::HeaderMap, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use library_core::error::AppError;
use serde_json::json;
use validator::Validate;

fn session_cookie(
    name: &'static str,
    value: String,
    max_age_seconds: i64,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(time::Duration::seconds(max_age_seconds))
        .build()
}

/// Expired cookie that overwrites `name` whether or not the request carried it.
fn removal_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, ""))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build();
    cookie.make_removal();
    cookie
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AppError> {
    request.validate()?;

    let session = state.auth.sign_in(&request.email, &request.password).await?;
    let is_admin = state.store.find_admin(session.user.id).await?.is_some();
    let role = role_label(is_admin);

    state
        .record_activity(ActivityLog::new(
            Some(session.user.id),
            actions::AUTH_LOGIN,
            "session",
            None,
            json!({ "is_admin": is_admin }),
        ))
        .await;

    tracing::info!(user_id = %session.user.id, is_admin, "User logged in");

    let secure = state.settings.secure_cookies;
    let jar = jar
        .add(session_cookie(
            ACCESS_TOKEN_COOKIE,
            session.access_token.clone(),
            session.expires_in,
            secure,
        ))
        .add(session_cookie(
            USER_ROLE_COOKIE,
            role.to_string(),
            session.expires_in,
            secure,
        ));

    Ok((
        jar,
        Json(LoginResponse {
            user: session.user,
            session: SessionInfo {
                expires_in: session.expires_in,
                expires_at: chrono::Utc::now().timestamp() + session.expires_in,
            },
            is_admin,
            role,
        }),
    ))
}

/// Always succeeds; revocation failures are only logged.
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> (CookieJar, Json<serde_json::Value>) {
    if let Some(token) = extract_token(&headers) {
        let user_id = state.auth.get_user(&token).await.ok().map(|u| u.id);

        if let Err(e) = state.auth.sign_out(&token).await {
            tracing::warn!(error = %e, "Failed to revoke session at auth provider");
        }

        if user_id.is_some() {
            state
                .record_activity(ActivityLog::new(
                    user_id,
                    actions::AUTH_LOGOUT,
                    "session",
                    None,
                    json!({}),
                ))
                .await;
        }
    }

    let secure = state.settings.secure_cookies;
    let jar = jar
        .add(removal_cookie(ACCESS_TOKEN_COOKIE, secure))
        .add(removal_cookie(USER_ROLE_COOKIE, secure));

    (jar, Json(json!({ "message": "Logged out" })))
}

pub async fn session(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<SessionResponse>, AppError> {
    let is_admin = state.store.find_admin(current.user.id).await?.is_some();

    Ok(Json(SessionResponse {
        authenticated: true,
        user: current.user,
        is_admin,
        role: role_label(is_admin),
    }))
}
