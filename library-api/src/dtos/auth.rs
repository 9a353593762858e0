use crate::models::AuthenticatedUser;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub expires_in: i64,
    pub expires_at: i64,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: AuthenticatedUser,
    pub session: SessionInfo,
    pub is_admin: bool,
    pub role: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    pub user: AuthenticatedUser,
    pub is_admin: bool,
    pub role: &'static str,
}

/// Value of the `user_role` cookie.
pub fn role_label(is_admin: bool) -> &'static str {
    if is_admin {
        "admin"
    } else {
        "user"
    }
}
