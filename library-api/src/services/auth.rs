use crate::models::{AuthSession, AuthenticatedUser};
use async_trait::async_trait;
use library_core::error::AppError;

/// The platform's auth provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Wrong credentials yield `AppError::Unauthorized`.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AppError>;

    /// Resolve an access token to its user. Invalid or revoked tokens yield `AppError::Unauthorized`.
    async fn get_user(&self, access_token: &str) -> Result<AuthenticatedUser, AppError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}
