pub mod auth;

pub use auth::{
    authenticate, extract_token, require_admin, require_auth, AdminContext, CurrentUser,
    ACCESS_TOKEN_COOKIE, USER_ROLE_COOKIE,
};
