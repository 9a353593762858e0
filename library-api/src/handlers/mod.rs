pub mod auth;
pub mod documents;
pub mod health;
pub mod multipart;
pub mod stats;
pub mod upload;

pub use auth::{login, logout, session};
pub use documents::{
    admin_get_document, admin_list_documents, create_document, delete_document,
    download_document, get_document, list_documents, update_document,
};
pub use health::{health_check, metrics_endpoint, readiness_check};
pub use stats::get_stats;
pub use upload::upload_file;
