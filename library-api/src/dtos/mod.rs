pub mod auth;
pub mod documents;

pub use auth::{role_label, LoginRequest, LoginResponse, SessionInfo, SessionResponse};
pub use documents::{
    AdminDocumentResponse, DocumentListParams, DocumentListResponse, DocumentResponse,
    DownloadResponse, Pagination, UpdateDocumentRequest, UploadResponse,
};
