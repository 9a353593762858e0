pub mod activity;
pub mod admin;
pub mod document;
pub mod stats;

pub use activity::{actions, ActivityLog};
pub use admin::{AdminRole, AdminUser, AuthSession, AuthenticatedUser};
pub use document::{
    Document, DocumentChanges, DocumentMetadata, DocumentPage, DocumentQuery, DocumentStatus,
    DocumentType, StoredFile,
};
pub use stats::{CatalogStats, Counter, DocumentStats};
