use crate::models::{
    ActivityLog, AdminUser, CatalogStats, Counter, Document, DocumentChanges, DocumentPage,
    DocumentQuery, DocumentStats, DocumentStatus,
};
use async_trait::async_trait;
use library_core::error::AppError;
use uuid::Uuid;

/// Row access for documents and their secondary tables.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Newest first, with the total number of matching rows.
    async fn list_documents(&self, query: &DocumentQuery) -> Result<DocumentPage, AppError>;

    async fn get_document(&self, id: Uuid) -> Result<Option<Document>, AppError>;

    async fn insert_document(&self, document: &Document) -> Result<Document, AppError>;

    /// Returns `None` when no row has this id.
    async fn update_document(
        &self,
        id: Uuid,
        changes: &DocumentChanges,
    ) -> Result<Option<Document>, AppError>;

    async fn set_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
    ) -> Result<Option<Document>, AppError> {
        let mut changes = DocumentChanges::status(status);
        changes.updated_at = Some(chrono::Utc::now());
        self.update_document(id, &changes).await
    }

    async fn increment_counter(&self, id: Uuid, counter: Counter) -> Result<(), AppError>;

    async fn document_stats(&self, id: Uuid) -> Result<Option<DocumentStats>, AppError>;

    async fn catalog_stats(&self) -> Result<CatalogStats, AppError>;

    /// Active administrator row for an auth user, if any.
    async fn find_admin(&self, user_id: Uuid) -> Result<Option<AdminUser>, AppError>;

    async fn log_activity(&self, entry: &ActivityLog) -> Result<(), AppError>;

    async fn health_check(&self) -> Result<(), AppError>;
}
