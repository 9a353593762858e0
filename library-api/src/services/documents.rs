use crate::config::UploadLimits;
use crate::models::{
    actions, ActivityLog, AuthenticatedUser, CatalogStats, Counter, Document, DocumentChanges,
    DocumentMetadata, DocumentPage, DocumentQuery, DocumentStats, DocumentStatus, StoredFile,
};
use crate::services::storage::Storage;
use crate::services::store::DocumentStore;
use crate::utils::validation::{extension_for, normalize_content_type, validate_file, FileKind};
use library_core::error::AppError;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// A file read from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    storage: Arc<dyn Storage>,
    limits: UploadLimits,
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        storage: Arc<dyn Storage>,
        limits: UploadLimits,
    ) -> Self {
        Self {
            store,
            storage,
            limits,
        }
    }

    pub async fn create(
        &self,
        user: &AuthenticatedUser,
        metadata: DocumentMetadata,
        file: UploadedFile,
        cover: Option<UploadedFile>,
    ) -> Result<Document, AppError> {
        metadata.validate()?;
        let document_type = metadata
            .document_type
            .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("Document type is required")))?;

        validate_file(
            FileKind::Document,
            &file.content_type,
            file.size(),
            self.limits.max_document_bytes,
        )?;
        if let Some(cover) = &cover {
            validate_file(
                FileKind::Cover,
                &cover.content_type,
                cover.size(),
                self.limits.max_cover_bytes,
            )?;
        }

        let id = Uuid::new_v4();
        let original_name = file.file_name.clone();

        tracing::info!(
            document_id = %id,
            filename = %original_name,
            size = file.size(),
            has_cover = cover.is_some(),
            "Document upload started"
        );

        let stored_file = self
            .store_object(&object_key(FileKind::Document, id, &file.content_type), file)
            .await?;

        let stored_cover = match cover {
            Some(cover) => {
                let key = object_key(FileKind::Cover, id, &cover.content_type);
                match self.store_object(&key, cover).await {
                    Ok(stored) => Some(stored),
                    Err(e) => {
                        self.cleanup(&[stored_file.path.as_str()], "cover upload failed")
                            .await;
                        return Err(e);
                    }
                }
            }
            None => None,
        };

        let document = Document::new(
            id,
            metadata,
            document_type,
            stored_file,
            stored_cover,
            user.id,
        );

        let saved = match self.store.insert_document(&document).await {
            Ok(saved) => saved,
            Err(e) => {
                tracing::error!(document_id = %id, error = %e, "Failed to insert document row");
                let mut orphans = vec![document.file_path.as_str()];
                if let Some(cover_path) = &document.cover_image_path {
                    orphans.push(cover_path.as_str());
                }
                self.cleanup(&orphans, "database insert failed").await;
                return Err(e);
            }
        };

        self.record_activity(ActivityLog::new(
            Some(user.id),
            actions::DOCUMENT_CREATE,
            "document",
            Some(saved.id.to_string()),
            json!({
                "title": saved.title,
                "file_name": original_name,
                "file_size": saved.file_size,
            }),
        ))
        .await;

        tracing::info!(document_id = %saved.id, "Document upload completed");
        Ok(saved)
    }

    pub async fn update(
        &self,
        user: &AuthenticatedUser,
        id: Uuid,
        mut changes: DocumentChanges,
    ) -> Result<Document, AppError> {
        if changes.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!("No fields to update")));
        }

        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document {} not found", id)))?;

        changes.updated_at = Some(chrono::Utc::now());
        let updated = self
            .store
            .update_document(id, &changes)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document {} not found", id)))?;

        self.record_activity(ActivityLog::new(
            Some(user.id),
            actions::DOCUMENT_UPDATE,
            "document",
            Some(id.to_string()),
            serde_json::to_value(&changes).unwrap_or_default(),
        ))
        .await;

        tracing::info!(document_id = %id, "Document updated");
        Ok(updated)
    }

    /// Mark a document deleted. Files stay in storage.
    pub async fn soft_delete(
        &self,
        user: &AuthenticatedUser,
        id: Uuid,
    ) -> Result<Document, AppError> {
        let existing = self
            .store
            .get_document(id)
            .await?
            .filter(Document::is_active)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document {} not found", id)))?;

        let deleted = self
            .store
            .set_status(id, DocumentStatus::Deleted)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document {} not found", id)))?;

        self.record_activity(ActivityLog::new(
            Some(user.id),
            actions::DOCUMENT_DELETE,
            "document",
            Some(id.to_string()),
            json!({ "title": existing.title }),
        ))
        .await;

        tracing::info!(document_id = %id, "Document soft-deleted");
        Ok(deleted)
    }

    pub async fn get_public(&self, id: Uuid) -> Result<Document, AppError> {
        self.store
            .get_document(id)
            .await?
            .filter(Document::is_active)
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document {} not found", id)))
    }

    /// Any status, with counters.
    pub async fn get_admin(&self, id: Uuid) -> Result<(Document, DocumentStats), AppError> {
        let document = self
            .store
            .get_document(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Document {} not found", id)))?;
        let stats = self
            .store
            .document_stats(id)
            .await?
            .unwrap_or_else(|| DocumentStats::empty(id));
        Ok((document, stats))
    }

    pub async fn list(&self, query: &DocumentQuery) -> Result<DocumentPage, AppError> {
        self.store.list_documents(query).await
    }

    pub async fn catalog_stats(&self) -> Result<CatalogStats, AppError> {
        self.store.catalog_stats().await
    }

    pub async fn record_view(&self, id: Uuid) {
        self.bump(id, Counter::Views).await;
    }

    /// Count a download of an active document and return it.
    pub async fn record_download(&self, id: Uuid) -> Result<Document, AppError> {
        let document = self.get_public(id).await?;
        self.bump(id, Counter::Downloads).await;
        Ok(document)
    }

    /// Store a single file outside of a document, as the standalone upload route does.
    pub async fn upload_file(
        &self,
        kind: FileKind,
        file: UploadedFile,
    ) -> Result<StoredFile, AppError> {
        let max_bytes = match kind {
            FileKind::Document => self.limits.max_document_bytes,
            FileKind::Cover => self.limits.max_upload_cover_bytes,
        };
        validate_file(kind, &file.content_type, file.size(), max_bytes)?;

        let key = object_key(kind, Uuid::new_v4(), &file.content_type);
        self.store_object(&key, file).await
    }

    async fn store_object(&self, key: &str, file: UploadedFile) -> Result<StoredFile, AppError> {
        let size = file.size() as i64;
        let content_type = normalize_content_type(&file.content_type);

        if let Err(e) = self.storage.upload(key, file.data, &content_type).await {
            tracing::error!(key, error = %e, "Failed to upload object");
            // The store may have created a partial object.
            self.cleanup(&[key], "upload failed").await;
            return Err(e);
        }

        Ok(StoredFile {
            path: key.to_string(),
            url: self.storage.public_url(key),
            size,
            content_type,
        })
    }

    async fn cleanup(&self, keys: &[&str], reason: &str) {
        for key in keys {
            tracing::warn!(key, reason, "Cleaning up uploaded object");
            if let Err(e) = self.storage.delete(key).await {
                tracing::error!(key, error = %e, "Cleanup failed, object may be orphaned");
            }
        }
    }

    async fn bump(&self, id: Uuid, counter: Counter) {
        if let Err(e) = self.store.increment_counter(id, counter).await {
            tracing::warn!(document_id = %id, counter = counter.rpc_name(), error = %e, "Failed to increment counter");
        }
    }

    async fn record_activity(&self, entry: ActivityLog) {
        if let Err(e) = self.store.log_activity(&entry).await {
            tracing::warn!(action = %entry.action, error = %e, "Failed to write activity log");
        }
    }
}

fn object_key(kind: FileKind, id: Uuid, content_type: &str) -> String {
    format!("{}/{}.{}", kind.prefix(), id, extension_for(content_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;
    use crate::services::memory::MemoryStore;
    use crate::services::storage::LocalStorage;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Storage that records calls and can fail uploads for chosen prefixes.
    #[derive(Default)]
    struct RecordingStorage {
        fail_prefix: Option<&'static str>,
        uploaded: Mutex<Vec<String>>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Storage for RecordingStorage {
        async fn upload(&self, key: &str, _data: Vec<u8>, _ct: &str) -> Result<(), AppError> {
            if self.fail_prefix.is_some_and(|p| key.starts_with(p)) {
                return Err(AppError::StorageError(anyhow::anyhow!("bucket unavailable")));
            }
            self.uploaded.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), AppError> {
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://cdn.example.org/{}", key)
        }

        async fn health_check(&self) -> Result<(), AppError> {
            Ok(())
        }
    }

    fn user() -> AuthenticatedUser {
        AuthenticatedUser {
            id: Uuid::new_v4(),
            email: Some("admin@example.org".to_string()),
        }
    }

    fn metadata() -> DocumentMetadata {
        DocumentMetadata {
            title: "On Computable Numbers".to_string(),
            author: "Alan Turing".to_string(),
            category: "Mathematics".to_string(),
            document_type: Some(DocumentType::Article),
            publication_year: Some(1936),
            pages: Some(36),
            ..Default::default()
        }
    }

    fn pdf() -> UploadedFile {
        UploadedFile {
            file_name: "turing.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            data: b"%PDF-1.4 test".to_vec(),
        }
    }

    fn png() -> UploadedFile {
        UploadedFile {
            file_name: "cover.png".to_string(),
            content_type: "image/png".to_string(),
            data: vec![0x89, b'P', b'N', b'G'],
        }
    }

    #[tokio::test]
    async fn create_stores_file_and_row_and_logs_activity() {
        let store = Arc::new(MemoryStore::new());
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(
            LocalStorage::new(dir.path(), "http://localhost:8080")
                .await
                .unwrap(),
        );
        let service = DocumentService::new(store.clone(), storage, UploadLimits::default());

        let document = service
            .create(&user(), metadata(), pdf(), Some(png()))
            .await
            .unwrap();

        assert!(document.is_active());
        assert_eq!(document.file_type, "application/pdf");
        assert!(dir.path().join(&document.file_path).exists());
        assert!(dir
            .path()
            .join(document.cover_image_path.as_deref().unwrap())
            .exists());
        assert_eq!(store.activity()[0].action, actions::DOCUMENT_CREATE);
    }

    #[tokio::test]
    async fn failed_insert_deletes_orphaned_files() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_inserts(true);
        let storage = Arc::new(RecordingStorage::default());
        let service =
            DocumentService::new(store.clone(), storage.clone(), UploadLimits::default());

        let result = service.create(&user(), metadata(), pdf(), Some(png())).await;

        assert!(matches!(result, Err(AppError::BackendError(_))));
        let uploaded = storage.uploaded.lock().unwrap().clone();
        let mut deleted = storage.deleted.lock().unwrap().clone();
        deleted.sort();
        let mut expected = uploaded.clone();
        expected.sort();
        assert_eq!(uploaded.len(), 2);
        assert_eq!(deleted, expected);
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn failed_cover_upload_deletes_document_file() {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(RecordingStorage {
            fail_prefix: Some("covers/"),
            ..Default::default()
        });
        let service =
            DocumentService::new(store.clone(), storage.clone(), UploadLimits::default());

        let result = service.create(&user(), metadata(), pdf(), Some(png())).await;

        assert!(matches!(result, Err(AppError::StorageError(_))));
        let uploaded = storage.uploaded.lock().unwrap().clone();
        let deleted = storage.deleted.lock().unwrap().clone();
        assert_eq!(uploaded.len(), 1);
        assert!(uploaded[0].starts_with("documents/"));
        // the partial cover key, then the document file
        assert_eq!(deleted.len(), 2);
        assert!(deleted.iter().any(|k| k.starts_with("covers/")));
        assert!(deleted.contains(&uploaded[0]));
        assert_eq!(store.document_count(), 0);
    }

    #[tokio::test]
    async fn rejects_invalid_input_before_touching_storage() {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(RecordingStorage::default());
        let service =
            DocumentService::new(store.clone(), storage.clone(), UploadLimits::default());

        let mut missing_title = metadata();
        missing_title.title = String::new();
        assert!(matches!(
            service.create(&user(), missing_title, pdf(), None).await,
            Err(AppError::ValidationError(_))
        ));

        let mut missing_type = metadata();
        missing_type.document_type = None;
        assert!(matches!(
            service.create(&user(), missing_type, pdf(), None).await,
            Err(AppError::BadRequest(_))
        ));

        let mut bad_year = metadata();
        bad_year.publication_year = Some(999);
        assert!(service.create(&user(), bad_year, pdf(), None).await.is_err());

        let exe = UploadedFile {
            content_type: "application/x-msdownload".to_string(),
            ..pdf()
        };
        assert!(matches!(
            service.create(&user(), metadata(), exe, None).await,
            Err(AppError::BadRequest(_))
        ));

        let big_cover = UploadedFile {
            data: vec![0; 5 * 1024 * 1024 + 1],
            ..png()
        };
        assert!(service
            .create(&user(), metadata(), pdf(), Some(big_cover))
            .await
            .is_err());

        assert!(storage.uploaded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn soft_delete_hides_document_from_public_reads() {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(RecordingStorage::default());
        let service = DocumentService::new(store.clone(), storage, UploadLimits::default());
        let admin = user();

        let document = service.create(&admin, metadata(), pdf(), None).await.unwrap();
        service.soft_delete(&admin, document.id).await.unwrap();

        assert!(matches!(
            service.get_public(document.id).await,
            Err(AppError::NotFound(_))
        ));
        let page = service.list(&DocumentQuery::default()).await.unwrap();
        assert_eq!(page.total, 0);

        let (fetched, _) = service.get_admin(document.id).await.unwrap();
        assert_eq!(fetched.status, DocumentStatus::Deleted);

        assert!(matches!(
            service.soft_delete(&admin, document.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn update_rejects_empty_and_unknown() {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(RecordingStorage::default());
        let service = DocumentService::new(store, storage, UploadLimits::default());
        let admin = user();

        let document = service.create(&admin, metadata(), pdf(), None).await.unwrap();

        assert!(matches!(
            service
                .update(&admin, document.id, DocumentChanges::default())
                .await,
            Err(AppError::BadRequest(_))
        ));

        let changes = DocumentChanges {
            title: Some("Computable Numbers".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(&admin, Uuid::new_v4(), changes.clone()).await,
            Err(AppError::NotFound(_))
        ));

        let updated = service.update(&admin, document.id, changes).await.unwrap();
        assert_eq!(updated.title, "Computable Numbers");
        assert_eq!(updated.author, "Alan Turing");
    }

    #[tokio::test]
    async fn counters_are_recorded() {
        let store = Arc::new(MemoryStore::new());
        let storage = Arc::new(RecordingStorage::default());
        let service = DocumentService::new(store, storage, UploadLimits::default());

        let document = service.create(&user(), metadata(), pdf(), None).await.unwrap();
        service.record_view(document.id).await;
        service.record_view(document.id).await;
        service.record_download(document.id).await.unwrap();

        let (_, stats) = service.get_admin(document.id).await.unwrap();
        assert_eq!(stats.view_count, 2);
        assert_eq!(stats.download_count, 1);
    }
}
