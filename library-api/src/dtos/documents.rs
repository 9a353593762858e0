use crate::models::{
    Document, DocumentChanges, DocumentPage, DocumentQuery, DocumentStats, DocumentStatus,
    DocumentType, StoredFile,
};
use crate::utils::validation::non_blank;
use chrono::{DateTime, Utc};
use library_core::error::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_PAGE_SIZE: u64 = 12;
pub const MAX_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE: u64 = 10_000;

/// Public view of a document. Storage paths and ownership stay internal.
#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub category: String,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub description: Option<String>,
    pub isbn: Option<String>,
    pub editorial: Option<String>,
    pub publication_year: Option<i32>,
    pub pages: Option<i32>,
    pub language: Option<String>,
    pub location: Option<String>,
    pub file_url: String,
    pub file_size: i64,
    pub file_type: String,
    pub cover_image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            title: doc.title,
            author: doc.author,
            category: doc.category,
            document_type: doc.document_type,
            description: doc.description,
            isbn: doc.isbn,
            editorial: doc.editorial,
            publication_year: doc.publication_year,
            pages: doc.pages,
            language: doc.language,
            location: doc.location,
            file_url: doc.file_url,
            file_size: doc.file_size,
            file_type: doc.file_type,
            cover_image_url: doc.cover_image_url,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminDocumentResponse {
    #[serde(flatten)]
    pub document: Document,
    pub stats: DocumentStats,
}

#[derive(Debug, Deserialize, Default)]
pub struct DocumentListParams {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub document_type: Option<String>,
    pub search: Option<String>,
    /// Admin listing only: `active`, `deleted`, or `all`.
    pub status: Option<String>,
}

impl DocumentListParams {
    /// Query over active documents. Any `status` parameter is ignored.
    pub fn into_public_query(self) -> Result<DocumentQuery, AppError> {
        let mut query = self.into_query()?;
        query.status = Some(DocumentStatus::Active);
        Ok(query)
    }

    /// Query honouring `status`; defaults to every status.
    pub fn into_admin_query(self) -> Result<DocumentQuery, AppError> {
        let status = match non_blank(self.status.clone()).as_deref() {
            None | Some("all") => None,
            Some("active") => Some(DocumentStatus::Active),
            Some("deleted") => Some(DocumentStatus::Deleted),
            Some(other) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Invalid status filter: {}",
                    other
                )))
            }
        };
        let mut query = self.into_query()?;
        query.status = status;
        Ok(query)
    }

    fn into_query(self) -> Result<DocumentQuery, AppError> {
        let document_type = non_blank(self.document_type)
            .map(|t| t.parse::<DocumentType>())
            .transpose()
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!(e)))?;

        let page = self.page.unwrap_or(1).max(1);
        if page > MAX_PAGE {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "page must be at most {}",
                MAX_PAGE
            )));
        }

        Ok(DocumentQuery {
            page,
            limit: self
                .limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
            category: non_blank(self.category),
            document_type,
            search: non_blank(self.search),
            status: Some(DocumentStatus::Active),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Pagination {
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, limit: u64, total: u64) -> Self {
        Self {
            page,
            limit,
            total,
            total_pages: total.div_ceil(limit.max(1)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse<T> {
    pub documents: Vec<T>,
    pub pagination: Pagination,
}

impl<T: From<Document>> DocumentListResponse<T> {
    pub fn new(page: DocumentPage, query: &DocumentQuery) -> Self {
        Self {
            documents: page.documents.into_iter().map(T::from).collect(),
            pagination: Pagination::new(query.page, query.limit, page.total),
        }
    }
}

/// Metadata edit. Omitted fields are left unchanged.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDocumentRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub document_type: Option<DocumentType>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 20))]
    pub isbn: Option<String>,
    #[validate(length(max = 255))]
    pub editorial: Option<String>,
    #[validate(range(min = 1000, max = 2100))]
    pub publication_year: Option<i32>,
    #[validate(range(min = 1))]
    pub pages: Option<i32>,
    #[validate(length(max = 50))]
    pub language: Option<String>,
    #[validate(length(max = 255))]
    pub location: Option<String>,
}

impl UpdateDocumentRequest {
    /// Trims the required text fields so whitespace-only values fail `length(min = 1)`.
    pub fn trimmed(mut self) -> Self {
        for field in [&mut self.title, &mut self.author, &mut self.category] {
            if let Some(value) = field.as_mut() {
                *value = value.trim().to_string();
            }
        }
        self
    }
}

impl From<UpdateDocumentRequest> for DocumentChanges {
    fn from(req: UpdateDocumentRequest) -> Self {
        Self {
            title: req.title,
            author: req.author,
            category: req.category,
            document_type: req.document_type,
            description: req.description,
            isbn: req.isbn,
            editorial: req.editorial,
            publication_year: req.publication_year,
            pages: req.pages,
            language: req.language,
            location: req.location,
            status: None,
            updated_at: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
    pub id: Uuid,
    pub file_url: String,
    pub file_type: String,
    pub file_size: i64,
}

impl From<Document> for DownloadResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            file_url: doc.file_url,
            file_type: doc.file_type,
            file_size: doc.file_size,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
    pub path: String,
    pub size: i64,
    pub content_type: String,
    pub kind: String,
}

impl UploadResponse {
    pub fn new(file: StoredFile, kind: &str) -> Self {
        Self {
            url: file.url,
            path: file.path,
            size: file.size,
            content_type: file.content_type,
            kind: kind.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_params_are_clamped_and_defaulted() {
        let query = DocumentListParams {
            page: Some(0),
            limit: Some(1000),
            category: Some("  ".to_string()),
            ..Default::default()
        }
        .into_public_query()
        .unwrap();

        assert_eq!(query.page, 1);
        assert_eq!(query.limit, MAX_PAGE_SIZE);
        assert_eq!(query.category, None);
        assert_eq!(query.status, Some(DocumentStatus::Active));

        let query = DocumentListParams::default().into_public_query().unwrap();
        assert_eq!(query.limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn public_query_ignores_status() {
        let query = DocumentListParams {
            status: Some("deleted".to_string()),
            ..Default::default()
        }
        .into_public_query()
        .unwrap();
        assert_eq!(query.status, Some(DocumentStatus::Active));
    }

    #[test]
    fn admin_query_honours_status() {
        let all = DocumentListParams::default().into_admin_query().unwrap();
        assert_eq!(all.status, None);

        let deleted = DocumentListParams {
            status: Some("deleted".to_string()),
            ..Default::default()
        }
        .into_admin_query()
        .unwrap();
        assert_eq!(deleted.status, Some(DocumentStatus::Deleted));

        assert!(DocumentListParams {
            status: Some("archived".to_string()),
            ..Default::default()
        }
        .into_admin_query()
        .is_err());
    }

    #[test]
    fn rejects_unknown_type() {
        let result = DocumentListParams {
            document_type: Some("poster".to_string()),
            ..Default::default()
        }
        .into_public_query();
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn rejects_pages_past_the_ceiling() {
        let result = DocumentListParams {
            page: Some(u64::MAX),
            limit: Some(MAX_PAGE_SIZE),
            ..Default::default()
        }
        .into_public_query();
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let last = DocumentListParams {
            page: Some(MAX_PAGE),
            limit: Some(MAX_PAGE_SIZE),
            ..Default::default()
        }
        .into_public_query()
        .unwrap();
        assert_eq!(last.offset(), (MAX_PAGE - 1) * MAX_PAGE_SIZE);
    }

    #[test]
    fn offset_saturates_instead_of_overflowing() {
        let query = DocumentQuery {
            page: u64::MAX,
            limit: MAX_PAGE_SIZE,
            ..Default::default()
        };
        assert_eq!(query.offset(), u64::MAX);
    }

    #[test]
    fn blank_required_fields_fail_validation_after_trimming() {
        let request: UpdateDocumentRequest =
            serde_json::from_str(r#"{"title":"   ","author":" Ursula "}"#).unwrap();
        assert!(request.trimmed().validate().is_err());

        let request: UpdateDocumentRequest =
            serde_json::from_str(r#"{"author":" Ursula ","category":"\tFiction "}"#).unwrap();
        let request = request.trimmed();
        assert!(request.validate().is_ok());

        let changes = DocumentChanges::from(request);
        assert_eq!(changes.author.as_deref(), Some("Ursula"));
        assert_eq!(changes.category.as_deref(), Some("Fiction"));
        assert_eq!(changes.title, None);
    }

    #[test]
    fn pagination_rounds_up() {
        assert_eq!(Pagination::new(1, 12, 25).total_pages, 3);
        assert_eq!(Pagination::new(1, 12, 0).total_pages, 0);
    }
}
