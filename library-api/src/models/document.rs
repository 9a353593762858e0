use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Active,
    Deleted,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Active => "active",
            DocumentStatus::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Book,
    Article,
    Thesis,
    Magazine,
    Report,
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Book => "book",
            DocumentType::Article => "article",
            DocumentType::Thesis => "thesis",
            DocumentType::Magazine => "magazine",
            DocumentType::Report => "report",
            DocumentType::Other => "other",
        }
    }
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "book" => Ok(DocumentType::Book),
            "article" => Ok(DocumentType::Article),
            "thesis" => Ok(DocumentType::Thesis),
            "magazine" => Ok(DocumentType::Magazine),
            "report" => Ok(DocumentType::Report),
            "other" => Ok(DocumentType::Other),
            _ => Err(format!("Invalid document type: {}", s)),
        }
    }
}

/// A catalog record: one uploaded file plus its bibliographic metadata.
///
/// Field names follow the `documents` table columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
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
    pub file_path: String,
    pub file_size: i64,
    pub file_type: String,
    pub cover_image_url: Option<String>,
    pub cover_image_path: Option<String>,
    pub created_by: Uuid,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Metadata supplied with an upload.
#[derive(Debug, Clone, Default, Validate)]
pub struct DocumentMetadata {
    #[validate(length(min = 1, max = 255, message = "Title is required (max 255 characters)"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "Author is required (max 255 characters)"))]
    pub author: String,
    #[validate(length(min = 1, max = 100, message = "Category is required (max 100 characters)"))]
    pub category: String,
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

/// Location of a stored object.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: String,
    pub url: String,
    pub size: i64,
    pub content_type: String,
}

impl Document {
    pub fn new(
        id: Uuid,
        metadata: DocumentMetadata,
        document_type: DocumentType,
        file: StoredFile,
        cover: Option<StoredFile>,
        created_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: metadata.title,
            author: metadata.author,
            category: metadata.category,
            document_type,
            description: metadata.description,
            isbn: metadata.isbn,
            editorial: metadata.editorial,
            publication_year: metadata.publication_year,
            pages: metadata.pages,
            language: metadata.language,
            location: metadata.location,
            file_url: file.url,
            file_path: file.path,
            file_size: file.size,
            file_type: file.content_type,
            cover_image_url: cover.as_ref().map(|c| c.url.clone()),
            cover_image_path: cover.map(|c| c.path),
            created_by,
            status: DocumentStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == DocumentStatus::Active
    }
}

/// Partial update of the editable metadata columns. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct DocumentChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub document_type: Option<DocumentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editorial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DocumentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DocumentChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.category.is_none()
            && self.document_type.is_none()
            && self.description.is_none()
            && self.isbn.is_none()
            && self.editorial.is_none()
            && self.publication_year.is_none()
            && self.pages.is_none()
            && self.language.is_none()
            && self.location.is_none()
            && self.status.is_none()
    }

    pub fn status(status: DocumentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn apply_to(&self, document: &mut Document) {
        if let Some(v) = &self.title {
            document.title = v.clone();
        }
        if let Some(v) = &self.author {
            document.author = v.clone();
        }
        if let Some(v) = &self.category {
            document.category = v.clone();
        }
        if let Some(v) = self.document_type {
            document.document_type = v;
        }
        if let Some(v) = &self.description {
            document.description = Some(v.clone());
        }
        if let Some(v) = &self.isbn {
            document.isbn = Some(v.clone());
        }
        if let Some(v) = &self.editorial {
            document.editorial = Some(v.clone());
        }
        if let Some(v) = self.publication_year {
            document.publication_year = Some(v);
        }
        if let Some(v) = self.pages {
            document.pages = Some(v);
        }
        if let Some(v) = &self.language {
            document.language = Some(v.clone());
        }
        if let Some(v) = &self.location {
            document.location = Some(v.clone());
        }
        if let Some(v) = self.status {
            document.status = v;
        }
        document.updated_at = self.updated_at.unwrap_or_else(Utc::now);
    }
}

/// Filters for listing documents. `status: None` means any status.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub page: u64,
    pub limit: u64,
    pub category: Option<String>,
    pub document_type: Option<DocumentType>,
    pub search: Option<String>,
    pub status: Option<DocumentStatus>,
}

impl Default for DocumentQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 12,
            category: None,
            document_type: None,
            search: None,
            status: Some(DocumentStatus::Active),
        }
    }
}

impl DocumentQuery {
    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1).saturating_mul(self.limit)
    }

    /// Stable cache key for this query.
    pub fn cache_key(&self) -> String {
        format!(
            "documents:page={}:limit={}:category={}:type={}:search={}:status={}",
            self.page,
            self.limit,
            self.category.as_deref().unwrap_or(""),
            self.document_type.map(|t| t.as_str()).unwrap_or(""),
            self.search.as_deref().unwrap_or(""),
            self.status.map(|s| s.as_str()).unwrap_or("any"),
        )
    }

    /// In-memory equivalent of the row filter: category and type match exactly
    /// (category case-insensitively), search is a case-insensitive substring of
    /// title, author, or description.
    pub fn matches(&self, document: &Document) -> bool {
        if let Some(status) = self.status {
            if document.status != status {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !document.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(document_type) = self.document_type {
            if document.document_type != document_type {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let hit = document.title.to_lowercase().contains(&needle)
                || document.author.to_lowercase().contains(&needle)
                || document
                    .description
                    .as_deref()
                    .map(|d| d.to_lowercase().contains(&needle))
                    .unwrap_or(false);
            if !hit {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    pub total: u64,
}
