use super::document::{DocumentStatus, DocumentType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Row of `document_stats`: per-document counters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentStats {
    pub document_id: Uuid,
    pub view_count: i64,
    pub download_count: i64,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub last_downloaded_at: Option<DateTime<Utc>>,
}

impl DocumentStats {
    pub fn empty(document_id: Uuid) -> Self {
        Self {
            document_id,
            view_count: 0,
            download_count: 0,
            last_viewed_at: None,
            last_downloaded_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    Views,
    Downloads,
}

impl Counter {
    /// Name of the backend RPC that increments this counter atomically.
    pub fn rpc_name(&self) -> &'static str {
        match self {
            Counter::Views => "increment_view_count",
            Counter::Downloads => "increment_download_count",
        }
    }
}

/// Aggregate figures over the active catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CatalogStats {
    pub total_documents: u64,
    pub deleted_documents: u64,
    pub total_size_bytes: i64,
    pub by_type: BTreeMap<String, u64>,
    pub by_category: BTreeMap<String, u64>,
    pub total_views: i64,
    pub total_downloads: i64,
}

impl CatalogStats {
    /// Fold one document row into the totals. Deleted rows only count towards
    /// `deleted_documents`.
    pub fn record(
        &mut self,
        document_type: DocumentType,
        category: &str,
        file_size: i64,
        status: DocumentStatus,
    ) {
        if status == DocumentStatus::Deleted {
            self.deleted_documents += 1;
            return;
        }
        self.total_documents += 1;
        self.total_size_bytes += file_size;
        *self
            .by_type
            .entry(document_type.as_str().to_string())
            .or_insert(0) += 1;
        *self.by_category.entry(category.to_string()).or_insert(0) += 1;
    }

    pub fn record_counters(&mut self, views: i64, downloads: i64) {
        self.total_views += views;
        self.total_downloads += downloads;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_rows_are_excluded_from_totals() {
        let mut stats = CatalogStats::default();
        stats.record(DocumentType::Book, "Fiction", 100, DocumentStatus::Active);
        stats.record(DocumentType::Book, "Science", 50, DocumentStatus::Active);
        stats.record(DocumentType::Thesis, "Science", 70, DocumentStatus::Deleted);
        stats.record_counters(3, 1);

        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.deleted_documents, 1);
        assert_eq!(stats.total_size_bytes, 150);
        assert_eq!(stats.by_type.get("book"), Some(&2));
        assert_eq!(stats.by_type.get("thesis"), None);
        assert_eq!(stats.by_category.get("Science"), Some(&1));
        assert_eq!(stats.total_views, 3);
    }
}
