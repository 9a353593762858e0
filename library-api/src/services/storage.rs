use crate::services::backend::BackendClient;
use async_trait::async_trait;
use axum::body::Bytes;
use library_core::error::AppError;
use reqwest::{Method, StatusCode};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

/// Object storage for document files and cover images.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError>;
    /// Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> Result<(), AppError>;
    /// Publicly reachable URL for `key`.
    fn public_url(&self, key: &str) -> String;
    async fn health_check(&self) -> Result<(), AppError>;
}

fn ensure_relative_key(key: &str) -> Result<(), AppError> {
    let path = Path::new(key);
    let safe = !key.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

    if safe {
        Ok(())
    } else {
        Err(AppError::BadRequest(anyhow::anyhow!(
            "Invalid storage key: {}",
            key
        )))
    }
}

/// Files on local disk, served back by the API under `/files`.
pub struct LocalStorage {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub async fn new(
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, AppError> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
        }
        Ok(Self {
            base_path,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, AppError> {
        ensure_relative_key(key)?;
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, data).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        let path = self.path_for(key)?;
        if path.exists() {
            fs::remove_file(path).await?;
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/files/{}", self.public_base_url, key)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let metadata = fs::metadata(&self.base_path).await?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(AppError::StorageError(anyhow::anyhow!(
                "{} is not a directory",
                self.base_path.display()
            )))
        }
    }
}

/// Bucket in the backend platform's object storage.
pub struct RemoteStorage {
    client: BackendClient,
    bucket: String,
}

impl RemoteStorage {
    pub fn new(client: BackendClient, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn object_url(&self, key: &str) -> String {
        self.client
            .url(&format!("storage/v1/object/{}/{}", self.bucket, key))
    }
}

fn storage_error(operation: &str, key: &str, status: StatusCode, body: &str) -> AppError {
    tracing::error!(operation, key, status = %status, body, "Storage request failed");
    AppError::StorageError(anyhow::anyhow!(
        "{} of {} failed with status {}",
        operation,
        key,
        status
    ))
}

#[async_trait]
impl Storage for RemoteStorage {
    async fn upload(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        ensure_relative_key(key)?;
        let url = self.object_url(key);
        let body = Bytes::from(data);

        let response = self
            .client
            .send("storage_upload", || {
                self.client
                    .service_request(Method::POST, &url)
                    .header(reqwest::header::CONTENT_TYPE, content_type)
                    .header("x-upsert", "false")
                    .body(body.clone())
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(storage_error("upload", key, status, &body));
        }

        tracing::debug!(key, bucket = %self.bucket, "Object uploaded");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        ensure_relative_key(key)?;
        let url = self.object_url(key);

        let response = self
            .client
            .send("storage_delete", || {
                self.client.service_request(Method::DELETE, &url)
            })
            .await?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(storage_error("delete", key, status, &body))
    }

    fn public_url(&self, key: &str) -> String {
        self.client
            .url(&format!("storage/v1/object/public/{}/{}", self.bucket, key))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        let url = self.client.url(&format!("storage/v1/bucket/{}", self.bucket));

        let response = self
            .client
            .send("storage_health", || {
                self.client.service_request(Method::GET, &url)
            })
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AppError::StorageError(anyhow::anyhow!(
                "Bucket {} unavailable: {}",
                self.bucket,
                status
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_storage_round_trip_and_idempotent_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/")
            .await
            .unwrap();

        storage
            .upload("documents/a.pdf", b"%PDF".to_vec(), "application/pdf")
            .await
            .unwrap();
        let path = dir.path().join("documents/a.pdf");
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF");
        assert_eq!(
            storage.public_url("documents/a.pdf"),
            "http://localhost:8080/files/documents/a.pdf"
        );

        storage.delete("documents/a.pdf").await.unwrap();
        storage.delete("documents/a.pdf").await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn local_storage_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost").await.unwrap();

        for key in ["../etc/passwd", "/abs/path", "", "a/../../b"] {
            assert!(
                storage.upload(key, vec![1], "text/plain").await.is_err(),
                "{}",
                key
            );
        }
    }

    #[tokio::test]
    async fn local_storage_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().join("nested"), "http://localhost")
            .await
            .unwrap();
        assert!(storage.health_check().await.is_ok());
    }
}
