use crate::models::DocumentMetadata;
use crate::services::UploadedFile;
use crate::utils::validation::non_blank;
use axum::extract::Multipart;
use library_core::error::AppError;
use std::collections::HashMap;
use std::str::FromStr;

/// A multipart body split into file parts and text fields.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub files: HashMap<String, UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = MultipartForm::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Failed to read multipart field: {}", e))
        })? {
            let name = field.name().unwrap_or_default().to_string();

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field
                        .content_type()
                        .unwrap_or("application/octet-stream")
                        .to_string();
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| {
                            AppError::BadRequest(anyhow::anyhow!(
                                "Failed to read file '{}': {}",
                                name,
                                e
                            ))
                        })?
                        .to_vec();

                    // Browsers send an empty nameless part for an untouched file input.
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }

                    form.files.insert(
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            data,
                        },
                    );
                }
                None => {
                    let value = field.text().await.map_err(|e| {
                        AppError::BadRequest(anyhow::anyhow!(
                            "Failed to read field '{}': {}",
                            name,
                            e
                        ))
                    })?;
                    form.fields.insert(name, value);
                }
            }
        }

        Ok(form)
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }

    pub fn take_text(&mut self, name: &str) -> Option<String> {
        non_blank(self.fields.remove(name))
    }

    pub fn take_parsed<T>(&mut self, name: &str) -> Result<Option<T>, AppError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.take_text(name)
            .map(|v| {
                v.parse::<T>().map_err(|e| {
                    AppError::BadRequest(anyhow::anyhow!("Invalid value for '{}': {}", name, e))
                })
            })
            .transpose()
    }

    /// Document metadata from the text fields. Missing required fields are
    /// left empty for validation to report.
    pub fn take_metadata(&mut self) -> Result<DocumentMetadata, AppError> {
        Ok(DocumentMetadata {
            title: self.take_text("title").unwrap_or_default(),
            author: self.take_text("author").unwrap_or_default(),
            category: self.take_text("category").unwrap_or_default(),
            document_type: self.take_parsed("type")?,
            description: self.take_text("description"),
            isbn: self.take_text("isbn"),
            editorial: self.take_text("editorial"),
            publication_year: self.take_parsed("publication_year")?,
            pages: self.take_parsed("pages")?,
            language: self.take_text("language"),
            location: self.take_text("location"),
        })
    }
}
