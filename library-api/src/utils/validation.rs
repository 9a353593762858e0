use library_core::error::AppError;

/// MIME types accepted for catalog documents.
pub const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/epub+zip",
    "text/plain",
];

/// MIME types accepted for cover images.
pub const COVER_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Document,
    Cover,
}

impl FileKind {
    pub fn allowed_types(&self) -> &'static [&'static str] {
        match self {
            FileKind::Document => DOCUMENT_MIME_TYPES,
            FileKind::Cover => COVER_MIME_TYPES,
        }
    }

    /// Storage key prefix for this kind of object.
    pub fn prefix(&self) -> &'static str {
        match self {
            FileKind::Document => "documents",
            FileKind::Cover => "covers",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FileKind::Document => "document",
            FileKind::Cover => "cover image",
        }
    }
}

impl std::str::FromStr for FileKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "document" | "file" => Ok(FileKind::Document),
            "cover" | "image" => Ok(FileKind::Cover),
            _ => Err(format!("Invalid upload kind: {}", s)),
        }
    }
}

/// Lowercased MIME essence without parameters (`text/plain; charset=utf-8` → `text/plain`).
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

pub fn validate_file(
    kind: FileKind,
    content_type: &str,
    size: usize,
    max_bytes: usize,
) -> Result<(), AppError> {
    let content_type = normalize_content_type(content_type);

    if !kind.allowed_types().contains(&content_type.as_str()) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Unsupported {} type '{}'. Allowed: {}",
            kind.label(),
            content_type,
            kind.allowed_types().join(", ")
        )));
    }

    if size == 0 {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "The {} is empty",
            kind.label()
        )));
    }

    if size > max_bytes {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "The {} is too large ({} bytes, max {}MB)",
            kind.label(),
            size,
            max_bytes / (1024 * 1024)
        )));
    }

    Ok(())
}

pub fn extension_for(content_type: &str) -> &'static str {
    match normalize_content_type(content_type).as_str() {
        "application/pdf" => "pdf",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/epub+zip" => "epub",
        "text/plain" => "txt",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "bin",
    }
}

/// Trimmed value, or `None` when blank.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: usize = 1024 * 1024;

    #[test]
    fn accepts_exactly_the_document_allow_list() {
        for mime in DOCUMENT_MIME_TYPES {
            assert!(validate_file(FileKind::Document, mime, 10, 50 * MB).is_ok(), "{}", mime);
        }
        for mime in ["image/png", "application/zip", "text/html", "application/x-msdownload"] {
            assert!(validate_file(FileKind::Document, mime, 10, 50 * MB).is_err(), "{}", mime);
        }
    }

    #[test]
    fn accepts_exactly_the_cover_allow_list() {
        for mime in COVER_MIME_TYPES {
            assert!(validate_file(FileKind::Cover, mime, 10, 5 * MB).is_ok(), "{}", mime);
        }
        for mime in ["image/gif", "image/svg+xml", "application/pdf"] {
            assert!(validate_file(FileKind::Cover, mime, 10, 5 * MB).is_err(), "{}", mime);
        }
    }

    #[test]
    fn ignores_content_type_parameters_and_case() {
        assert!(validate_file(FileKind::Document, "Text/Plain; charset=utf-8", 10, MB).is_ok());
    }

    #[test]
    fn enforces_size_ceiling() {
        assert!(validate_file(FileKind::Document, "application/pdf", 50 * MB, 50 * MB).is_ok());
        let err = validate_file(FileKind::Document, "application/pdf", 50 * MB + 1, 50 * MB)
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(validate_file(FileKind::Cover, "image/png", 5 * MB + 1, 5 * MB).is_err());
        assert!(validate_file(FileKind::Cover, "image/png", 5 * MB + 1, 10 * MB).is_ok());
    }

    #[test]
    fn rejects_empty_files() {
        assert!(validate_file(FileKind::Document, "application/pdf", 0, MB).is_err());
    }

    #[test]
    fn maps_extensions() {
        assert_eq!(extension_for("application/pdf"), "pdf");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/octet-stream"), "bin");
    }
}
