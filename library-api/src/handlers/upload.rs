use crate::dtos::UploadResponse;
use crate::handlers::multipart::MultipartForm;
use crate::middleware::AdminContext;
use crate::startup::AppState;
use crate::utils::validation::FileKind;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use library_core::error::AppError;

/// Store a single file (`kind` = `document` or `cover`) and return where it lives.
pub async fn upload_file(
    State(state): State<AppState>,
    admin: AdminContext,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = MultipartForm::read(multipart).await?;

    let kind = form
        .take_parsed::<FileKind>("kind")?
        .unwrap_or(FileKind::Document);
    let file = form
        .take_file("file")
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No file uploaded")))?;

    tracing::info!(
        user_id = %admin.user.id,
        kind = kind.prefix(),
        filename = %file.file_name,
        size = file.size(),
        "Standalone upload started"
    );

    let stored = state.documents.upload_file(kind, file).await?;
    state.usage.record_upload(stored.size as u64);

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse::new(stored, kind.label())),
    ))
}
