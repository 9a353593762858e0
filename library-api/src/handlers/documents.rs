use crate::dtos::{
    AdminDocumentResponse, DocumentListParams, DocumentListResponse, DocumentResponse,
    DownloadResponse, UpdateDocumentRequest,
};
use crate::handlers::multipart::MultipartForm;
use crate::middleware::AdminContext;
use crate::models::Document;
use crate::startup::AppState;
use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use library_core::error::AppError;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

pub async fn list_documents(
    State(state): State<AppState>,
    Query(params): Query<DocumentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = params.into_public_query()?;
    let cache_key = query.cache_key();

    if let Some(cached) = state.cache.get(&cache_key) {
        tracing::debug!(cache_key = %cache_key, "Serving document listing from cache");
        return Ok(Json(cached));
    }

    let page = state.documents.list(&query).await?;
    let body = serde_json::to_value(DocumentListResponse::<DocumentResponse>::new(page, &query))
        .map_err(|e| AppError::InternalError(e.into()))?;

    state.cache.insert(cache_key, body.clone());
    Ok(Json(body))
}

pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let document = state.documents.get_public(id).await?;
    state.documents.record_view(id).await;
    Ok(Json(DocumentResponse::from(document)))
}

pub async fn download_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let document = state.documents.record_download(id).await?;
    tracing::info!(document_id = %id, "Document download recorded");
    Ok(Json(DownloadResponse::from(document)))
}

pub async fn create_document(
    State(state): State<AppState>,
    admin: AdminContext,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = MultipartForm::read(multipart).await?;

    let file = form
        .take_file("file")
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("No file uploaded")))?;
    let cover = form.take_file("cover");
    let metadata = form.take_metadata()?;

    let upload_sizes: Vec<u64> = std::iter::once(file.size())
        .chain(cover.as_ref().map(|c| c.size()))
        .map(|size| size as u64)
        .collect();

    let document = state
        .documents
        .create(&admin.user, metadata, file, cover)
        .await?;

    for size in upload_sizes {
        state.usage.record_upload(size);
    }
    state.invalidate_catalog_cache();

    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn update_document(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateDocumentRequest>,
) -> Result<Json<Document>, AppError> {
    let request = request.trimmed();
    request.validate()?;

    let document = state
        .documents
        .update(&admin.user, id, request.into())
        .await?;

    state.invalidate_catalog_cache();
    Ok(Json(document))
}

pub async fn delete_document(
    State(state): State<AppState>,
    admin: AdminContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.documents.soft_delete(&admin.user, id).await?;
    state.invalidate_catalog_cache();

    Ok(Json(json!({
        "message": "Document deleted",
        "id": id,
    })))
}

pub async fn admin_list_documents(
    State(state): State<AppState>,
    _admin: AdminContext,
    Query(params): Query<DocumentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = params.into_admin_query()?;
    let page = state.documents.list(&query).await?;
    Ok(Json(DocumentListResponse::<Document>::new(page, &query)))
}

pub async fn admin_get_document(
    State(state): State<AppState>,
    _admin: AdminContext,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let (document, stats) = state.documents.get_admin(id).await?;
    Ok(Json(AdminDocumentResponse { document, stats }))
}
