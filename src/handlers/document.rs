use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, Result};
use crate::models::{DeleteResponse, DocumentListResponse, HealthResponse, UploadResponse};
use crate::services::document::too_large_message;
use crate::services::{DocumentService, Upload, UploadStream, PDF_MIME};
use crate::AppState;

/// Streams a multipart file field straight into the blob store
struct FieldStream<'a> {
    field: Field<'a>,
    max_size: u64,
}

#[async_trait]
impl<'a> UploadStream for FieldStream<'a> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let max_size = self.max_size;
        self.field
            .chunk()
            .await
            .map_err(|e| multipart_error(e, max_size))
    }
}

fn multipart_error(e: MultipartError, max_size: u64) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::BadRequest(too_large_message(max_size))
    } else {
        AppError::BadRequest(format!("Failed to process multipart: {}", e.body_text()))
    }
}

fn parse_id(id: &str) -> Result<i64> {
    // An id that is not a number can never name a document
    id.parse()
        .map_err(|_| AppError::NotFound("Document not found".to_string()))
}

/// Upload a PDF
/// POST /api/documents/upload
pub async fn upload_document(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!("Rejected upload body: {}", e);
        AppError::BadRequest("No file uploaded".to_string())
    })?;
    let max_size = state.config.storage.max_upload_size;

    // The first field carrying a filename is the upload; anything else is skipped
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_size))?
    {
        let Some(filename) = field.file_name().map(|s| s.to_string()) else {
            continue;
        };
        let content_type = field.content_type().map(|s| s.to_string());

        let upload = Upload {
            filename,
            content_type,
            stream: FieldStream { field, max_size },
        };
        let document = DocumentService::upload(&state.db, &state.blobs, upload, max_size).await?;

        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                message: "File uploaded successfully".to_string(),
                document,
            }),
        ));
    }

    Err(AppError::BadRequest("No file uploaded".to_string()))
}

/// List all documents, newest first
/// GET /api/documents/
pub async fn list_documents(State(state): State<AppState>) -> Result<Json<DocumentListResponse>> {
    let documents = DocumentService::list(&state.db).await?;
    Ok(Json(DocumentListResponse { documents }))
}

/// Download a document
/// GET /api/documents/:id
pub async fn download_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response> {
    let id = parse_id(&id)?;
    let download = DocumentService::download(&state.db, &state.blobs, id).await?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, PDF_MIME)
        .header(header::CONTENT_LENGTH, download.size)
        .header(header::CONTENT_DISPOSITION, content_disposition(&download.filename))
        .body(Body::from_stream(ReaderStream::new(download.file)))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))?;

    Ok(response)
}

/// Delete a document and its file
/// DELETE /api/documents/:id
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let id = parse_id(&id)?;
    let id = DocumentService::delete(&state.db, &state.blobs, id).await?;
    Ok(Json(DeleteResponse {
        message: "Document deleted successfully".to_string(),
        id,
    }))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        message: "Server is running",
    })
}

fn content_disposition(filename: &str) -> String {
    if filename.is_ascii() {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let fallback_name: String = filename
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let encoded_name = urlencoding::encode(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback_name, encoded_name
    )
}
