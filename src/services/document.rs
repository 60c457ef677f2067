use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs::File;

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{Document, DocumentResponse};
use crate::storage::{unique_filename, BlobStore, BlobWriter};

/// The only media type accepted for upload
pub const PDF_MIME: &str = "application/pdf";

/// Source of an uploaded file's bytes, consumed chunk by chunk
#[async_trait]
pub trait UploadStream: Send {
    /// Next chunk of the body, or `None` once the file is complete
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;
}

/// A file arriving for upload
pub struct Upload<S> {
    /// Name as supplied by the client
    pub filename: String,
    /// Declared media type
    pub content_type: Option<String>,
    pub stream: S,
}

/// A blob ready to be sent back to the client
#[derive(Debug)]
pub struct DocumentDownload {
    pub filename: String,
    pub size: u64,
    pub file: File,
}

pub fn too_large_message(max_size: u64) -> String {
    format!(
        "File too large. Maximum size is {}MB",
        max_size.div_ceil(1024 * 1024)
    )
}

/// Document service
///
/// Create and delete both touch the blob store first and the metadata row
/// second. The two steps are not atomic: a failed insert leaves an orphaned
/// blob and a failed row delete leaves a stale row. Neither is rolled back.
pub struct DocumentService;

impl DocumentService {
    /// Store an uploaded PDF and record its metadata
    pub async fn upload<S: UploadStream>(
        db: &Database,
        blobs: &BlobStore,
        mut upload: Upload<S>,
        max_size: u64,
    ) -> Result<DocumentResponse> {
        if upload.content_type.as_deref() != Some(PDF_MIME) {
            return Err(AppError::BadRequest("Only PDF files are allowed".to_string()));
        }

        let stored_name = unique_filename(&upload.filename);
        let mut writer = blobs.create(&stored_name).await?;

        if let Err(e) = Self::drain(&mut upload.stream, &mut writer, max_size).await {
            tracing::debug!("Discarding upload {:?}: {}", writer.path(), e);
            writer.abort().await;
            return Err(e);
        }
        let path = writer.finish().await?;

        // Size comes from disk, not from anything the client declared
        let filesize = blobs.size(&path).await?;
        let filepath = path_to_string(&path)?;

        let document: Document = sqlx::query_as(
            r#"
            INSERT INTO documents (filename, filepath, filesize)
            VALUES (?, ?, ?)
            RETURNING id, filename, filepath, filesize, created_at
            "#,
        )
        .bind(&stored_name)
        .bind(&filepath)
        .bind(filesize as i64)
        .fetch_one(db.pool())
        .await
        .map_err(|e| {
            tracing::warn!("Metadata insert failed, blob {:?} is now orphaned", path);
            AppError::Database(e)
        })?;

        tracing::info!(
            id = document.id,
            filename = %document.filename,
            filesize = document.filesize,
            "Document uploaded"
        );
        Ok(DocumentResponse::from(document))
    }

    /// Copy the upload into the writer, stopping as soon as it passes `max_size`
    async fn drain<S: UploadStream>(
        stream: &mut S,
        writer: &mut BlobWriter,
        max_size: u64,
    ) -> Result<()> {
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next_chunk().await? {
            written += chunk.len() as u64;
            if written > max_size {
                return Err(AppError::BadRequest(too_large_message(max_size)));
            }
            writer.write(&chunk).await?;
        }
        Ok(())
    }

    /// All documents, newest first
    pub async fn list(db: &Database) -> Result<Vec<DocumentResponse>> {
        let documents: Vec<Document> = sqlx::query_as(
            "SELECT id, filename, filepath, filesize, created_at FROM documents ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(db.pool())
        .await?;

        Ok(documents.into_iter().map(DocumentResponse::from).collect())
    }

    /// Get a document row by ID
    pub async fn get(db: &Database, id: i64) -> Result<Document> {
        let document: Document = sqlx::query_as(
            "SELECT id, filename, filepath, filesize, created_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(db.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

        Ok(document)
    }

    /// Open a document's blob for streaming
    pub async fn download(db: &Database, blobs: &BlobStore, id: i64) -> Result<DocumentDownload> {
        let document = Self::get(db, id).await?;

        let (file, size) = blobs
            .open(Path::new(&document.filepath))
            .await?
            .ok_or_else(|| {
                tracing::warn!(id, "Blob {} is missing for document", document.filepath);
                AppError::NotFound("File not found on server".to_string())
            })?;

        Ok(DocumentDownload {
            filename: document.filename,
            size,
            file,
        })
    }

    /// Remove a document's blob and then its row. Returns the deleted ID.
    pub async fn delete(db: &Database, blobs: &BlobStore, id: i64) -> Result<i64> {
        let document = Self::get(db, id).await?;
        let path = PathBuf::from(&document.filepath);

        if !blobs.remove(&path).await? {
            tracing::debug!(id, "Blob {:?} was already gone", path);
        }

        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await
            .map_err(|e| {
                tracing::warn!(id, "Row delete failed after blob removal, row is now stale");
                AppError::Database(e)
            })?;

        tracing::info!(id, "Document deleted");
        Ok(id)
    }
}

fn path_to_string(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| AppError::Storage(format!("Blob path is not valid UTF-8: {:?}", path)))
}
