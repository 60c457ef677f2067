use serde::Serialize;
use sqlx::FromRow;

/// Document metadata row
#[derive(Debug, Clone, FromRow)]
pub struct Document {
    pub id: i64,
    pub filename: String,
    /// Absolute path of the blob; never sent to clients
    pub filepath: String,
    pub filesize: i64,
    pub created_at: String,
}

/// Public view of a document
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DocumentResponse {
    pub id: i64,
    pub filename: String,
    pub filesize: i64,
    pub created_at: String,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            filename: document.filename,
            filesize: document.filesize,
            created_at: document.created_at,
        }
    }
}

/// POST /api/documents/upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub document: DocumentResponse,
}

/// GET /api/documents/
#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<DocumentResponse>,
}

/// DELETE /api/documents/:id
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: i64,
}

/// GET /health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}
