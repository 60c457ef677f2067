use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::naming::is_plain_name;

/// Local directory holding one file per uploaded document
#[derive(Debug, Clone)]
pub struct BlobStore {
    base_path: PathBuf,
}

impl BlobStore {
    /// The directory itself is created lazily, on the first write
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Open a new blob for writing. Fails if `name` already exists.
    pub async fn create(&self, name: &str) -> Result<BlobWriter> {
        if !is_plain_name(name) {
            return Err(AppError::Storage(format!("Invalid blob name: {:?}", name)));
        }

        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create upload directory '{}': {}",
                self.base_path.display(),
                e
            ))
        })?;

        let path = self.base_path.join(name);
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                AppError::Storage(format!("Failed to create blob {}: {}", path.display(), e))
            })?;

        Ok(BlobWriter { path, file })
    }

    /// Open a blob for reading along with its current size, or `None` if it is gone
    pub async fn open(&self, path: &Path) -> Result<Option<(fs::File, u64)>> {
        let file = match fs::File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::Storage(format!(
                    "Failed to open blob {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let size = file.metadata().await?.len();
        Ok(Some((file, size)))
    }

    /// Size of a blob as recorded by the filesystem
    pub async fn size(&self, path: &Path) -> Result<u64> {
        let metadata = fs::metadata(path).await.map_err(|e| {
            AppError::Storage(format!("Failed to stat blob {}: {}", path.display(), e))
        })?;
        Ok(metadata.len())
    }

    /// Remove a blob. Returns `false` when there was nothing to remove.
    pub async fn remove(&self, path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!("Deleted blob {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to delete blob {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// A blob being written. Call `finish` to keep it or `abort` to discard it.
#[derive(Debug)]
pub struct BlobWriter {
    path: PathBuf,
    file: fs::File,
}

impl BlobWriter {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await.map_err(|e| {
            AppError::Storage(format!("Failed to write blob {}: {}", self.path.display(), e))
        })
    }

    /// Flush everything to disk and hand back the blob path
    pub async fn finish(mut self) -> Result<PathBuf> {
        let flushed = match self.file.flush().await {
            Ok(()) => self.file.sync_all().await,
            Err(e) => Err(e),
        };

        if let Err(e) = flushed {
            let err = AppError::Storage(format!(
                "Failed to flush blob {}: {}",
                self.path.display(),
                e
            ));
            self.abort().await;
            return Err(err);
        }

        tracing::debug!("Saved blob to {:?}", self.path);
        Ok(self.path)
    }

    /// Drop the partially written file
    pub async fn abort(self) {
        let BlobWriter { path, file } = self;
        drop(file);
        match fs::remove_file(&path).await {
            Ok(()) => tracing::debug!("Discarded partial blob {:?}", path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to discard partial blob {:?}: {}", path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (BlobStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = BlobStore::new(dir.path().join("uploads"));
        (store, dir)
    }

    #[tokio::test]
    async fn creates_directory_on_first_write() {
        let (store, _dir) = test_store();
        assert!(!store.base_path().exists());

        let mut writer = store.create("1-1-a.pdf").await.unwrap();
        writer.write(b"%PDF-1").await.unwrap();
        let path = writer.finish().await.unwrap();

        assert!(store.base_path().is_dir());
        assert_eq!(path, store.base_path().join("1-1-a.pdf"));
        assert_eq!(store.size(&path).await.unwrap(), 6);
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1");
    }

    #[tokio::test]
    async fn abort_removes_partial_file() {
        let (store, _dir) = test_store();

        let mut writer = store.create("1-1-partial.pdf").await.unwrap();
        writer.write(b"half").await.unwrap();
        let path = writer.path().to_path_buf();
        assert!(path.exists());

        writer.abort().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn refuses_existing_or_unsafe_names() {
        let (store, _dir) = test_store();

        let writer = store.create("1-1-a.pdf").await.unwrap();
        writer.finish().await.unwrap();

        assert!(store.create("1-1-a.pdf").await.is_err());
        assert!(store.create("../escape.pdf").await.is_err());
        assert!(store.create("").await.is_err());
    }

    #[tokio::test]
    async fn open_reports_missing_blob_as_none() {
        let (store, _dir) = test_store();
        let missing = store.base_path().join("missing.pdf");
        assert!(store.open(&missing).await.unwrap().is_none());

        let mut writer = store.create("1-1-b.pdf").await.unwrap();
        writer.write(b"abc").await.unwrap();
        let path = writer.finish().await.unwrap();

        let (_, size) = store.open(&path).await.unwrap().unwrap();
        assert_eq!(size, 3);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (store, _dir) = test_store();

        let writer = store.create("1-1-c.pdf").await.unwrap();
        let path = writer.finish().await.unwrap();

        assert!(store.remove(&path).await.unwrap());
        assert!(!path.exists());
        assert!(!store.remove(&path).await.unwrap());
    }
}
