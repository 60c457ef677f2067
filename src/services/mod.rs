pub mod document;

pub use document::{DocumentService, Upload, UploadStream, PDF_MIME};
