//! Document ingestion: staging uploads, normalizing them to PDF, and pulling
//! auxiliary plain text out of them.

use std::path::Path;

pub mod converter;
pub mod error;
pub mod extractor;
pub mod storage;
pub mod text_pdf;

pub use converter::{FormatConverter, NormalizedDocument, OfficeCommand};
pub use storage::{CleanupGuard, StagedFile, UploadStore};

/// Lowercased extension without the dot, or an empty string when there is none.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
