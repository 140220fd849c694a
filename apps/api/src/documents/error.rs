//! Error types for document normalization and extraction.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::llm_client::LlmError;

/// Format normalization failed. The caller must not assume any output file exists.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Unsupported file type for PDF conversion: {0}")]
    Unsupported(String),

    #[error("I/O error converting {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Converter exited with {status}: {stderr}")]
    ConverterFailed { status: String, stderr: String },

    #[error("Conversion timed out after {0:?}")]
    Timeout(Duration),

    #[error("Converter finished but no PDF was produced at {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("Text is not valid UTF-8: {}", .0.display())]
    InvalidText(PathBuf),

    #[error("PDF rendering failed: {0}")]
    Render(String),
}

/// Text or requirement extraction failed.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type for text extraction: {0}")]
    Unsupported(String),

    #[error("I/O error reading {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("Text is not valid UTF-8: {}", .0.display())]
    Encoding(PathBuf),

    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("LLM response is not valid JSON: {0}")]
    MalformedResponse(String),

    #[error("Requirement set is missing required keys: {}", .0.join(", "))]
    MissingKeys(Vec<&'static str>),

    #[error("Invalid requirement list for '{key}': {reason}")]
    InvalidRequirements { key: &'static str, reason: String },
}

impl ConversionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConversionError::Io {
            path: path.into(),
            source,
        }
    }
}

impl ExtractionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractionError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Staging an uploaded file into the upload directory failed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File type not allowed: {0}. Allowed types: pdf, docx, txt")]
    NotAllowed(String),

    #[error("Uploaded file has no name")]
    MissingName,

    #[error("I/O error writing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
