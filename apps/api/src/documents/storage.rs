//! Upload directory management.
//!
//! Originals are staged as `<uuid-hex>.<ext>` directly under the root; normalized
//! PDFs go to `<root>/processed`. The client-supplied filename is never used as
//! a path component.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{info, warn};
use uuid::Uuid;

use crate::documents::error::StorageError;
use crate::documents::file_extension;

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "docx", "txt"];

const PROCESSED_DIR: &str = "processed";

/// An uploaded file written to disk under a generated name.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    pub original_name: String,
    pub extension: String,
    pub byte_size: u64,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination directory for `FormatConverter` output.
    pub fn processed_dir(&self) -> PathBuf {
        self.root.join(PROCESSED_DIR)
    }

    /// Creates the root and processed directories if missing.
    pub async fn ensure_dirs(&self) -> Result<(), StorageError> {
        let processed = self.processed_dir();
        tokio::fs::create_dir_all(&processed)
            .await
            .map_err(|e| StorageError::io(&processed, e))
    }

    /// Validates the client filename and writes `bytes` under a fresh name.
    ///
    /// The bytes land in a temp file inside the root first and are renamed into
    /// place, so a crash never leaves a half-written `<uuid>.<ext>` behind.
    pub async fn stage(&self, original_name: &str, bytes: &[u8]) -> Result<StagedFile, StorageError> {
        let original_name = sanitize_name(original_name).ok_or(StorageError::MissingName)?;
        let extension = file_extension(Path::new(&original_name));
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(StorageError::NotAllowed(original_name));
        }

        let stored_name = format!("{}.{extension}", Uuid::new_v4().simple());
        let target = self.root.join(stored_name);
        let root = self.root.clone();
        let data = bytes.to_vec();
        let byte_size = data.len() as u64;

        let path = target.clone();
        tokio::task::spawn_blocking(move || write_atomically(&root, &path, &data))
            .await
            .map_err(|e| StorageError::io(&target, std::io::Error::other(e)))??;

        info!(
            "Staged upload '{}' as {} ({byte_size} bytes)",
            original_name,
            target.display()
        );
        Ok(StagedFile {
            path: target,
            original_name,
            extension,
            byte_size,
        })
    }
}

fn write_atomically(root: &Path, target: &Path, data: &[u8]) -> Result<(), StorageError> {
    let mut tmp = NamedTempFile::new_in(root).map_err(|e| StorageError::io(root, e))?;
    tmp.write_all(data).map_err(|e| StorageError::io(tmp.path(), e))?;
    tmp.persist(target)
        .map_err(|e| StorageError::io(target, e.error))?;
    Ok(())
}

/// Keeps only the final path component of a client-supplied filename.
fn sanitize_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}

/// Removes tracked files on drop unless disarmed.
///
/// Ingestion tracks each intermediate file as it is produced and disarms only
/// after the database commit succeeds.
#[derive(Debug, Default)]
pub struct CleanupGuard {
    paths: Vec<PathBuf>,
    armed: bool,
}

impl CleanupGuard {
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            armed: true,
        }
    }

    pub fn track(&mut self, path: impl Into<PathBuf>) {
        self.paths.push(path.into());
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for path in &self.paths {
            match std::fs::remove_file(path) {
                Ok(()) => info!("Cleaned up {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to clean up {}: {e}", path.display()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stage_uses_generated_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());
        store.ensure_dirs().await.unwrap();

        let staged = store.stage("Jane Doe CV.PDF", b"%PDF-1.4").await.unwrap();
        assert_eq!(staged.original_name, "Jane Doe CV.PDF");
        assert_eq!(staged.extension, "pdf");
        assert_eq!(staged.byte_size, 8);
        assert_eq!(staged.path.parent(), Some(dir.path()));

        let stem = staged.path.file_stem().unwrap().to_str().unwrap();
        assert_eq!(stem.len(), 32);
        assert!(Uuid::parse_str(stem).is_ok());
        assert_eq!(std::fs::read(&staged.path).unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_stage_rejects_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let err = store.stage("bundle.zip", b"PK").await.unwrap_err();
        assert!(matches!(err, StorageError::NotAllowed(ref name) if name == "bundle.zip"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_stage_strips_client_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path());

        let staged = store.stage("../../etc/notes.txt", b"hello").await.unwrap();
        assert_eq!(staged.original_name, "notes.txt");
        assert_eq!(staged.path.parent(), Some(dir.path()));
    }

    #[test]
    fn test_sanitize_name_rejects_empty() {
        assert_eq!(sanitize_name(""), None);
        assert_eq!(sanitize_name("dir/"), None);
        assert_eq!(sanitize_name(r"C:\cvs\a.docx").as_deref(), Some("a.docx"));
    }

    #[test]
    fn test_cleanup_guard_removes_tracked_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        std::fs::write(&a, b"x").unwrap();
        {
            let mut guard = CleanupGuard::new();
            guard.track(&a);
            guard.track(dir.path().join("never-created.pdf"));
        }
        assert!(!a.exists());
    }

    #[test]
    fn test_disarmed_guard_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        std::fs::write(&a, b"x").unwrap();

        let mut guard = CleanupGuard::new();
        guard.track(&a);
        guard.disarm();
        assert!(a.exists());
    }
}
