//! Format normalization: every supported upload becomes a PDF on disk.
//!
//! - `.pdf`: pass-through (byte copy unless source and destination coincide)
//! - word-processor formats: headless office suite, bounded by a timeout
//! - `.txt`: rendered line by line with `text_pdf`

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::documents::error::ConversionError;
use crate::documents::file_extension;
use crate::documents::text_pdf::render_text_pdf;

/// Format of the document before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Pdf,
    WordProcessor,
    Text,
}

impl SourceFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "pdf" => Some(SourceFormat::Pdf),
            "docx" | "doc" | "odt" | "rtf" => Some(SourceFormat::WordProcessor),
            "txt" => Some(SourceFormat::Text),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Pdf => "pdf",
            SourceFormat::WordProcessor => "word_processor",
            SourceFormat::Text => "text",
        }
    }
}

/// A PDF produced by `FormatConverter`. Read-only for every later stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    pub path: PathBuf,
    pub source_format: SourceFormat,
    pub byte_size: u64,
}

/// How to invoke the office suite. The converter appends
/// `--headless --convert-to pdf --outdir <dir> <source>`.
#[derive(Debug, Clone)]
pub struct OfficeCommand {
    pub program: String,
    pub leading_args: Vec<String>,
}

impl OfficeCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FormatConverter {
    office: OfficeCommand,
    timeout: Duration,
}

impl FormatConverter {
    pub fn new(office: OfficeCommand, timeout: Duration) -> Self {
        Self { office, timeout }
    }

    /// Converts `source` into `<output_dir>/<stem>.pdf`.
    ///
    /// Unsupported extensions fail before anything touches the filesystem. On any
    /// later failure a partially written target is removed.
    pub async fn convert(
        &self,
        source: &Path,
        output_dir: &Path,
    ) -> Result<NormalizedDocument, ConversionError> {
        let extension = file_extension(source);
        let source_format = SourceFormat::from_extension(&extension)
            .ok_or_else(|| ConversionError::Unsupported(format!(".{extension}")))?;
        let stem = source
            .file_stem()
            .ok_or_else(|| ConversionError::Unsupported(source.display().to_string()))?;

        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| ConversionError::io(output_dir, e))?;

        let target = output_dir.join(format!("{}.pdf", stem.to_string_lossy()));
        info!(
            "Converting {} ({}) to PDF at {}",
            source.display(),
            source_format.as_str(),
            target.display()
        );

        let result = match source_format {
            SourceFormat::Pdf => copy_pdf(source, &target).await,
            SourceFormat::WordProcessor => self.run_office(source, output_dir, &target).await,
            SourceFormat::Text => render_text_file(source, &target).await,
        };

        if let Err(e) = result {
            error!("Conversion of {} failed: {e}", source.display());
            if source_format != SourceFormat::Pdf || !same_file(source, &target).await {
                remove_partial(&target).await;
            }
            return Err(e);
        }

        let byte_size = tokio::fs::metadata(&target)
            .await
            .map_err(|e| ConversionError::io(&target, e))?
            .len();
        info!("Converted {} to {} ({byte_size} bytes)", source.display(), target.display());

        Ok(NormalizedDocument {
            path: target,
            source_format,
            byte_size,
        })
    }

    async fn run_office(
        &self,
        source: &Path,
        output_dir: &Path,
        target: &Path,
    ) -> Result<(), ConversionError> {
        let mut command = Command::new(&self.office.program);
        command
            .args(&self.office.leading_args)
            .args(["--headless", "--convert-to", "pdf", "--outdir"])
            .arg(output_dir)
            .arg(source)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(|e| ConversionError::io(source, e))?,
            Err(_) => return Err(ConversionError::Timeout(self.timeout)),
        };

        if !output.status.success() {
            return Err(ConversionError::ConverterFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        // Some converters exit 0 without writing anything.
        if !tokio::fs::try_exists(target).await.unwrap_or(false) {
            return Err(ConversionError::MissingOutput(target.to_path_buf()));
        }
        Ok(())
    }
}

async fn copy_pdf(source: &Path, target: &Path) -> Result<(), ConversionError> {
    if same_file(source, target).await {
        info!("{} is already in place, skipping copy", source.display());
        return Ok(());
    }
    tokio::fs::copy(source, target)
        .await
        .map_err(|e| ConversionError::io(source, e))?;
    Ok(())
}

async fn render_text_file(source: &Path, target: &Path) -> Result<(), ConversionError> {
    let bytes = tokio::fs::read(source)
        .await
        .map_err(|e| ConversionError::io(source, e))?;
    let text =
        String::from_utf8(bytes).map_err(|_| ConversionError::InvalidText(source.to_path_buf()))?;

    let pdf = tokio::task::spawn_blocking(move || render_text_pdf(&text))
        .await
        .map_err(|e| ConversionError::Render(e.to_string()))??;

    tokio::fs::write(target, pdf)
        .await
        .map_err(|e| ConversionError::io(target, e))
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (
        tokio::fs::canonicalize(a).await,
        tokio::fs::canonicalize(b).await,
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

async fn remove_partial(target: &Path) {
    match tokio::fs::remove_file(target).await {
        Ok(()) => warn!("Removed partial conversion output {}", target.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {e}", target.display()),
    }
}
