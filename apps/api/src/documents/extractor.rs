//! Best-effort plain-text extraction for auxiliary storage (search, audit).
//!
//! The LLM never sees this text; it reads the normalized PDF directly. Callers
//! are expected to degrade to an empty string when extraction fails.

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, warn};

use crate::documents::error::ExtractionError;
use crate::documents::file_extension;

/// Maximum decompressed size accepted for `word/document.xml`.
const MAX_DOCX_XML_BYTES: u64 = 50 * 1024 * 1024;

/// Extracts text from a `.pdf`, `.docx` or `.txt` file, dispatching on extension.
pub fn extract_text(path: &Path) -> Result<String, ExtractionError> {
    let extension = file_extension(path);
    let text = match extension.as_str() {
        "pdf" => extract_pdf(&read(path)?)?,
        "docx" => extract_docx(&read(path)?)?,
        "txt" => String::from_utf8(read(path)?)
            .map_err(|_| ExtractionError::Encoding(path.to_path_buf()))?,
        other => return Err(ExtractionError::Unsupported(format!(".{other}"))),
    };
    debug!(
        "Extracted {} chars of text from {}",
        text.len(),
        path.display()
    );
    Ok(text)
}

/// Runs `extract_text` on the blocking pool and swallows failures. The result
/// is safe to bind to a Postgres `TEXT` column, which rejects NUL.
pub async fn extract_text_or_empty(path: &Path) -> String {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || extract_text(&owned)).await {
        Ok(Ok(text)) => strip_nul(text),
        Ok(Err(e)) => {
            warn!("Could not extract text from {}: {e}. Storing empty.", path.display());
            String::new()
        }
        Err(e) => {
            warn!("Text extraction task for {} aborted: {e}", path.display());
            String::new()
        }
    }
}

fn strip_nul(text: String) -> String {
    if text.contains('\0') {
        debug!("Dropping NUL characters from extracted text");
        text.replace('\0', "")
    } else {
        text
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ExtractionError> {
    std::fs::read(path).map_err(|e| ExtractionError::io(path, e))
}

/// Concatenates per-page text without separators. A page whose text cannot be
/// decoded contributes nothing. When no page yields text, pdf-extract gets a
/// second look at the whole document before the result is declared empty.
fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractionError::Pdf(e.to_string()))?;

    let mut text = String::new();
    for page_number in doc.get_pages().keys() {
        text.push_str(&doc.extract_text(&[*page_number]).unwrap_or_default());
    }

    // pdf-extract panics on some malformed inputs
    if text.trim().is_empty() {
        if let Ok(Ok(fallback)) =
            std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        {
            return Ok(fallback.replace('\u{c}', ""));
        }
    }
    Ok(text)
}

/// Joins the text of every `w:p` paragraph with newlines.
fn extract_docx(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractionError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractionError::Docx(e.to_string()))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_DOCX_XML_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractionError::Docx(e.to_string()))?;
    if xml.len() as u64 >= MAX_DOCX_XML_BYTES {
        return Err(ExtractionError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    let mut reader = Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_paragraph = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:p" => {
                in_paragraph = true;
                current.clear();
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"w:p" => paragraphs.push(String::new()),
            Ok(Event::Empty(e)) if in_paragraph && e.name().as_ref() == b"w:tab" => {
                current.push('\t')
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => {
                paragraphs.push(std::mem::take(&mut current));
                in_paragraph = false;
            }
            Ok(Event::Text(e)) if in_paragraph => {
                let value = e
                    .unescape()
                    .map_err(|err| ExtractionError::Docx(err.to_string()))?;
                current.push_str(&value);
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(ExtractionError::Docx(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs.join("\n"))
}
