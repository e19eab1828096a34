//! Per-page PDF text extraction.
//!
//! Extraction is pipeline-layer: the chunker consumes ordered per-page texts,
//! so this module must preserve page granularity. The primary extractor is
//! `pdf-extract`; when it fails the document is retried page-by-page with
//! `lopdf`. Only when both fail does the document yield an error — an empty
//! page list is a valid result that the ingestion ledger records as an error.

use std::path::Path;

use lopdf::{Dictionary, Document, Object};

use crate::models::DocumentInfo;

/// Text of a single page, tagged with its 1-based page number.
///
/// Pages whose extracted text is empty after trimming are dropped, so page
/// numbers in a document's page list are not necessarily contiguous.
#[derive(Debug, Clone)]
pub struct PageText {
    pub page: u32,
    pub text: String,
}

/// Extraction error: both the primary and the fallback extractor failed.
#[derive(Debug)]
pub enum ExtractError {
    Pdf { primary: String, fallback: String },
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Pdf { primary, fallback } => {
                write!(
                    f,
                    "PDF extraction failed: {} (fallback: {})",
                    primary, fallback
                )
            }
        }
    }
}

impl std::error::Error for ExtractError {}

/// Extract the ordered per-page texts of one document.
///
/// Returns one [`PageText`] per page that produced non-empty text. An empty
/// vector means the document parsed but contained no extractable text
/// (scanned or garbled PDFs); callers record that outcome, not this module.
pub fn extract_pages(path: &Path) -> Result<Vec<PageText>, ExtractError> {
    match pdf_extract::extract_text_by_pages(path) {
        Ok(pages) => Ok(pages
            .into_iter()
            .enumerate()
            .filter_map(|(i, text)| {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(PageText {
                        page: (i + 1) as u32,
                        text: trimmed.to_string(),
                    })
                }
            })
            .collect()),
        Err(primary) => extract_pages_lopdf(path).map_err(|fallback| ExtractError::Pdf {
            primary: primary.to_string(),
            fallback,
        }),
    }
}

/// Fallback extractor: walk the page tree with lopdf and extract text one
/// page at a time, so a single corrupt page does not sink the document.
fn extract_pages_lopdf(path: &Path) -> Result<Vec<PageText>, String> {
    let doc = Document::load(path).map_err(|e| e.to_string())?;
    let mut pages = Vec::new();
    for page in doc.get_pages().keys() {
        let text = match doc.extract_text(&[*page]) {
            Ok(t) => t,
            Err(_) => continue,
        };
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            pages.push(PageText {
                page: *page,
                text: trimmed.to_string(),
            });
        }
    }
    Ok(pages)
}

/// Read document-level metadata (title, author, page count, file size).
///
/// Metadata failure is never fatal: anything unreadable defaults to empty.
pub fn read_document_info(path: &Path) -> DocumentInfo {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);

    let mut info = DocumentInfo {
        filename,
        filepath: path.display().to_string(),
        file_size,
        ..Default::default()
    };

    if let Ok(doc) = Document::load(path) {
        info.num_pages = doc.get_pages().len();
        if let Some(dict) = info_dictionary(&doc) {
            info.title = string_value(dict, b"Title");
            info.author = string_value(dict, b"Author");
            info.subject = string_value(dict, b"Subject");
            info.creator = string_value(dict, b"Creator");
        }
    }

    info
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    let obj = doc.trailer.get(b"Info").ok()?;
    let obj = match obj {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    obj.as_dict().ok()
}

fn string_value(dict: &Dictionary, key: &[u8]) -> String {
    match dict.get(key) {
        Ok(Object::String(bytes, _)) => decode_pdf_string(bytes),
        _ => String::new(),
    }
}

/// PDF text strings are either UTF-16BE with a BOM or (mostly) Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&utf16)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn invalid_pdf_returns_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"not a pdf").unwrap();
        let err = extract_pages(f.path()).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf { .. }));
    }

    #[test]
    fn missing_file_returns_error() {
        let err = extract_pages(Path::new("/nonexistent/file.pdf")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("fallback"));
    }

    #[test]
    fn document_info_defaults_for_unreadable_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"garbage").unwrap();
        let info = read_document_info(f.path());
        assert_eq!(info.file_size, 7);
        assert_eq!(info.title, "");
        assert_eq!(info.num_pages, 0);
    }

    #[test]
    fn utf16_pdf_string_decoded() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_pdf_string(&bytes), "Hi");
    }
}
