// src/pdf_extract.rs

use crate::error::{Result, TallyError};
use lopdf::Document;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Result of attempting to extract text from a PDF.
#[derive(Debug)]
pub enum PdfContent {
    /// The PDF contains extractable text.
    Text(String),
    /// The PDF appears to be scanned / image-only and needs OCR.
    ScannedImage,
    /// Something went wrong during extraction.
    Error(String),
}

/// Receipts are short; anything under this many non-whitespace characters
/// is treated as a scan with a stray text layer.
const MIN_TEXT_CHARS: usize = 10;

/// Takes raw PDF bytes and returns `PdfContent`.
pub fn extract_text_from_pdf(pdf_bytes: &[u8]) -> PdfContent {
    // --- Phase 1: structural check with lopdf ---
    let doc = match Document::load_mem(pdf_bytes) {
        Ok(d) => d,
        Err(e) => return PdfContent::Error(format!("Failed to parse PDF: {e}")),
    };

    if looks_like_scanned(&doc) {
        info!("PDF structural check: likely scanned / image-only");
        return PdfContent::ScannedImage;
    }

    // --- Phase 2: full text extraction ---
    match ::pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => {
            let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
            if meaningful < MIN_TEXT_CHARS {
                info!(chars = meaningful, "Extracted text too short — treating as scanned");
                PdfContent::ScannedImage
            } else {
                info!(chars = meaningful, "Text extracted successfully");
                PdfContent::Text(text)
            }
        }
        Err(e) => {
            warn!(error = %e, "pdf-extract failed — may be scanned or corrupted");
            PdfContent::ScannedImage
        }
    }
}

/// Every page an image without fonts means a scan.
fn looks_like_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false;
    }

    let mut image_only_pages = 0;

    for object_id in pages.values() {
        let Ok(page_dict) = doc.get_dictionary(*object_id) else {
            continue;
        };

        let resources = page_dict
            .get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok());

        let has_entries = |key: &[u8]| {
            resources
                .and_then(|res| res.get(key).ok())
                .and_then(|o| doc.dereference(o).ok())
                .and_then(|(_, resolved)| resolved.as_dict().ok())
                .is_some_and(|d| !d.is_empty())
        };

        if has_entries(&b"XObject"[..]) && !has_entries(&b"Font"[..]) {
            image_only_pages += 1;
        }
    }

    let total = pages.len();
    let ratio = image_only_pages as f64 / total as f64;
    info!(
        total_pages = total,
        image_only = image_only_pages,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );

    ratio >= 0.8
}

/// Whether `path` looks like a receipt document we know how to read.
pub fn is_receipt_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf") || e.eq_ignore_ascii_case("txt"))
}

/// Read a receipt document as text.
///
/// Plain-text receipts are returned as-is. PDFs go through
/// [`extract_text_from_pdf`]; scanned or broken PDFs yield `Ok(None)` since
/// OCR is out of reach here. A missing file is an error.
pub fn read_document(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Err(TallyError::MissingInput(path.to_path_buf()));
    }

    let is_pdf = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"));

    if !is_pdf {
        // Non-UTF-8 bytes become U+FFFD; the rest of the receipt stays usable.
        let bytes = fs::read(path)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        info!(chars = text.len(), "Read plain-text receipt");
        return Ok(Some(text));
    }

    let bytes = fs::read(path)?;
    match extract_text_from_pdf(&bytes) {
        PdfContent::Text(text) => Ok(Some(text)),
        PdfContent::ScannedImage => {
            warn!("PDF is scanned — no text layer to parse");
            Ok(None)
        }
        PdfContent::Error(e) => {
            warn!(error = %e, "Failed to read PDF");
            Ok(None)
        }
    }
}
