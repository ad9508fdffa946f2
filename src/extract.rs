//! PDF text extraction.
//!
//! Wraps `pdf-extract` to pull per-page text out of PDF bytes. Only PDF
//! input is supported; anything else fails with a parse error before any
//! embedding or indexing happens.

use anyhow::Result;

/// True when the bytes carry the `%PDF-` magic header.
pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// Extract the text of each page of a PDF, in page order.
///
/// Index `i` of the result is page `i + 1`. Pages with no extractable text
/// come back as empty strings so page numbering stays aligned.
pub fn extract_pdf_pages(bytes: &[u8]) -> Result<Vec<String>> {
    pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| anyhow::anyhow!("failed to parse PDF: {}", e))
}
