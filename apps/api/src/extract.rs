//! PDF text extraction for uploaded resumes.

use std::path::{Path, PathBuf};

use lopdf::Document;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Failed to open document {path}: {source}")]
    DocumentOpen { path: PathBuf, source: lopdf::Error },

    #[error("Failed to extract text from page {page}: {source}")]
    PageExtraction { page: u32, source: lopdf::Error },
}

/// Extracts the text of every page of a PDF, concatenated in page order
/// with no separator inserted between pages.
///
/// Fails with `DocumentOpen` when the path is missing or the file is not
/// parseable as a PDF, and with `PageExtraction` when any single page
/// cannot be decoded. A page failure aborts the whole extraction; pages
/// are never skipped. The document handle lives only inside this call and
/// is released on every exit path.
pub fn extract_text(path: &Path) -> Result<String, ExtractError> {
    let doc = Document::load(path).map_err(|source| ExtractError::DocumentOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let mut text = String::new();
    for page_number in doc.get_pages().keys() {
        let page_text = doc
            .extract_text(&[*page_number])
            .map_err(|source| ExtractError::PageExtraction {
                page: *page_number,
                source,
            })?;
        text.push_str(&page_text);
    }
    Ok(text)
}
