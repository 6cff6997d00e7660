//! Text extraction contract and page assembly.
//!
//! Extractors turn a file into page strings; they decide how to read the
//! format. This module owns the policy around them: file type checks,
//! per-page failure tolerance, progress reporting and reflowing wrapped
//! lines into paragraphs.

use crate::cancellation::CancellationToken;
use crate::error::ExtractionError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\n[ \t]*(\p{Ll})").unwrap());
static RE_PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n\s*").unwrap());
static RE_LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\n[ \t]*").unwrap());
static RE_HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());

/// A source of page text, e.g. a PDF toolchain wrapper.
pub trait TextExtractor {
    /// Whether this extractor understands the file at all.
    fn supports(&self, path: &Path) -> bool;

    fn page_count(&self, path: &Path) -> Result<usize, ExtractionError>;

    /// Raw text of one page, 1-based.
    fn extract_page(&self, path: &Path, page: usize) -> Result<String, ExtractionError>;

    /// All pages, each independently successful or failed.
    fn extract_pages(
        &self,
        path: &Path,
    ) -> Result<Vec<Result<String, ExtractionError>>, ExtractionError> {
        let total = self.page_count(path)?;
        Ok((1..=total)
            .map(|page| self.extract_page(path, page))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Reflowed pages joined by blank lines.
    pub text: String,
    pub pages_total: usize,
    pub pages_failed: usize,
}

/// Extract, reflow and join every readable page of `path`.
///
/// Pages that fail are logged and skipped; the call only fails when no page
/// produced any text.
pub fn extract_document<E, P>(
    extractor: &E,
    path: &Path,
    cancel: Option<&CancellationToken>,
    mut progress: P,
) -> Result<ExtractedDocument, ExtractionError>
where
    E: TextExtractor + ?Sized,
    P: FnMut(&str, Option<f64>),
{
    if !extractor.supports(path) {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_else(|| path.display().to_string());
        return Err(ExtractionError::UnsupportedFileType(ext));
    }

    let total = extractor.page_count(path)?;
    info!(path = %path.display(), pages = total, "Extracting document text");
    progress(&format!("Extracting {total} pages"), Some(0.0));

    let mut pages = Vec::with_capacity(total);
    let mut failed = 0usize;
    for page in 1..=total {
        if let Some(token) = cancel {
            token.check_cancelled("extract_page")?;
        }
        match extractor.extract_page(path, page) {
            Ok(raw) => {
                let text = reflow_page(&raw);
                debug!(page, chars = text.len(), "Extracted page");
                if !text.is_empty() {
                    pages.push(text);
                }
            }
            Err(err) => {
                failed += 1;
                warn!(page, "Skipping page that failed to extract: {err}");
            }
        }
        let percent = page as f64 / total as f64 * 100.0;
        progress(&format!("Extracting page {page} of {total}"), Some(percent));
    }

    if pages.is_empty() {
        return Err(ExtractionError::NoText {
            path: path.display().to_string(),
            failed,
            total,
        });
    }

    let text = pages.join("\n\n");
    info!(
        pages = total,
        failed,
        total_chars = text.len(),
        "Finished extracting document"
    );
    Ok(ExtractedDocument {
        text,
        pages_total: total,
        pages_failed: failed,
    })
}

/// Undo hard line wrapping in extracted page text.
///
/// Compatibility characters (ligatures, full-width forms) are folded with
/// NFKC, words split across lines with a hyphen are rejoined, wrapped lines
/// are joined with a space, and blank lines stay paragraph breaks.
pub fn reflow_page(raw: &str) -> String {
    let folded: String = raw.replace("\r\n", "\n").replace('\r', "\n").nfkc().collect();
    let dehyphenated = RE_HYPHEN_BREAK.replace_all(&folded, "$1$2");

    RE_PARAGRAPH_BREAK
        .split(dehyphenated.trim())
        .map(|paragraph| {
            let joined = RE_LINE_BREAK.replace_all(paragraph, " ");
            RE_HORIZONTAL_WS.replace_all(joined.trim(), " ").into_owned()
        })
        .filter(|paragraph| !paragraph.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
