//! Page extractors backed by external tools.
//!
//! PDFs go through poppler's `pdfinfo` / `pdftotext`, one process per page
//! so a single broken page only costs that page. Plain text files are split
//! into pages on form feeds.

use narrator_core::config::AppConfig;
use narrator_core::error::ExtractionError;
use narrator_core::extraction::TextExtractor;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::rc::Rc;
use tracing::debug;

static RE_PAGES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^Pages:\s+(\d+)\s*$").unwrap());

const FORM_FEED: char = '\u{000C}';

pub struct PdftotextExtractor {
    pdftotext: String,
    pdfinfo: String,
}

impl PdftotextExtractor {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            pdftotext: config.pdftotext_path.clone(),
            pdfinfo: config.pdfinfo_path.clone(),
        }
    }
}

impl TextExtractor for PdftotextExtractor {
    fn supports(&self, path: &Path) -> bool {
        has_extension(path, "pdf")
    }

    fn page_count(&self, path: &Path) -> Result<usize, ExtractionError> {
        let output = Command::new(&self.pdfinfo)
            .arg(path)
            .output()
            .map_err(|err| open_error(path, format!("failed to start {}: {err}", self.pdfinfo)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(open_error(path, stderr.trim().to_string()));
        }
        let info = String::from_utf8_lossy(&output.stdout);
        let pages = parse_page_count(&info)
            .ok_or_else(|| open_error(path, "pdfinfo reported no page count".to_string()))?;
        debug!(path = %path.display(), pages, "Read PDF page count");
        Ok(pages)
    }

    fn extract_page(&self, path: &Path, page: usize) -> Result<String, ExtractionError> {
        let page_arg = page.to_string();
        let output = Command::new(&self.pdftotext)
            .arg("-f")
            .arg(&page_arg)
            .arg("-l")
            .arg(&page_arg)
            .arg("-enc")
            .arg("UTF-8")
            .arg(path)
            .arg("-")
            .output()
            .map_err(|err| ExtractionError::Page {
                page,
                reason: format!("failed to start {}: {err}", self.pdftotext),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Page {
                page,
                reason: stderr.trim().to_string(),
            });
        }
        let text = String::from_utf8(output.stdout).map_err(|_| ExtractionError::Page {
            page,
            reason: "pdftotext returned non-UTF8 text".to_string(),
        })?;
        Ok(text.replace(FORM_FEED, "\n"))
    }
}

/// `.txt` files, with form feeds as page breaks. The file is read once and
/// its pages kept for the following per-page calls.
#[derive(Default)]
pub struct PlainTextExtractor {
    cache: RefCell<Option<(PathBuf, Rc<[String]>)>>,
}

impl PlainTextExtractor {
    fn pages(&self, path: &Path) -> Result<Rc<[String]>, ExtractionError> {
        if let Some((cached, pages)) = self.cache.borrow().as_ref() {
            if cached == path {
                return Ok(Rc::clone(pages));
            }
        }
        let data = fs::read_to_string(path).map_err(|err| open_error(path, err.to_string()))?;
        let pages: Rc<[String]> = split_pages(&data).into();
        debug!(path = %path.display(), pages = pages.len(), "Read text file");
        *self.cache.borrow_mut() = Some((path.to_path_buf(), Rc::clone(&pages)));
        Ok(pages)
    }
}

impl TextExtractor for PlainTextExtractor {
    fn supports(&self, path: &Path) -> bool {
        has_extension(path, "txt")
    }

    fn page_count(&self, path: &Path) -> Result<usize, ExtractionError> {
        Ok(self.pages(path)?.len())
    }

    fn extract_page(&self, path: &Path, page: usize) -> Result<String, ExtractionError> {
        self.pages(path)?
            .get(page.wrapping_sub(1))
            .cloned()
            .ok_or_else(|| ExtractionError::Page {
                page,
                reason: "page out of range".to_string(),
            })
    }
}

/// Pick an extractor by file extension. Unknown types get the PDF
/// extractor, which rejects them before running anything.
pub fn extractor_for(path: &Path, config: &AppConfig) -> Box<dyn TextExtractor> {
    if has_extension(path, "txt") {
        Box::new(PlainTextExtractor::default())
    } else {
        Box::new(PdftotextExtractor::new(config))
    }
}

fn parse_page_count(info: &str) -> Option<usize> {
    RE_PAGES
        .captures(info)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn split_pages(data: &str) -> Vec<String> {
    let mut pages: Vec<String> = data.split(FORM_FEED).map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|last| last.trim().is_empty()) {
        pages.pop();
    }
    pages
}

fn has_extension(path: &Path, expected: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

fn open_error(path: &Path, reason: String) -> ExtractionError {
    ExtractionError::Open {
        path: path.display().to_string(),
        reason,
    }
}
