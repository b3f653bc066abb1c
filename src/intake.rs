//! File intake: filter a drop down to PDFs and hold the current batch.
//!
//! A "drop" is any set of candidate files offered at once (CLI arguments,
//! an upload form, a directory scan). Only items whose *declared* MIME type is
//! `application/pdf` are kept. The content itself is checked later, when the
//! bytes are read for extraction.

use crate::error::{IntakeError, NON_PDF_WARNING};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The only accepted MIME type.
pub const PDF_MIME: &str = "application/pdf";

/// Minimum number of PDFs a batch needs before it can be compared.
pub const MIN_BATCH_SIZE: usize = 2;

/// Where a file's bytes live.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Read from disk at extraction time.
    Path(PathBuf),
    /// Already in memory (downloads, uploads).
    Bytes(Arc<[u8]>),
}

/// One candidate file as offered by the user.
#[derive(Debug, Clone)]
pub struct FileItem {
    pub name: String,
    pub mime_type: String,
    pub source: FileSource,
}

impl FileItem {
    /// A local file; its MIME type is declared from the extension.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            mime_type: mime_from_extension(&path).to_string(),
            source: FileSource::Path(path),
        }
    }

    /// An in-memory file with an explicitly declared MIME type.
    pub fn from_bytes(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            source: FileSource::Bytes(bytes.into()),
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME
    }
}

/// Declared MIME type for a path, the way a browser file picker assigns one.
pub fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => PDF_MIME,
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        "json" => "application/json",
        "xml" => "application/xml",
        _ => "application/octet-stream",
    }
}

/// An accepted, ordered set of PDF files.
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    files: Vec<FileItem>,
}

impl UploadBatch {
    pub fn files(&self) -> &[FileItem] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// True when the batch has enough files to be compared.
    pub fn is_ready(&self) -> bool {
        self.files.len() >= MIN_BATCH_SIZE
    }

    pub fn names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.name.clone()).collect()
    }
}

/// Outcome of an accepted drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeReport {
    /// Number of PDFs now in the batch.
    pub accepted: usize,
    /// Names of items filtered out as non-PDF.
    pub rejected: Vec<String>,
    /// Set when at least one item was filtered out.
    pub warning: Option<String>,
}

/// Holds the current batch between drops.
#[derive(Debug, Default)]
pub struct Intake {
    batch: UploadBatch,
}

impl Intake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch(&self) -> &UploadBatch {
        &self.batch
    }

    /// Offer a new set of items.
    ///
    /// Non-PDF items are dropped with a warning. If fewer than
    /// [`MIN_BATCH_SIZE`] PDFs remain the current batch is kept as-is and an
    /// error is returned; otherwise the batch is replaced wholesale.
    pub fn drop_items(&mut self, items: Vec<FileItem>) -> Result<IntakeReport, IntakeError> {
        let offered = items.len();
        let (pdfs, others): (Vec<FileItem>, Vec<FileItem>) =
            items.into_iter().partition(FileItem::is_pdf);
        let rejected: Vec<String> = others.into_iter().map(|f| f.name).collect();

        if !rejected.is_empty() {
            warn!(
                "Rejected {} of {} dropped items (not {}): {:?}",
                rejected.len(),
                offered,
                PDF_MIME,
                rejected
            );
        }

        if pdfs.len() < MIN_BATCH_SIZE {
            return Err(IntakeError::TooFewPdfs {
                found: pdfs.len(),
                rejected,
            });
        }

        let warning = (!rejected.is_empty()).then(|| NON_PDF_WARNING.to_string());
        self.batch = UploadBatch { files: pdfs };
        debug!("Files selected: {:?}", self.batch.names());

        Ok(IntakeReport {
            accepted: self.batch.len(),
            rejected,
            warning,
        })
    }
}
