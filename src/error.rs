//! Error types for the edgequake-docverify library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IntakeError`] — **Rejected drop**: the user offered a set of files
//!   that cannot form a batch (fewer than two PDFs). The previously stored
//!   batch is left untouched so the user can simply try again.
//!
//! * [`VerifyError`] — **Fatal run error**: the batch cannot be processed
//!   (no credential, a file vanished, the model API refused the call). A run
//!   never reports partial results; the first failure aborts the whole batch.
//!
//! Malformed model replies are deliberately absent from both: missing section
//! markers degrade to placeholder text in [`crate::pipeline::parse`].

use std::path::PathBuf;
use thiserror::Error;

/// Message shown when a drop contained non-PDF items.
pub const NON_PDF_WARNING: &str = "Only PDF files are accepted.";

/// Message shown when a drop leaves fewer than two PDFs.
pub const TOO_FEW_PDFS_MESSAGE: &str = "Please upload at least two PDF files for comparison.";

/// Message shown when processing is triggered without a valid batch.
pub const NOT_ENOUGH_FILES_MESSAGE: &str = "Please upload at least two PDF files.";

/// A drop that could not replace the current batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    /// Fewer than two items survived the PDF filter.
    #[error("{}", TOO_FEW_PDFS_MESSAGE)]
    TooFewPdfs {
        /// Number of PDF items in the drop.
        found: usize,
        /// Names of the items rejected by the MIME filter.
        rejected: Vec<String>,
    },
}

/// All fatal errors returned by the edgequake-docverify library.
#[derive(Debug, Error)]
pub enum VerifyError {
    // ── Configuration errors ──────────────────────────────────────────────
    /// No API credential was found in the environment.
    #[error("Gemini API key is missing.\nSet {var} (or pass a pre-built client).")]
    MissingApiKey { var: String },

    /// The configured provider could not be initialised.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file could not be read in full.
    #[error("Failed to read '{name}': {source}")]
    ReadFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The file was declared as a PDF but its bytes are not one.
    #[error("File is not a valid PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    /// Processing was triggered with fewer than two accepted files.
    #[error("{} (got {found})", NOT_ENOUGH_FILES_MESSAGE)]
    NotEnoughFiles { found: usize },

    /// A drop was rejected by intake.
    #[error(transparent)]
    Intake(#[from] IntakeError),

    // ── Model errors ──────────────────────────────────────────────────────
    /// The model API returned a non-success response.
    #[error("LLM API error for '{file}': {message}")]
    ApiError { file: String, message: String },

    /// The model API rejected the credential (401/403).
    #[error("Authentication error from provider '{provider}': {detail}")]
    AuthError { provider: String, detail: String },

    /// The model API returned HTTP 429.
    #[error("Rate limit exceeded for provider '{provider}'")]
    RateLimitExceeded {
        provider: String,
        retry_after_secs: Option<u64>,
    },

    /// A single extraction call exceeded the configured timeout.
    #[error("API call timed out after {secs}s for '{file}'")]
    ApiTimeout { file: String, secs: u64 },

    // ── Run-state errors ──────────────────────────────────────────────────
    /// A run is already in flight on this workbench.
    #[error("A batch is already being processed")]
    Busy,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output report file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VerifyError {
    /// The single user-facing message a failed run leaves behind.
    pub fn user_message(&self) -> String {
        let detail = match self {
            VerifyError::ApiError { message, .. } | VerifyError::Internal(message)
                if message.trim().is_empty() =>
            {
                "Unknown error".to_string()
            }
            other => other.to_string(),
        };
        format!("Failed to process documents: {detail}")
    }
}
