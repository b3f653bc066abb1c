//! # edgequake-docverify
//!
//! Cross-check identity details across a batch of PDF documents using a
//! multimodal LLM.
//!
//! ## Why this crate?
//!
//! KYC-style checks often boil down to one question: do these documents
//! describe the same person? Instead of running OCR and hand-written field
//! parsers per document type, this crate sends each PDF as-is to a model that
//! reads it like a human would, asks for the full text, a short summary and
//! four identity fields, and then compares those fields across the batch.
//!
//! ## Pipeline Overview
//!
//! ```text
//! paths / URLs
//!  │
//!  ├─ 1. Intake   keep PDFs only, require at least two
//!  ├─ 2. Encode   whole file → base64 inline data
//!  ├─ 3. Extract  one model call per file, in file order
//!  ├─ 4. Parse    [FULL_TEXT] / [SUMMARY] / [KEY_DETAILS] sections
//!  ├─ 5. Verify   Name, Address, Date of Birth, Identification Number
//!  └─ 6. Output   per-document results + per-field verdicts + stats
//! ```
//!
//! A run is all-or-nothing: the first failing file aborts the batch.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docverify::{verify_files, VerifyConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Uses Gemini with GEMINI_API_KEY / GOOGLE_API_KEY from the environment.
//!     let config = VerifyConfig::default();
//!     let output = verify_files(["licence.pdf", "passport.pdf"], &config).await?;
//!     for entry in &output.verification {
//!         println!("{}: {}", entry.field, entry.status_label());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! For interactive front-ends, [`Workbench`] keeps the current batch, the
//! last results and a single user-facing message, and refuses a second run
//! while one is in flight.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docverify` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docverify = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod intake;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod report;
pub mod run;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{VerifyConfig, VerifyConfigBuilder};
pub use error::{IntakeError, VerifyError};
pub use intake::{FileItem, FileSource, Intake, IntakeReport, UploadBatch};
pub use output::{BatchOutput, BatchStats, DocumentResult, Field, VerificationEntry};
pub use pipeline::client::{GeminiClient, GenerationOptions, ModelClient, ModelReply, ProviderClient};
pub use pipeline::verify::AbsencePolicy;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use run::{resolve_client, verify_batch, verify_files, verify_sync, verify_to_file, write_report};
pub use session::{RunPhase, Workbench};
