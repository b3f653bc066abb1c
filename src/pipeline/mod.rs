//! Pipeline stages for extracting and cross-checking documents.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested without the others (the parser and verifier never touch the network).
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ client ──▶ parse ──▶ verify
//! (path/URL) (base64)  (LLM)     (markers)  (fields)
//! ```
//!
//! 1. [`input`]   — turn a CLI argument into a [`crate::intake::FileItem`],
//!    downloading URLs into memory
//! 2. [`encode`]  — read the bytes, check the `%PDF` magic, base64-wrap them
//! 3. [`client`]  — the [`client::ModelClient`] seam; the only stage with
//!    network I/O to the model
//! 4. [`extract`] — one timed request per file, followed by parsing
//! 5. [`parse`]   — marker grammar with placeholder fallback
//! 6. [`verify`]  — per-field agreement across documents

pub mod client;
pub mod encode;
pub mod extract;
pub mod input;
pub mod parse;
pub mod verify;
