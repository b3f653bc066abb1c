//! Progress-callback trait for per-document events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::VerifyConfigBuilder::progress_callback`] to receive events
//! as the runner works through a batch. The CLI uses this to drive its
//! progress bar; [`crate::session::Workbench`] uses it to track the run phase.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docverify::{BatchProgressCallback, VerifyConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, name: &str, key_details: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{}/{} {} ({} key details)", index + 1, total, name, key_details);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//! let config = VerifyConfig::builder()
//!     .progress_callback(counter as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch runner as it processes each document.
///
/// `index` is 0-based in batch order. With `concurrency > 1` the per-document
/// methods may be called from several tasks at once, so implementations must
/// synchronise shared state. All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once after input validation, before any request is sent.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called just before a document's request is sent.
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when the model replied and parsing begins.
    fn on_document_reply(&self, index: usize, total: usize, reply_len: usize) {
        let _ = (index, total, reply_len);
    }

    /// Called when a document has been parsed.
    fn on_document_complete(&self, index: usize, total: usize, name: &str, key_details: usize) {
        let _ = (index, total, name, key_details);
    }

    /// Called when a document fails; the batch aborts after this.
    fn on_document_error(&self, index: usize, total: usize, name: &str, error: String) {
        let _ = (index, total, name, error);
    }

    /// Called when every document is parsed and verification begins.
    fn on_verification_start(&self, documents: usize) {
        let _ = documents;
    }

    /// Called once after a successful run.
    fn on_batch_complete(&self, matched_fields: usize, total_fields: usize) {
        let _ = (matched_fields, total_fields);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::VerifyConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
