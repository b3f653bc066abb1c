//! Plain-text rendering of a finished run.
//!
//! The layout mirrors what a results screen shows: the verification block
//! first ([`VERIFICATION_TITLE`] then one [`verification_line`] per field),
//! then one [`render_document`] panel per document. Colour is the caller's
//! business; the CLI wraps these strings in ANSI codes.

use crate::output::{DocumentResult, VerificationEntry};
use std::fmt::Write;

/// Heading printed above the verification lines.
pub const VERIFICATION_TITLE: &str = "Verification Results";

/// Rendering switches.
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Include each document's full extracted text. Default: true.
    pub full_text: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { full_text: true }
    }
}

/// `"<Field>: Matches|Does not match (v1 | v2 | …)"`.
pub fn verification_line(entry: &VerificationEntry) -> String {
    format!(
        "{}: {} ({})",
        entry.field,
        entry.status_label(),
        entry.joined_values()
    )
}

/// One document panel.
pub fn render_document(doc: &DocumentResult, options: RenderOptions) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", doc.file_name);
    let _ = writeln!(out, "{}", "─".repeat(doc.file_name.chars().count().max(8)));
    let _ = writeln!(out, "Summary:\n{}\n", doc.summary);

    out.push_str("Key Details:\n");
    if doc.key_details.is_empty() {
        out.push_str("  (none)\n");
    }
    for detail in &doc.key_details {
        let _ = writeln!(out, "  • {detail}");
    }

    if options.full_text {
        let _ = write!(out, "\nFull Text:\n{}\n", doc.full_text);
    }
    out
}
