//! Result types produced by a verification run.
//!
//! Everything here is plain data: created once per run, serialisable to JSON
//! for the `--json` CLI mode, and discarded when the next batch is processed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder value for a field a document does not report.
pub const NOT_FOUND: &str = "Not found";

/// The identity fields cross-checked across documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    #[serde(rename = "Name")]
    Name,
    #[serde(rename = "Address")]
    Address,
    #[serde(rename = "Date of Birth")]
    DateOfBirth,
    #[serde(rename = "Identification Number")]
    IdentificationNumber,
}

impl Field {
    /// Every field, in report order.
    pub const ALL: [Field; 4] = [
        Field::Name,
        Field::Address,
        Field::DateOfBirth,
        Field::IdentificationNumber,
    ];

    /// The label the model is asked to emit, e.g. `"Date of Birth"`.
    pub fn label(self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Address => "Address",
            Field::DateOfBirth => "Date of Birth",
            Field::IdentificationNumber => "Identification Number",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Parsed extraction for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentResult {
    /// File name as it appeared in the batch.
    pub file_name: String,
    /// Full extracted text, or a placeholder.
    pub full_text: String,
    /// Short summary, or a placeholder.
    pub summary: String,
    /// `"Label: value"` lines in the order the model produced them.
    pub key_details: Vec<String>,
}

/// Agreement of one field across every document in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEntry {
    pub field: Field,
    /// True only when all documents report the same present value.
    pub matches: bool,
    /// One value per document, in document order.
    pub values: Vec<String>,
}

impl VerificationEntry {
    /// `"Matches"` or `"Does not match"`.
    pub fn status_label(&self) -> &'static str {
        if self.matches {
            "Matches"
        } else {
            "Does not match"
        }
    }

    /// Per-document values joined with `" | "`.
    pub fn joined_values(&self) -> String {
        self.values.join(" | ")
    }
}

/// Aggregate statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub documents: usize,
    pub matched_fields: usize,
    pub mismatched_fields: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    /// Wall-clock time spent in model calls.
    pub extraction_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a successful run produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutput {
    pub documents: Vec<DocumentResult>,
    pub verification: Vec<VerificationEntry>,
    pub stats: BatchStats,
}

impl BatchOutput {
    /// True when every verified field matched.
    pub fn all_match(&self) -> bool {
        self.verification.iter().all(|v| v.matches)
    }

    /// Look up the entry for one field.
    pub fn entry(&self, field: Field) -> Option<&VerificationEntry> {
        self.verification.iter().find(|v| v.field == field)
    }
}
