//! Cross-document verification of identity fields.
//!
//! For every [`Field`] the verifier pulls one value per document out of the
//! parsed key-detail lines and reports whether all documents agree. The lookup
//! is deliberately literal: a line counts for a field only if it starts with
//! `"<Label>:"`, and no normalisation (case, whitespace, date formats) is
//! applied to the values being compared.

use crate::output::{DocumentResult, Field, VerificationEntry, NOT_FOUND};

/// How to score a field that no document reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AbsencePolicy {
    /// Unanimous absence is a mismatch. (default)
    #[default]
    Mismatch,
    /// Unanimous absence counts as agreement.
    Match,
}

/// The value `document` reports for `field`, or [`NOT_FOUND`].
pub fn field_value(document: &DocumentResult, field: Field) -> String {
    let prefix = format!("{}:", field.label());
    let with_space = format!("{}: ", field.label());
    document
        .key_details
        .iter()
        .find(|detail| detail.starts_with(&prefix))
        .map(|detail| detail.replacen(&with_space, "", 1).trim().to_string())
        .unwrap_or_else(|| NOT_FOUND.to_string())
}

/// Whether a list of per-document values counts as agreement.
pub fn values_match(values: &[String], policy: AbsencePolicy) -> bool {
    let Some(first) = values.first() else {
        return false;
    };
    if !values.iter().all(|v| v == first) {
        return false;
    }
    first != NOT_FOUND || policy == AbsencePolicy::Match
}

/// Verify every field in [`Field::ALL`] across `documents`.
pub fn verify_documents(documents: &[DocumentResult], policy: AbsencePolicy) -> Vec<VerificationEntry> {
    Field::ALL
        .iter()
        .map(|&field| {
            let values: Vec<String> = documents.iter().map(|d| field_value(d, field)).collect();
            VerificationEntry {
                field,
                matches: values_match(&values, policy),
                values,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(details: &[&str]) -> DocumentResult {
        DocumentResult {
            file_name: "doc.pdf".into(),
            full_text: String::new(),
            summary: String::new(),
            key_details: details.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn entry(entries: &[VerificationEntry], field: Field) -> &VerificationEntry {
        entries.iter().find(|e| e.field == field).unwrap()
    }

    #[test]
    fn identical_values_match() {
        let docs = vec![
            doc(&["Name: John Doe"]),
            doc(&["Name: John Doe"]),
            doc(&["Name:  John Doe  "]),
        ];
        let out = verify_documents(&docs, AbsencePolicy::default());
        let name = entry(&out, Field::Name);
        assert!(name.matches);
        assert_eq!(name.values, vec!["John Doe"; 3]);
    }

    #[test]
    fn one_missing_value_is_a_mismatch() {
        let docs = vec![doc(&["Name: John Doe"]), doc(&["Address: 1 Road"])];
        let out = verify_documents(&docs, AbsencePolicy::default());
        let name = entry(&out, Field::Name);
        assert!(!name.matches);
        assert_eq!(name.values, vec!["John Doe", "Not found"]);
    }

    #[test]
    fn different_values_are_a_mismatch() {
        let docs = vec![doc(&["Address: 123 Main St"]), doc(&["Address: 456 Oak Ave"])];
        let out = verify_documents(&docs, AbsencePolicy::default());
        assert!(!entry(&out, Field::Address).matches);
    }

    #[test]
    fn unanimous_absence_follows_policy() {
        let docs = vec![doc(&[]), doc(&["No key details extracted"])];
        let strict = verify_documents(&docs, AbsencePolicy::Mismatch);
        assert!(strict.iter().all(|e| !e.matches));

        let lenient = verify_documents(&docs, AbsencePolicy::Match);
        assert!(lenient.iter().all(|e| e.matches));
        assert_eq!(lenient[0].values, vec!["Not found", "Not found"]);
    }

    #[test]
    fn output_preserves_field_order() {
        let out = verify_documents(&[doc(&[]), doc(&[])], AbsencePolicy::default());
        let fields: Vec<Field> = out.iter().map(|e| e.field).collect();
        assert_eq!(fields, Field::ALL.to_vec());
    }

    #[test]
    fn first_matching_line_wins() {
        let d = doc(&["Name: First", "Name: Second"]);
        assert_eq!(field_value(&d, Field::Name), "First");
    }

    #[test]
    fn label_must_be_a_prefix() {
        let d = doc(&["Full Name: Jane", "Date of Birth: 1990-01-02"]);
        assert_eq!(field_value(&d, Field::Name), NOT_FOUND);
        assert_eq!(field_value(&d, Field::DateOfBirth), "1990-01-02");
    }

    #[test]
    fn missing_space_keeps_label_in_value() {
        // Only "<Label>: " is removed; "Name:Jane" has no space to anchor on.
        let d = doc(&["Name:Jane"]);
        assert_eq!(field_value(&d, Field::Name), "Name:Jane");
    }

    #[test]
    fn values_are_compared_byte_for_byte() {
        let docs = vec![
            crate::pipeline::parse::parse_reply(
                "a.pdf",
                "[KEY_DETAILS]\n- Identification Number: A1\u{200B}23\n[/KEY_DETAILS]",
            ),
            doc(&["Identification Number: A123"]),
        ];
        let out = verify_documents(&docs, AbsencePolicy::default());
        assert!(!entry(&out, Field::IdentificationNumber).matches);
    }

    #[test]
    fn no_documents_never_match() {
        let out = verify_documents(&[], AbsencePolicy::Match);
        assert!(out.iter().all(|e| !e.matches && e.values.is_empty()));
    }
}
