//! Prompt sent alongside every PDF.
//!
//! The reply format below is a contract with [`crate::pipeline::parse`]: the
//! marker names and the `- Label: value` line shape must stay in sync with the
//! parser and with [`crate::output::Field::label`].
//!
//! Callers can override the prompt via
//! [`crate::config::VerifyConfig::prompt`]; an override that drops the markers
//! simply yields placeholder sections.

/// Default extraction prompt.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"For this PDF document, provide:
1. The full extracted text
2. A brief summary (2-3 sentences) of what the document is about
3. Extract key details including: Name, Address, Date of Birth, Identification Number (or any unique ID)
4. Ignore capitalization

Format your response as:
[FULL_TEXT]
Full extracted text here...
[/FULL_TEXT]

[SUMMARY]
Summary here...
[/SUMMARY]

[KEY_DETAILS]
- Name: [extracted name]
- Address: [extracted address]
- Date of Birth: [extracted DOB]
- Identification Number: [extracted ID]
[/KEY_DETAILS]"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Field;
    use crate::pipeline::parse::Section;

    #[test]
    fn prompt_names_every_marker() {
        for section in Section::ALL {
            assert!(DEFAULT_EXTRACTION_PROMPT.contains(section.open_marker()));
            assert!(DEFAULT_EXTRACTION_PROMPT.contains(section.close_marker()));
        }
    }

    #[test]
    fn prompt_asks_for_every_field() {
        for field in Field::ALL {
            let line = format!("- {}:", field.label());
            assert!(
                DEFAULT_EXTRACTION_PROMPT.contains(&line),
                "prompt is missing {line:?}"
            );
        }
    }
}
