//! Response parsing: split a free-text model reply into its three sections.
//!
//! ## Grammar
//!
//! ```text
//! reply    := … section* …
//! section  := OPEN body CLOSE
//! OPEN     := "[FULL_TEXT]" | "[SUMMARY]" | "[KEY_DETAILS]"
//! CLOSE    := "[/FULL_TEXT]" | "[/SUMMARY]" | "[/KEY_DETAILS]"
//! ```
//!
//! A section's body is the text between the *first* occurrence of its opening
//! marker and the *first* closing marker after it. Anything outside markers is
//! ignored, and sections are located independently of each other, so a reply
//! with a broken summary still yields its full text and key details.
//!
//! ## Degradation policy
//!
//! | Section | Missing or unterminated |
//! |---------|-------------------------|
//! | full text | `"No text extracted"` |
//! | summary | `"No summary generated"` |
//! | key details | `["No key details extracted"]` |
//!
//! A missing section is never an error: the run still completes and the
//! verifier sees `"Not found"` for every field.

use crate::output::DocumentResult;

/// One of the three marker-delimited sections of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    FullText,
    Summary,
    KeyDetails,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::FullText, Section::Summary, Section::KeyDetails];

    pub fn open_marker(self) -> &'static str {
        match self {
            Section::FullText => "[FULL_TEXT]",
            Section::Summary => "[SUMMARY]",
            Section::KeyDetails => "[KEY_DETAILS]",
        }
    }

    pub fn close_marker(self) -> &'static str {
        match self {
            Section::FullText => "[/FULL_TEXT]",
            Section::Summary => "[/SUMMARY]",
            Section::KeyDetails => "[/KEY_DETAILS]",
        }
    }

    /// Text substituted when the section is absent.
    pub fn placeholder(self) -> &'static str {
        match self {
            Section::FullText => "No text extracted",
            Section::Summary => "No summary generated",
            Section::KeyDetails => "No key details extracted",
        }
    }
}

/// Raw body of `section`, untrimmed, or `None` if the markers are not paired.
pub fn find_section(reply: &str, section: Section) -> Option<&str> {
    let open = section.open_marker();
    let start = reply.find(open)? + open.len();
    let len = reply[start..].find(section.close_marker())?;
    Some(&reply[start..start + len])
}

/// Parse a complete reply into a [`DocumentResult`] for `file_name`.
pub fn parse_reply(file_name: &str, reply: &str) -> DocumentResult {
    DocumentResult {
        file_name: file_name.to_string(),
        full_text: text_section(reply, Section::FullText),
        summary: text_section(reply, Section::Summary),
        key_details: key_details(reply),
    }
}

fn text_section(reply: &str, section: Section) -> String {
    find_section(reply, section)
        .map(|body| body.trim().to_string())
        .unwrap_or_else(|| section.placeholder().to_string())
}

/// Key-detail lines: trimmed, one leading `"- "` bullet stripped, empties dropped.
fn key_details(reply: &str) -> Vec<String> {
    let Some(body) = find_section(reply, Section::KeyDetails) else {
        return vec![Section::KeyDetails.placeholder().to_string()];
    };

    body.trim()
        .split('\n')
        .map(|line| {
            let line = line.trim().trim_matches(&INVISIBLE[..]).trim();
            let line = line.strip_prefix("- ").unwrap_or(line);
            line.trim_start_matches(&INVISIBLE[..]).to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

// Zero-width and formatting characters at a line's edges break
// `starts_with("Name:")` lookups. Inside a value they are left alone.
const INVISIBLE: [char; 6] = [
    '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
];

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "Here is the result.\n\
[FULL_TEXT]\n  Jane Smith\n  12 High Street\n[/FULL_TEXT]\n\n\
[SUMMARY]\nA driving licence issued to Jane Smith.\n[/SUMMARY]\n\n\
[KEY_DETAILS]\n- Name: Jane Smith\n- Address: 12 High Street\n\n- Date of Birth: 1990-01-02\n- Identification Number: A123\n[/KEY_DETAILS]\n";

    #[test]
    fn parses_all_sections() {
        let doc = parse_reply("licence.pdf", WELL_FORMED);
        assert_eq!(doc.file_name, "licence.pdf");
        assert_eq!(doc.full_text, "Jane Smith\n  12 High Street");
        assert_eq!(doc.summary, "A driving licence issued to Jane Smith.");
        assert_eq!(
            doc.key_details,
            vec![
                "Name: Jane Smith",
                "Address: 12 High Street",
                "Date of Birth: 1990-01-02",
                "Identification Number: A123",
            ]
        );
    }

    #[test]
    fn missing_summary_only_affects_summary() {
        let reply = WELL_FORMED
            .replace("[SUMMARY]", "")
            .replace("[/SUMMARY]", "");
        let doc = parse_reply("a.pdf", &reply);
        assert_eq!(doc.summary, "No summary generated");
        assert_eq!(doc.full_text, "Jane Smith\n  12 High Street");
        assert_eq!(doc.key_details.len(), 4);
    }

    #[test]
    fn missing_full_text_only_affects_full_text() {
        let reply = WELL_FORMED.replace("[/FULL_TEXT]", "");
        let doc = parse_reply("a.pdf", &reply);
        assert_eq!(doc.full_text, "No text extracted");
        assert_eq!(doc.summary, "A driving licence issued to Jane Smith.");
    }

    #[test]
    fn missing_key_details_yields_placeholder_list() {
        let reply = "[FULL_TEXT]x[/FULL_TEXT][SUMMARY]y[/SUMMARY]";
        let doc = parse_reply("a.pdf", reply);
        assert_eq!(doc.key_details, vec!["No key details extracted"]);
        assert_eq!(doc.full_text, "x");
        assert_eq!(doc.summary, "y");
    }

    #[test]
    fn empty_reply_degrades_everywhere() {
        let doc = parse_reply("a.pdf", "");
        assert_eq!(doc.full_text, "No text extracted");
        assert_eq!(doc.summary, "No summary generated");
        assert_eq!(doc.key_details, vec!["No key details extracted"]);
    }

    #[test]
    fn empty_key_details_section_is_empty_list() {
        let doc = parse_reply("a.pdf", "[KEY_DETAILS]\n \n[/KEY_DETAILS]");
        assert!(doc.key_details.is_empty());
    }

    #[test]
    fn first_close_after_first_open_wins() {
        let reply = "[SUMMARY]one[/SUMMARY] noise [SUMMARY]two[/SUMMARY]";
        assert_eq!(find_section(reply, Section::Summary), Some("one"));
    }

    #[test]
    fn close_before_open_is_not_a_section() {
        assert_eq!(find_section("[/SUMMARY]x[SUMMARY]", Section::Summary), None);
    }

    #[test]
    fn markers_are_case_sensitive() {
        assert_eq!(find_section("[summary]x[/summary]", Section::Summary), None);
    }

    #[test]
    fn only_one_bullet_is_stripped() {
        let doc = parse_reply("a.pdf", "[KEY_DETAILS]\n- - Name: X\nName: Y\n[/KEY_DETAILS]");
        assert_eq!(doc.key_details, vec!["- Name: X", "Name: Y"]);
    }

    #[test]
    fn crlf_and_invisible_chars_are_cleaned() {
        let reply = "[KEY_DETAILS]\r\n- \u{200B}Name: Jane\r\n\u{FEFF}- Address: 1 Road\r\n[/KEY_DETAILS]";
        let doc = parse_reply("a.pdf", reply);
        assert_eq!(doc.key_details, vec!["Name: Jane", "Address: 1 Road"]);
    }

    #[test]
    fn invisible_chars_inside_values_survive() {
        let reply = "[KEY_DETAILS]\n- Name: Jo\u{200B}hn\n- Identification Number: A1\u{200D}23\n[/KEY_DETAILS]";
        let doc = parse_reply("a.pdf", reply);
        assert_eq!(
            doc.key_details,
            vec!["Name: Jo\u{200B}hn", "Identification Number: A1\u{200D}23"]
        );
    }
}
