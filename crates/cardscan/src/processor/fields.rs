//! Locates the ID-number anchor line and derives the name and address lines
//! that follow it.

use std::sync::LazyLock;

use regex::Regex;

use crate::document::ExtractedFields;
use crate::processor::ExtractionStrategy;

/// Text-layer IDs are exact: 16 to 22 contiguous ASCII digits.
/// `\d` would also take Tamil and other Unicode numerals.
static RE_TEXT_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{16,22}$").unwrap());

/// OCR may drop a leading digit, so accept 15.
static RE_OCR_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{15,22}$").unwrap());

/// Anything outside letters (with their combining marks), digits, space, comma, period.
static RE_DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{M}\p{N} ,.]").unwrap());

static RE_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());

/// Boilerplate phrases printed on every card.
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    phrases: Vec<String>,
}

impl Blocklist {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.trim().is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, line: &str) -> bool {
        self.phrases.iter().any(|p| line.contains(p.as_str()))
    }
}

/// Splits a text blob into trimmed, non-empty lines.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone)]
pub struct FieldParser {
    strategy: ExtractionStrategy,
    blocklist: Blocklist,
}

impl FieldParser {
    pub fn new(strategy: ExtractionStrategy, blocklist: Blocklist) -> Self {
        Self {
            strategy,
            blocklist,
        }
    }

    /// Parses the ordered lines of one card.
    ///
    /// With no anchor line every field is `None`; that is a partial result for
    /// the operator to complete, not an error. Lines missing after the anchor
    /// come back as empty strings.
    pub fn parse(&self, lines: &[String]) -> ExtractedFields {
        let Some((index, id_number)) = lines
            .iter()
            .enumerate()
            .find_map(|(i, line)| self.match_id(line).map(|id| (i, id)))
        else {
            tracing::debug!(strategy = ?self.strategy, lines = lines.len(), "No ID anchor line");
            return ExtractedFields::default();
        };

        let field_at = |offset: usize| {
            lines
                .get(index + offset)
                .map(|line| self.clean_field(line))
                .unwrap_or_default()
        };

        ExtractedFields {
            id_number: Some(id_number),
            name: Some(field_at(1)),
            address1: Some(field_at(2)),
            address2: Some(field_at(3)),
        }
    }

    fn match_id(&self, line: &str) -> Option<String> {
        match self.strategy {
            ExtractionStrategy::TextLayer => {
                RE_TEXT_ID.is_match(line).then(|| line.to_string())
            }
            ExtractionStrategy::Ocr => {
                let joined: String = line.chars().filter(|c| !c.is_whitespace()).collect();
                RE_OCR_ID.is_match(&joined).then_some(joined)
            }
        }
    }

    fn clean_field(&self, line: &str) -> String {
        if self.blocklist.matches(line) {
            return String::new();
        }
        let stripped = RE_DISALLOWED.replace_all(line, "");
        RE_SPACES.replace_all(stripped.trim(), " ").into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn text_parser() -> FieldParser {
        FieldParser::new(
            ExtractionStrategy::TextLayer,
            Blocklist::new(["தமிழ்நாடு அரசு", "உறுப்பினர்", "அைடயாள", "அட்ைட"]),
        )
    }

    #[test]
    fn test_fields_follow_anchor_line() {
        let fields = text_parser().parse(&lines(&[
            "Header",
            "1234567890123456",
            "John Doe",
            "12 Main St",
            "City",
        ]));

        assert_eq!(fields.id_number.as_deref(), Some("1234567890123456"));
        assert_eq!(fields.name.as_deref(), Some("John Doe"));
        assert_eq!(fields.address1.as_deref(), Some("12 Main St"));
        assert_eq!(fields.address2.as_deref(), Some("City"));
    }

    #[test]
    fn test_no_long_digit_run_yields_empty_fields() {
        let fields = text_parser().parse(&lines(&[
            "John Doe",
            "12345678901234",
            "Phone 98765",
            "City",
        ]));
        assert!(fields.is_empty());
    }

    #[test]
    fn test_empty_input_yields_empty_fields() {
        assert!(text_parser().parse(&[]).is_empty());
    }

    #[test]
    fn test_first_anchor_wins() {
        let fields = text_parser().parse(&lines(&[
            "1111111111111111",
            "First",
            "2222222222222222",
            "Second",
        ]));
        assert_eq!(fields.id_number.as_deref(), Some("1111111111111111"));
        assert_eq!(fields.name.as_deref(), Some("First"));
        assert_eq!(fields.address1.as_deref(), Some("2222222222222222"));
        assert_eq!(fields.address2.as_deref(), Some("Second"));
    }

    #[test]
    fn test_trailing_fields_default_to_empty() {
        let fields = text_parser().parse(&lines(&["x", "1234567890123456", "John Doe"]));
        assert_eq!(fields.id_number.as_deref(), Some("1234567890123456"));
        assert_eq!(fields.name.as_deref(), Some("John Doe"));
        assert_eq!(fields.address1.as_deref(), Some(""));
        assert_eq!(fields.address2.as_deref(), Some(""));
    }

    #[test]
    fn test_anchor_on_last_line() {
        let fields = text_parser().parse(&lines(&["1234567890123456"]));
        assert_eq!(fields.id_number.as_deref(), Some("1234567890123456"));
        assert_eq!(fields.name.as_deref(), Some(""));
    }

    #[test]
    fn test_blocklisted_lines_never_become_fields() {
        let fields = text_parser().parse(&lines(&[
            "1234567890123456",
            "தமிழ்நாடு அரசு",
            "முதலமைச்சரின் உறுப்பினர் அட்ைட",
            "Chennai",
        ]));

        assert_eq!(fields.name.as_deref(), Some(""));
        assert_eq!(fields.address1.as_deref(), Some(""));
        assert_eq!(fields.address2.as_deref(), Some("Chennai"));
    }

    #[test]
    fn test_disallowed_characters_are_stripped() {
        let fields = text_parser().parse(&lines(&[
            "1234567890123456",
            "John  \"Doe\"!",
            "No: 12/4, Main St.",
            "Chennai - 600001",
        ]));
        assert_eq!(fields.name.as_deref(), Some("John Doe"));
        assert_eq!(fields.address1.as_deref(), Some("No 124, Main St."));
        assert_eq!(fields.address2.as_deref(), Some("Chennai 600001"));
    }

    #[test]
    fn test_tamil_text_keeps_combining_marks() {
        let fields = text_parser().parse(&lines(&["1234567890123456", "முருகன்"]));
        assert_eq!(fields.name.as_deref(), Some("முருகன்"));
    }

    #[test]
    fn test_text_layer_requires_sixteen_contiguous_digits() {
        let parser = text_parser();
        assert!(parser.parse(&lines(&["123456789012345", "A"])).is_empty());
        assert!(parser.parse(&lines(&["1234 5678 9012 3456", "A"])).is_empty());
        assert!(parser
            .parse(&lines(&["12345678901234567890123", "A"]))
            .is_empty());
        assert!(!parser
            .parse(&lines(&["1234567890123456789012", "A"]))
            .is_empty());
    }

    #[test]
    fn test_ocr_accepts_grouped_and_shorter_ids() {
        let parser = FieldParser::new(ExtractionStrategy::Ocr, Blocklist::default());

        let fields = parser.parse(&lines(&["1234 5678 9012 3456", "John Doe"]));
        assert_eq!(fields.id_number.as_deref(), Some("1234567890123456"));
        assert_eq!(fields.name.as_deref(), Some("John Doe"));

        let fields = parser.parse(&lines(&["123456789012345", "Jane"]));
        assert_eq!(fields.id_number.as_deref(), Some("123456789012345"));

        assert!(parser.parse(&lines(&["12345678901234", "Jane"])).is_empty());
    }

    #[test]
    fn test_non_ascii_numerals_are_not_an_anchor() {
        let tamil_numerals = "௧௨௩௪௫௬௭௮௯௧௨௩௪௫௬௭";
        let fields = text_parser().parse(&lines(&[
            tamil_numerals,
            "1234567890123456",
            "John Doe",
            "12 Main St",
            "City",
        ]));
        assert_eq!(fields.id_number.as_deref(), Some("1234567890123456"));
        assert_eq!(fields.name.as_deref(), Some("John Doe"));
        assert_eq!(fields.address2.as_deref(), Some("City"));

        let ocr = FieldParser::new(ExtractionStrategy::Ocr, Blocklist::default());
        assert!(ocr.parse(&lines(&["١٢٣٤ ٥٦٧٨ ٩٠١٢ ٣٤٥٦", "Jane"])).is_empty());
        assert!(text_parser().parse(&lines(&[tamil_numerals, "A"])).is_empty());
    }

    #[test]
    fn test_split_lines_trims_and_drops_blanks() {
        let text = "  first \r\n\n\t\nsecond\n   \nthird  ";
        assert_eq!(split_lines(text), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_blocklist_ignores_blank_phrases() {
        let blocklist = Blocklist::new(["", "  ", "Govt"]);
        assert!(blocklist.matches("Govt of Somewhere"));
        assert!(!blocklist.matches("anything else"));
    }
}
