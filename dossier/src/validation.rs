//! Entity quality filter
//!
//! NER output over scanned correspondence is noisy: markup fragments, mail
//! headers, mis-decoded bytes and page furniture all come back tagged as
//! people or places. `is_valid_entity` rejects those before they reach the
//! metadata index. It never rewrites a string, it only accepts or rejects.

use once_cell::sync::Lazy;
use regex::{Regex, RegexSet};

use crate::interface::EntityKind;

const MIN_ENTITY_CHARS: usize = 3;
const MAX_ENTITY_CHARS: usize = 100;

/// Share of characters outside alphanumerics and ` -.'` above which a
/// string is treated as noise.
const MAX_SYMBOL_RATIO: f64 = 0.4;
/// Share of non-alphanumeric, non-space characters tolerated in an org name.
const MAX_ORG_SPECIAL_RATIO: f64 = 0.3;
/// Fully uppercase person names longer than this are treated as codes.
const MAX_UPPERCASE_PERSON_CHARS: usize = 5;
const MAX_LOCATION_SYMBOLS: usize = 2;

/// Compared case-insensitively against the whole trimmed string.
const REJECT_WORDS: &[&str] = &[
    // mail headers
    "sender", "subject", "from", "to", "sent", "unauthorized",
    // days
    "mon", "tue", "wed", "thu", "fri", "sat", "sun",
    // months
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
    // platforms and events
    "twitter", "facebook", "instagram", "brexit",
];

const PERSON_REJECT_WORDS: &[&str] = &["the", "and", "page", "chapter", "section"];

/// Any match rejects the string. Matched case-insensitively.
static NOISE_PATTERNS: Lazy<RegexSet> = Lazy::new(|| {
    RegexSet::new([
        // markup
        r"(?i)[{}\[\]<>]",
        r"(?i)&[a-z]+;",
        r"(?i)</?\w+",
        r"(?i)href=|target=|class=|style=",
        // dates are extracted separately
        r"(?i)^\d{2}-\d{2}-\d{4}",
        r"(?i)^\d{4}-\d{2}-\d{2}",
        // symbols and bare numbers
        r"(?i)^[%&@#$]+",
        r"(?i)^\d+\s*$",
        r"(?i)[|\\~`]",
        // mail
        r"(?i)@\w+\.(com|org|net|edu)",
        r"(?i)mailto:",
        r"(?i)^(sender|subject|from|to):",
        r"(?i)\b(sent|unauthorized)$",
        // serialisation artifacts
        r"(?i)textstyle|layout|identifier",
        r"(?i)hash\(0x",
        r"(?i)default\w+name",
        // encoding damage
        r"(?i)=\d{2}",
        r#"(?i)3d"""#,
        r"(?i)Â©|â€™",
        // urls
        r"(?i)https?://",
        r"(?i)www\.",
        // page furniture
        r"(?i)^page\s+\d+$",
    ])
    .unwrap()
});

static LOCATION_LEADING_SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[&%#@]").unwrap());

/// Accept or reject an entity string for `kind`. Leading and trailing
/// whitespace is ignored.
pub fn is_valid_entity(text: &str, kind: EntityKind) -> bool {
    let text = text.trim();
    let len = text.chars().count();
    if !(MIN_ENTITY_CHARS..=MAX_ENTITY_CHARS).contains(&len) {
        return false;
    }

    let lower = text.to_lowercase();
    if REJECT_WORDS.contains(&lower.as_str()) {
        return false;
    }
    if NOISE_PATTERNS.is_match(text) {
        return false;
    }
    if !text.chars().any(char::is_alphabetic) {
        return false;
    }

    let symbols = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !matches!(c, ' ' | '-' | '.' | '\''))
        .count();
    if symbols as f64 / len as f64 > MAX_SYMBOL_RATIO {
        return false;
    }

    match kind {
        EntityKind::Person => {
            if is_all_uppercase(text) && len > MAX_UPPERCASE_PERSON_CHARS {
                return false;
            }
            if PERSON_REJECT_WORDS.contains(&lower.as_str()) {
                return false;
            }
        }
        EntityKind::Location => {
            if LOCATION_LEADING_SYMBOL.is_match(text) {
                return false;
            }
            let odd = text
                .chars()
                .filter(|c| !c.is_alphanumeric() && !matches!(c, ' ' | '-' | '.'))
                .count();
            if odd > MAX_LOCATION_SYMBOLS {
                return false;
            }
        }
        EntityKind::Organization => {
            let special = text.chars().filter(|c| !c.is_alphanumeric() && *c != ' ').count();
            if special as f64 / len as f64 > MAX_ORG_SPECIAL_RATIO {
                return false;
            }
        }
        EntityKind::Date | EntityKind::Email => {}
    }

    true
}

/// Validate a raw NER span. Returns the kind and trimmed text when the
/// label maps to a person, location or organization and the text passes.
pub fn validate_ner_span<'a>(text: &'a str, label: &str) -> Option<(EntityKind, &'a str)> {
    let kind = EntityKind::from_ner_label(label)?;
    if !EntityKind::NAMED.contains(&kind) {
        return None;
    }
    let trimmed = text.trim();
    is_valid_entity(trimmed, kind).then_some((kind, trimmed))
}

/// At least one cased character and no lowercase ones.
fn is_all_uppercase(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use EntityKind::{Location, Organization, Person};

    #[test]
    fn test_accepts_real_names() {
        assert!(is_valid_entity("Jeffrey Epstein", Person));
        assert!(is_valid_entity("G. Maxwell", Person));
        assert!(is_valid_entity("Little St. James", Location));
        assert!(is_valid_entity("U.S. Department of Justice", Organization));
        assert!(is_valid_entity("FBI", Organization));
        assert!(is_valid_entity("O'Brien", Person));
    }

    #[test]
    fn test_length_bounds() {
        assert!(!is_valid_entity("%%", Location));
        assert!(!is_valid_entity("ab", Person));
        assert!(is_valid_entity("abc", Person));
        assert!(is_valid_entity(&"a".repeat(50), Organization));
        assert!(!is_valid_entity(&"a".repeat(101), Organization));
    }

    #[test]
    fn test_rejects_markup_and_artifacts() {
        assert!(!is_valid_entity("<div class", Organization));
        assert!(!is_valid_entity("&nbsp; Paris", Location));
        assert!(!is_valid_entity("textStyle", Organization));
        assert!(!is_valid_entity("HASH(0x1234)", Person));
        assert!(!is_valid_entity("DefaultParagraphName", Organization));
        assert!(!is_valid_entity("Maxwell=20Paris", Person));
        assert!(!is_valid_entity("https://example.com", Organization));
        assert!(!is_valid_entity("www.example", Organization));
    }

    #[test]
    fn test_rejects_mail_fragments() {
        assert!(!is_valid_entity("Subject: Flight", Person));
        assert!(!is_valid_entity("mailto:jeff", Person));
        assert!(!is_valid_entity("jeff@gmail.com", Person));
        assert!(!is_valid_entity("Message Sent", Person));
        assert!(!is_valid_entity("Sender", Person));
    }

    #[test]
    fn test_rejects_reject_words_case_insensitive() {
        assert!(!is_valid_entity("Twitter", Organization));
        assert!(!is_valid_entity("FRI", Person));
        assert!(!is_valid_entity("Brexit", Person));
    }

    #[test]
    fn test_rejects_numbers_and_symbols() {
        assert!(!is_valid_entity("12345", Person));
        assert!(!is_valid_entity("123-456", Person));
        assert!(!is_valid_entity("& Alcorta", Location));
        assert!(!is_valid_entity("#Section", Location));
        assert!(!is_valid_entity("Page 33", Location));
        assert!(!is_valid_entity("12-25-2015 meeting", Person));
        assert!(is_valid_entity("John123", Person));
    }

    #[test]
    fn test_person_rules() {
        assert!(!is_valid_entity("ALLLCAPSNAME", Person));
        assert!(is_valid_entity("ALLLCAPSNAME", Organization));
        assert!(is_valid_entity("JOHN", Person));
        assert!(!is_valid_entity("Page", Person));
        assert!(!is_valid_entity("the", Person));
    }

    #[test]
    fn test_location_rules() {
        assert!(!is_valid_entity("Paris!!!??", Location));
        assert!(is_valid_entity("Paris!!", Location));
    }

    #[test]
    fn test_org_special_ratio() {
        assert!(!is_valid_entity("Dai-ichi!!!Life@@@", Organization));
        assert!(is_valid_entity("AT&T Inc.", Organization));
    }

    #[test]
    fn test_validate_ner_span() {
        assert_eq!(validate_ner_span("  Paris ", "GPE"), Some((Location, "Paris")));
        assert_eq!(validate_ner_span("Maxwell", "PERSON"), Some((Person, "Maxwell")));
        assert_eq!(validate_ner_span("Page 33", "LOC"), None);
        assert_eq!(validate_ner_span("July 4, 2015", "DATE"), None);
        assert_eq!(validate_ner_span("$100", "MONEY"), None);
    }
}
