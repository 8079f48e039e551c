//! Entity extraction
//!
//! Named entities (people, organizations, locations) come from an external
//! NER collaborator behind the `EntityExtractor` trait. Dates and emails
//! are pulled out here with regexes. `build_entity_set` merges both into
//! the validated `EntitySet` that gets stored per document.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::interface::EntityKind;
use crate::models::EntitySet;
use crate::validation::{is_valid_entity, validate_ner_span};

static DATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // 2015-07-12
        r"\b\d{4}-\d{2}-\d{2}\b",
        // 7/12/2015
        r"\b\d{1,2}/\d{1,2}/\d{4}\b",
        // 7-12-2015
        r"\b\d{1,2}-\d{1,2}-\d{4}\b",
        // July 12, 2015
        r"\b(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]* \d{1,2},? \d{4}\b",
    ]
    .into_iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static EMAIL_CANDIDATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

/// Raw named-entity output for one text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub organizations: Vec<String>,
    #[serde(default)]
    pub locations: Vec<String>,
}

impl ExtractedEntities {
    /// Collect labelled NER spans, keeping only valid people, organizations
    /// and locations (GPE and LOC both count as locations).
    pub fn from_spans<'a, I>(spans: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut out = Self::default();
        for (text, label) in spans {
            if let Some((kind, text)) = validate_ner_span(text, label) {
                out.get_mut(kind).push(text.to_string());
            }
        }
        out
    }

    pub fn get(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::Person => &self.people,
            EntityKind::Organization => &self.organizations,
            EntityKind::Location => &self.locations,
            EntityKind::Date | EntityKind::Email => &[],
        }
    }

    fn get_mut(&mut self, kind: EntityKind) -> &mut Vec<String> {
        match kind {
            EntityKind::Person => &mut self.people,
            EntityKind::Location => &mut self.locations,
            _ => &mut self.organizations,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty() && self.organizations.is_empty() && self.locations.is_empty()
    }
}

/// NER collaborator. Implementations run a model (or a service) over text;
/// the core only consumes their output.
pub trait EntityExtractor: Send + Sync {
    fn extract(&self, text: &str) -> ExtractedEntities;
}

impl<F> EntityExtractor for F
where
    F: Fn(&str) -> ExtractedEntities + Send + Sync,
{
    fn extract(&self, text: &str) -> ExtractedEntities {
        self(text)
    }
}

/// Dates in any of the four recognised formats, in order of first appearance.
pub fn extract_dates(text: &str) -> Vec<String> {
    let mut dates: Vec<String> = Vec::new();
    for pattern in DATE_PATTERNS.iter() {
        for m in pattern.find_iter(text) {
            let date = m.as_str().to_string();
            if !dates.contains(&date) {
                dates.push(date);
            }
        }
    }
    dates
}

/// Email addresses, each regex candidate confirmed by `validate_email`.
pub fn extract_emails(text: &str) -> Vec<String> {
    let mut emails: Vec<String> = Vec::new();
    for m in EMAIL_CANDIDATE.find_iter(text) {
        let email = m.as_str();
        if validator::validate_email(email) && !emails.iter().any(|e| e == email) {
            emails.push(email.to_string());
        }
    }
    emails
}

/// Validated entity set for a document: NER output filtered through the
/// quality rules plus regex-extracted dates and emails.
pub fn build_entity_set(text: &str, ner: &ExtractedEntities) -> EntitySet {
    let mut set = EntitySet::new();
    for kind in EntityKind::NAMED {
        for value in ner.get(kind) {
            let value = value.trim();
            if is_valid_entity(value, kind) {
                set.insert(kind, value);
            }
        }
    }
    for date in extract_dates(text) {
        set.insert(EntityKind::Date, date);
    }
    for email in extract_emails(text) {
        set.insert(EntityKind::Email, email);
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "On July 15, 2015, Jeffrey Epstein met with Ghislaine Maxwell in Paris.\n\
        The meeting was arranged via email at ghislaine@example.com on 7/16/2015.\n\
        Follow-up filed 2015-07-20 and again 07-21-2015.";

    #[test]
    fn test_extract_dates_all_formats() {
        let dates = extract_dates(SAMPLE);
        assert_eq!(dates, vec!["2015-07-20", "7/16/2015", "07-21-2015", "July 15, 2015"]);
    }

    #[test]
    fn test_extract_dates_none() {
        assert!(extract_dates("no dates here, just 2015").is_empty());
    }

    #[test]
    fn test_extract_emails_dedup() {
        let emails = extract_emails("a@example.com, b@example.org and a@example.com again");
        assert_eq!(emails, vec!["a@example.com", "b@example.org"]);
    }

    #[test]
    fn test_extract_emails_rejects_invalid() {
        assert!(extract_emails("reach me at user@localhost").is_empty());
    }

    #[test]
    fn test_from_spans_filters_labels_and_noise() {
        let extracted = ExtractedEntities::from_spans([
            ("Jeffrey Epstein", "PERSON"),
            ("Paris", "GPE"),
            ("Little St. James", "LOC"),
            ("FBI", "ORG"),
            ("Page 33", "LOC"),
            ("$500", "MONEY"),
        ]);
        assert_eq!(extracted.people, vec!["Jeffrey Epstein"]);
        assert_eq!(extracted.locations, vec!["Paris", "Little St. James"]);
        assert_eq!(extracted.organizations, vec!["FBI"]);
    }

    #[test]
    fn test_build_entity_set_validates_and_merges() {
        let ner = ExtractedEntities {
            people: vec!["Jeffrey Epstein".into(), "Ghislaine Maxwell".into(), "ALLLCAPSNAME".into()],
            organizations: vec!["textStyle".into()],
            locations: vec!["Paris".into(), "%%".into(), " Paris ".into()],
        };
        let set = build_entity_set(SAMPLE, &ner);
        assert_eq!(set.list(EntityKind::Person), vec!["Ghislaine Maxwell", "Jeffrey Epstein"]);
        assert!(set.organizations.is_empty());
        assert_eq!(set.list(EntityKind::Location), vec!["Paris"]);
        assert_eq!(set.dates.len(), 4);
        assert_eq!(set.list(EntityKind::Email), vec!["ghislaine@example.com"]);
    }

    #[test]
    fn test_closure_extractor() {
        let extractor = |text: &str| ExtractedEntities {
            people: text.contains("Maxwell").then(|| "Maxwell".to_string()).into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(extractor.extract("Maxwell Paris").people, vec!["Maxwell"]);
        assert!(extractor.extract("Paris").is_empty());
    }
}
