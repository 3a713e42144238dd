//! Entity extraction from message text

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// All entities found in a piece of text, grouped by kind
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedEntities {
    /// Email addresses mentioned in the text
    pub emails: Vec<Mention>,

    /// URLs
    pub urls: Vec<Mention>,

    /// Phone numbers, as written
    pub phone_numbers: Vec<Mention>,

    /// Monetary amounts
    pub amounts: Vec<MonetaryAmount>,

    /// Capitalized multi-word names (people, companies, products)
    pub names: Vec<Mention>,
}

/// A span of text recognized as an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub text: String,
    /// Byte offset in the source text
    pub position: usize,
}

/// Monetary amount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonetaryAmount {
    pub raw: String,
    pub value: f64,
    pub currency: String,
    pub position: usize,
}

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap()
});

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\+?1[-.\s]?)?(?:\(?\d{3}\)?[-.\s]?)?\d{3}[-.\s]?\d{4}\b").unwrap()
});

static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>\[\]{}|\\^]+").unwrap());

static AMOUNT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[$€£])\s*\d[\d,]*(?:\.\d{2})?|\d[\d,]*(?:\.\d{2})?\s*(?:USD|EUR|GBP|CAD|AUD)")
        .unwrap()
});

static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z][a-z]+(?: [A-Z][a-z]+)+\b").unwrap());

/// Capitalized words that start sentences or greetings rather than names
const NAME_STOPWORDS: &[&str] = &[
    "Dear", "Hi", "Hello", "Hey", "Thanks", "Thank", "Regards", "Best", "Kind", "The", "This",
    "That", "Please", "Re", "Fwd", "Subject", "From", "To", "Mr", "Mrs", "Ms", "Dr",
];

impl ExtractedEntities {
    /// Extract all entities from text content
    #[must_use]
    pub fn extract(text: &str) -> Self {
        let mut entities = Self::default();

        entities.emails = mentions(&EMAIL_REGEX, text);
        entities.urls = URL_REGEX
            .find_iter(text)
            .map(|m| Mention {
                text: m.as_str().trim_end_matches(['.', ',', ')', ';']).to_string(),
                position: m.start(),
            })
            .collect();
        entities.phone_numbers = mentions(&PHONE_REGEX, text);

        entities.amounts = AMOUNT_REGEX
            .find_iter(text)
            .filter_map(|m| parse_amount(m.as_str(), m.start()))
            .collect();

        entities.names = NAME_REGEX
            .find_iter(text)
            .filter_map(|m| {
                let (offset, name) = strip_leading_stopwords(m.as_str());
                (name.split(' ').count() >= 2).then(|| Mention {
                    text: name.to_string(),
                    position: m.start() + offset,
                })
            })
            .collect();

        entities
    }

    /// Check if any entities were extracted
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.emails.is_empty()
            && self.urls.is_empty()
            && self.phone_numbers.is_empty()
            && self.amounts.is_empty()
            && self.names.is_empty()
    }

    /// All entities as strings, ordered by first appearance.
    ///
    /// Spans nested inside an earlier, longer span (a phone number inside a
    /// URL, say) are dropped, and repeated entities keep their first slot.
    #[must_use]
    pub fn ordered(&self) -> Vec<String> {
        let mut spans: Vec<(usize, usize, &str)> = self
            .emails
            .iter()
            .chain(&self.urls)
            .chain(&self.phone_numbers)
            .chain(&self.names)
            .map(|m| (m.position, m.position + m.text.len(), m.text.as_str()))
            .chain(
                self.amounts
                    .iter()
                    .map(|a| (a.position, a.position + a.raw.len(), a.raw.as_str())),
            )
            .collect();

        spans.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut ordered: Vec<String> = Vec::new();
        let mut covered_until = 0;
        for (start, end, text) in spans {
            if start < covered_until {
                continue;
            }
            covered_until = end;
            if !ordered.iter().any(|seen| seen == text) {
                ordered.push(text.to_string());
            }
        }
        ordered
    }
}

fn mentions(regex: &Regex, text: &str) -> Vec<Mention> {
    regex
        .find_iter(text)
        .map(|m| Mention {
            text: m.as_str().to_string(),
            position: m.start(),
        })
        .collect()
}

/// Drop greeting words from the front of a name candidate, returning the
/// byte offset of what remains
fn strip_leading_stopwords(candidate: &str) -> (usize, &str) {
    let mut offset = 0;
    let mut rest = candidate;
    while let Some((first, tail)) = rest.split_once(' ') {
        if !NAME_STOPWORDS.contains(&first) {
            break;
        }
        offset += first.len() + 1;
        rest = tail;
    }
    (offset, rest)
}

fn parse_amount(raw: &str, position: usize) -> Option<MonetaryAmount> {
    let clean: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let value: f64 = clean.parse().ok()?;

    let currency = if raw.contains('€') || raw.contains("EUR") {
        "EUR"
    } else if raw.contains('£') || raw.contains("GBP") {
        "GBP"
    } else if raw.contains("CAD") {
        "CAD"
    } else if raw.contains("AUD") {
        "AUD"
    } else {
        "USD"
    };

    Some(MonetaryAmount {
        raw: raw.trim().to_string(),
        value,
        currency: currency.to_string(),
        position,
    })
}
