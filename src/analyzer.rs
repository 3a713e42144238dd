//! Heuristic message analysis.
//!
//! Everything here is a fixed, explainable function of message text:
//! sentiment comes from a word lexicon, topics from a keyword table,
//! entities from the regexes in [`crate::extracted`]. The same input always
//! produces the same [`AnalysisResult`].

use crate::config::{AnalyzerConfig, SUMMARY_MAX_CHARS};
use crate::error::{MailError, Result};
use crate::extracted::ExtractedEntities;
use crate::types::Message;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

/// Metadata keys set by [`EmailAnalyzer`]
pub mod keys {
    pub const MESSAGE_ID: &str = "message_id";
    pub const DATE: &str = "date";
    pub const HAS_ATTACHMENTS: &str = "has_attachments";
    pub const ATTACHMENT_COUNT: &str = "attachment_count";
    pub const WORD_COUNT: &str = "word_count";
    pub const MESSAGE_COUNT: &str = "message_count";
    pub const DATE_RANGE: &str = "date_range";
    pub const PARTICIPANTS: &str = "participants";
    pub const THREAD_SUBJECT: &str = "thread_subject";
}

/// Appended to summaries that were cut short
pub const SUMMARY_MARKER: &str = "...";

/// Error reported by insights over an empty batch
pub const EMPTY_INSIGHTS_ERROR: &str = "no analysis results provided";

/// Outcome of analyzing one message or one conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    sentiment: f64,
    topics: Vec<String>,
    entities: Vec<String>,
    summary: String,
    confidence: f64,
    metadata: BTreeMap<String, Value>,
}

impl AnalysisResult {
    /// Sentiment is clamped to [-1, 1] and confidence to [0, 1] (non-finite
    /// values become 0), duplicate topics and entities are dropped, and the
    /// summary is cut to [`SUMMARY_MAX_CHARS`].
    #[must_use]
    pub fn new(
        sentiment: f64,
        topics: Vec<String>,
        entities: Vec<String>,
        summary: &str,
        confidence: f64,
        metadata: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            sentiment: bounded(sentiment, -1.0, 1.0),
            topics: dedup(topics),
            entities: dedup(entities),
            summary: truncate_summary(summary, SUMMARY_MAX_CHARS),
            confidence: bounded(confidence, 0.0, 1.0),
            metadata,
        }
    }

    /// Score in [-1, 1]; negative is unfavourable
    #[must_use]
    pub const fn sentiment(&self) -> f64 {
        self.sentiment
    }

    #[must_use]
    pub fn sentiment_label(&self) -> SentimentLabel {
        SentimentLabel::from_score(self.sentiment)
    }

    /// Topics, strongest first
    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Entities in order of first appearance
    #[must_use]
    pub fn entities(&self) -> &[String] {
        &self.entities
    }

    #[must_use]
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Confidence in [0, 1]
    #[must_use]
    pub const fn confidence(&self) -> f64 {
        self.confidence
    }

    #[must_use]
    pub const fn metadata(&self) -> &BTreeMap<String, Value> {
        &self.metadata
    }

    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.metadata.get(keys::MESSAGE_ID).and_then(Value::as_str)
    }

    /// Number of messages behind a conversation result
    #[must_use]
    pub fn message_count(&self) -> Option<usize> {
        self.metadata
            .get(keys::MESSAGE_COUNT)
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
    }

    /// Earliest and latest message dates of a conversation result
    #[must_use]
    pub fn date_range(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let range = self.metadata.get(keys::DATE_RANGE)?.as_array()?;
        let parse = |v: &Value| DateTime::parse_from_rfc3339(v.as_str()?).ok();
        match range.as_slice() {
            [start, end] => Some((parse(start)?, parse(end)?)),
            _ => None,
        }
    }
}

/// Coarse reading of a sentiment score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SentimentLabel {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl SentimentLabel {
    const THRESHOLD: f64 = 0.2;

    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score > Self::THRESHOLD {
            Self::Positive
        } else if score < -Self::THRESHOLD {
            Self::Negative
        } else {
            Self::Neutral
        }
    }
}

/// Aggregate view over a batch of results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub total_analyzed: usize,

    /// Mean sentiment; `None` for an empty batch
    pub average_sentiment: Option<f64>,

    /// Mean confidence; `None` for an empty batch
    pub average_confidence: Option<f64>,

    /// Topics by frequency, ties in first-seen order
    pub common_topics: Vec<TopicFrequency>,

    pub sentiment_breakdown: SentimentBreakdown,

    /// Set when the batch could not be aggregated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Insights {
    fn empty() -> Self {
        Self {
            total_analyzed: 0,
            average_sentiment: None,
            average_confidence: None,
            common_topics: Vec::new(),
            sentiment_breakdown: SentimentBreakdown::default(),
            error: Some(EMPTY_INSIGHTS_ERROR.to_string()),
        }
    }

    #[must_use]
    pub const fn is_empty_input(&self) -> bool {
        self.total_analyzed == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicFrequency {
    pub topic: String,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentimentBreakdown {
    pub positive: usize,
    pub neutral: usize,
    pub negative: usize,
}

/// Analysis operations over standardized messages
pub trait Analyzer {
    /// Analyze one message
    fn analyze(&self, message: &Message) -> AnalysisResult;

    /// Analyze an ordered thread. Fails on an empty slice.
    fn analyze_conversation(&self, messages: &[Message]) -> Result<AnalysisResult>;

    /// Aggregate a batch of results
    fn get_insights(&self, results: &[AnalysisResult]) -> Insights;
}

/// Lexicon and keyword based [`Analyzer`]
#[derive(Debug, Clone, Default)]
pub struct EmailAnalyzer {
    config: AnalyzerConfig,
}

impl EmailAnalyzer {
    #[must_use]
    pub const fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }
}

impl Analyzer for EmailAnalyzer {
    fn analyze(&self, message: &Message) -> AnalysisResult {
        let text = format!("{}\n{}", message.subject(), message.body());
        let signals = TextSignals::from_text(&text);

        let mut metadata = BTreeMap::new();
        metadata.insert(keys::MESSAGE_ID.to_string(), json!(message.id()));
        metadata.insert(keys::DATE.to_string(), json!(message.date().to_rfc3339()));
        metadata.insert(
            keys::HAS_ATTACHMENTS.to_string(),
            json!(!message.attachments().is_empty()),
        );
        metadata.insert(
            keys::ATTACHMENT_COUNT.to_string(),
            json!(message.attachments().len()),
        );
        metadata.insert(keys::WORD_COUNT.to_string(), json!(signals.word_count));

        AnalysisResult::new(
            signals.sentiment,
            signals
                .topics
                .iter()
                .take(self.config.max_topics)
                .map(|(topic, _)| (*topic).to_string())
                .collect(),
            signals
                .entities
                .iter()
                .take(self.config.max_entities)
                .cloned()
                .collect(),
            &summarize(
                [(message.subject(), message.body())],
                self.config.summary_limit(),
            ),
            signals.confidence(),
            metadata,
        )
    }

    fn analyze_conversation(&self, messages: &[Message]) -> Result<AnalysisResult> {
        let (first, rest) = messages
            .split_first()
            .ok_or_else(|| MailError::Analysis("conversation contains no messages".into()))?;

        let per_message: Vec<AnalysisResult> = messages.iter().map(|m| self.analyze(m)).collect();

        let topics = rank_by_frequency(
            per_message
                .iter()
                .flat_map(|r| r.topics.iter().map(String::as_str)),
        )
        .into_iter()
        .take(self.config.max_topics)
        .map(|(topic, _)| topic)
        .collect();

        let entities = dedup(
            per_message
                .iter()
                .flat_map(|r| r.entities.iter().cloned())
                .collect(),
        )
        .into_iter()
        .take(self.config.max_entities)
        .collect();

        let (start, end) = rest
            .iter()
            .fold((first.date(), first.date()), |(start, end), m| {
                (start.min(m.date()), end.max(m.date()))
            });

        let participants: Vec<String> = dedup(
            messages
                .iter()
                .map(|m| m.from().address.clone())
                .collect(),
        );

        let mut metadata = BTreeMap::new();
        metadata.insert(keys::MESSAGE_COUNT.to_string(), json!(messages.len()));
        metadata.insert(
            keys::DATE_RANGE.to_string(),
            json!([start.to_rfc3339(), end.to_rfc3339()]),
        );
        metadata.insert(keys::PARTICIPANTS.to_string(), json!(participants));
        metadata.insert(
            keys::THREAD_SUBJECT.to_string(),
            json!(normalize_subject(first.subject())),
        );

        Ok(AnalysisResult::new(
            mean(per_message.iter().map(AnalysisResult::sentiment)),
            topics,
            entities,
            &summarize(
                messages.iter().map(|m| (m.subject(), m.body())),
                self.config.summary_limit(),
            ),
            mean(per_message.iter().map(AnalysisResult::confidence)),
            metadata,
        ))
    }

    fn get_insights(&self, results: &[AnalysisResult]) -> Insights {
        if results.is_empty() {
            return Insights::empty();
        }

        let mut sentiment_breakdown = SentimentBreakdown::default();
        for result in results {
            match result.sentiment_label() {
                SentimentLabel::Positive => sentiment_breakdown.positive += 1,
                SentimentLabel::Neutral => sentiment_breakdown.neutral += 1,
                SentimentLabel::Negative => sentiment_breakdown.negative += 1,
            }
        }

        let common_topics = rank_by_frequency(
            results
                .iter()
                .flat_map(|r| r.topics.iter().map(String::as_str)),
        )
        .into_iter()
        .take(self.config.common_topics_limit)
        .map(|(topic, count)| TopicFrequency { topic, count })
        .collect();

        Insights {
            total_analyzed: results.len(),
            average_sentiment: Some(mean(results.iter().map(AnalysisResult::sentiment))),
            average_confidence: Some(mean(results.iter().map(AnalysisResult::confidence))),
            common_topics,
            sentiment_breakdown,
            error: None,
        }
    }
}

const POSITIVE_WORDS: &[&str] = &[
    "thank", "thanks", "thankful", "appreciate", "appreciated", "great", "excellent", "good",
    "happy", "glad", "pleased", "love", "wonderful", "awesome", "congratulations", "success",
    "successful", "perfect", "helpful", "resolved", "excited", "nice", "welcome",
];

const NEGATIVE_WORDS: &[&str] = &[
    "complaint", "frustrated", "disappointed", "disappointing", "problem", "problems", "bad",
    "angry", "unhappy", "sorry", "fail", "failed", "failure", "broken", "delay", "delayed",
    "unfortunately", "wrong", "poor", "terrible", "worse", "worst", "annoyed", "refund",
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "wasn't", "aren't", "can't",
    "cannot", "won't", "without", "hardly",
];

/// Topic name and the words that count as a hit, in tie-break order
const TOPICS: &[(&str, &[&str])] = &[
    (
        "meeting",
        &["meeting", "meet", "schedule", "scheduled", "calendar", "agenda", "call", "appointment", "invite"],
    ),
    (
        "project",
        &["project", "deadline", "milestone", "release", "roadmap", "deliverable", "sprint", "launch"],
    ),
    (
        "finance",
        &["invoice", "payment", "budget", "price", "cost", "billing", "refund", "quote", "paid", "pay"],
    ),
    (
        "support",
        &["issue", "bug", "error", "help", "ticket", "support", "problem", "broken", "fix"],
    ),
    (
        "travel",
        &["flight", "hotel", "trip", "travel", "booking", "itinerary"],
    ),
    (
        "hiring",
        &["interview", "candidate", "resume", "hiring", "position", "offer"],
    ),
    (
        "security",
        &["password", "login", "account", "verify", "security", "suspicious"],
    ),
    (
        "newsletter",
        &["unsubscribe", "newsletter", "subscription", "digest"],
    ),
    (
        "social",
        &["party", "dinner", "lunch", "birthday", "weekend", "celebration"],
    ),
];

static WORD_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z][A-Za-z']*").unwrap());

/// Everything the heuristics read out of one text
struct TextSignals {
    sentiment: f64,
    lexicon_hits: usize,
    /// Topics with hit counts, strongest first
    topics: Vec<(&'static str, usize)>,
    entities: Vec<String>,
    word_count: usize,
}

impl TextSignals {
    fn from_text(text: &str) -> Self {
        let tokens: Vec<String> = WORD_REGEX
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect();
        let (sentiment, lexicon_hits) = score_sentiment(&tokens);

        Self {
            sentiment,
            lexicon_hits,
            topics: match_topics(&tokens),
            entities: ExtractedEntities::extract(text).ordered(),
            word_count: tokens.len(),
        }
    }

    /// 0.1 for empty text; otherwise 0.4, plus 0.1 per signal up to four,
    /// plus 0.1 for texts of twenty words or more
    #[allow(clippy::cast_precision_loss)]
    fn confidence(&self) -> f64 {
        if self.word_count == 0 {
            return 0.1;
        }
        let topic_hits: usize = self.topics.iter().map(|(_, hits)| hits).sum();
        let signals = (self.lexicon_hits + topic_hits + self.entities.len()).min(4);
        let length_bonus = if self.word_count >= 20 { 0.1 } else { 0.0 };
        0.4 + 0.1 * signals as f64 + length_bonus
    }
}

/// `(pos - neg) / (pos + neg + 1)`, where a negator in the two preceding
/// tokens flips a word's polarity
#[allow(clippy::cast_precision_loss)]
fn score_sentiment(tokens: &[String]) -> (f64, usize) {
    let (mut positive, mut negative) = (0usize, 0usize);

    for (i, token) in tokens.iter().enumerate() {
        let is_positive = if POSITIVE_WORDS.contains(&token.as_str()) {
            true
        } else if NEGATIVE_WORDS.contains(&token.as_str()) {
            false
        } else {
            continue;
        };
        let negated = tokens[i.saturating_sub(2)..i]
            .iter()
            .any(|t| NEGATORS.contains(&t.as_str()));

        if is_positive == negated {
            negative += 1;
        } else {
            positive += 1;
        }
    }

    let hits = positive + negative;
    let score = (positive as f64 - negative as f64) / (hits as f64 + 1.0);
    (score, hits)
}

fn match_topics(tokens: &[String]) -> Vec<(&'static str, usize)> {
    let mut topics: Vec<(&'static str, usize)> = TOPICS
        .iter()
        .map(|(topic, words)| {
            let hits = tokens
                .iter()
                .filter(|t| words.contains(&t.as_str()))
                .count();
            (*topic, hits)
        })
        .filter(|(_, hits)| *hits > 0)
        .collect();
    // stable: equal counts keep table order
    topics.sort_by(|a, b| b.1.cmp(&a.1));
    topics
}

/// Items with their counts, most frequent first, ties in first-seen order
fn rank_by_frequency<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut ranked: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for item in items {
        if let Some(&i) = index.get(item) {
            ranked[i].1 += 1;
        } else {
            index.insert(item, ranked.len());
            ranked.push((item.to_string(), 1));
        }
    }

    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = Vec::with_capacity(items.len());
    for item in items {
        if !seen.contains(&item) {
            seen.push(item);
        }
    }
    seen
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn bounded(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        0.0
    }
}

/// `subject: body` per message, joined with ` | `, whitespace collapsed and
/// cut to `limit` characters
fn summarize<'a>(parts: impl IntoIterator<Item = (&'a str, &'a str)>, limit: usize) -> String {
    let joined = parts
        .into_iter()
        .map(|(subject, body)| {
            let subject = subject.split_whitespace().collect::<Vec<_>>().join(" ");
            let body = body.split_whitespace().collect::<Vec<_>>().join(" ");
            match (subject.is_empty(), body.is_empty()) {
                (false, false) => format!("{subject}: {body}"),
                (false, true) => subject,
                _ => body,
            }
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");

    truncate_summary(&joined, limit)
}

fn truncate_summary(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    if limit < SUMMARY_MARKER.len() {
        return text.chars().take(limit).collect();
    }

    let kept: String = text.chars().take(limit - SUMMARY_MARKER.len()).collect();
    format!("{}{SUMMARY_MARKER}", kept.trim_end())
}

/// Subject with any run of `Re:`, `Fwd:`, `Fw:` or `Re[n]:` prefixes removed
fn normalize_subject(subject: &str) -> String {
    let mut rest = subject.trim();

    loop {
        let lower = rest.to_lowercase();
        let prefix_len = ["re:", "fwd:", "fw:"]
            .iter()
            .find(|prefix| lower.starts_with(**prefix))
            .map(|prefix| prefix.len())
            .or_else(|| {
                lower
                    .starts_with("re[")
                    .then(|| lower.find("]:").map(|end| end + 2))
                    .flatten()
            });

        match prefix_len.and_then(|n| rest.get(n..)) {
            Some(stripped) => rest = stripped.trim_start(),
            None => break,
        }
    }

    rest.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<String> {
        WORD_REGEX
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }

    #[test]
    fn test_negation_flips_polarity() {
        let (score, hits) = score_sentiment(&tokens("This is not good"));
        assert_eq!(hits, 1);
        assert!(score < 0.0);

        let (score, _) = score_sentiment(&tokens("No problem at all"));
        assert!(score > 0.0);
    }

    #[test]
    fn test_topic_ties_keep_table_order() {
        let topics = match_topics(&tokens("flight meeting"));
        assert_eq!(topics, vec![("meeting", 1), ("travel", 1)]);
    }

    #[test]
    fn test_rank_by_frequency_ties_first_seen() {
        let ranked = rank_by_frequency(["b", "a", "a", "c", "b", "d"]);
        let names: Vec<&str> = ranked.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(names, ["b", "a", "c", "d"]);
        assert_eq!(ranked[0].1, 2);
    }

    #[test]
    fn test_truncate_summary_respects_cap() {
        let long = "word ".repeat(100);
        let summary = truncate_summary(&long, SUMMARY_MAX_CHARS);
        assert!(summary.chars().count() <= SUMMARY_MAX_CHARS);
        assert!(summary.ends_with(SUMMARY_MARKER));
    }

    #[test]
    fn test_normalize_subject() {
        assert_eq!(normalize_subject("Re: RE: Fwd: Budget"), "Budget");
        assert_eq!(normalize_subject("Re[3]: Plans"), "Plans");
        assert_eq!(normalize_subject("Regarding plans"), "Regarding plans");
    }
}
