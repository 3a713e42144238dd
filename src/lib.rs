// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Mail Insight
//!
//! Turns locally stored email into a uniform, immutable message model and
//! derives lightweight semantic metadata from it.
//!
//! # Pipeline
//!
//! - [`MailSource`] supplies raw bytes per folder and source id
//!   ([`MaildirSource`] reads a directory-per-folder tree)
//! - [`parse_message`] decodes headers, picks a body and collects attachments
//! - [`LocalIngestor`] enumerates, parses and searches folders lazily
//! - [`EmailAnalyzer`] scores sentiment, topics, entities and a summary per
//!   message or conversation, and aggregates results into [`Insights`]
//!
//! # Example
//!
//! ```rust
//! use mail_insight::{Analyzer, EmailAnalyzer, ParseContext, parse_message};
//!
//! let raw = b"From: a@example.com\r\nTo: b@example.com\r\nSubject: Hello\r\n\r\nThanks!";
//! let message = parse_message(raw, &ParseContext::new("INBOX", "1")).unwrap();
//!
//! let result = EmailAnalyzer::default().analyze(&message);
//! assert!(result.sentiment() > 0.0);
//! assert_eq!(result.message_id(), Some(message.id()));
//! ```

mod analyzer;
mod config;
mod error;
mod extracted;
mod ingest;
mod parser;
mod types;

pub use analyzer::{
    AnalysisResult, Analyzer, EMPTY_INSIGHTS_ERROR, EmailAnalyzer, Insights, SUMMARY_MARKER,
    SentimentBreakdown, SentimentLabel, TopicFrequency, keys,
};
pub use config::{AnalyzerConfig, Config, IngestConfig, SUMMARY_MAX_CHARS};
pub use error::{ErrorKind, MailError, Result};
pub use extracted::*;
pub use ingest::{
    Ingestor, LocalIngestor, MailSource, MaildirSource, Messages, SearchResults, SessionToken,
    SkippedMessage, SourceEntry,
};
pub use parser::{ParseContext, parse_message, strip_html, synthetic_id};
pub use types::*;
