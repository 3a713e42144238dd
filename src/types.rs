//! Standardized message model

use crate::error::{MailError, Result};
use chrono::{DateTime, FixedOffset, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Content type used when a source does not declare one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One email in its standardized, decoded form.
///
/// Everything except the read flag is fixed at construction. The read flag
/// is atomic so a message can be shared across worker threads and marked
/// without exclusive access.
#[derive(Debug)]
pub struct Message {
    id: String,
    from: EmailAddress,
    to: Vec<EmailAddress>,
    date: DateTime<FixedOffset>,
    subject: String,
    body: String,
    attachments: Vec<Attachment>,
    folder: Option<String>,
    is_read: AtomicBool,
}

/// Parts assembled by the parser, already validated
pub(crate) struct MessageParts {
    pub id: String,
    pub from: EmailAddress,
    pub to: Vec<EmailAddress>,
    pub date: DateTime<FixedOffset>,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
    pub folder: Option<String>,
    pub is_read: bool,
}

/// Explicit fields for building a [`Message`] without a raw source.
///
/// `id`, `from` and `date` are required. Everything else has a fixed
/// default: empty `to`/`subject`/`body`, no attachments, unread, no folder.
#[derive(Debug, Clone, Default)]
pub struct MessageFields {
    /// Identifier, unique within its folder
    pub id: Option<String>,

    /// Sender, either `addr@host` or `Name <addr@host>`
    pub from: Option<String>,

    /// Comma separated recipients
    pub to: Option<String>,

    /// RFC 2822 or RFC 3339 timestamp with an offset
    pub date: Option<String>,

    pub subject: Option<String>,

    /// Decoded body text
    pub body: Option<String>,

    pub attachments: Vec<Attachment>,

    pub is_read: bool,

    /// Folder the message belongs to, if any
    pub folder: Option<String>,
}

impl Message {
    /// Build a message from explicit fields.
    pub fn from_fields(fields: MessageFields) -> Result<Self> {
        let id = fields
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(MailError::MissingField("id"))?;

        let from_raw = fields
            .from
            .filter(|f| !f.trim().is_empty())
            .ok_or(MailError::MissingField("from"))?;
        let from = EmailAddress::parse(&from_raw).ok_or_else(|| MailError::InvalidField {
            field: "from",
            details: format!("not an email address: {from_raw}"),
        })?;

        let date_raw = fields
            .date
            .filter(|d| !d.trim().is_empty())
            .ok_or(MailError::MissingField("date"))?;
        let date = parse_date(&date_raw).ok_or_else(|| MailError::InvalidField {
            field: "date",
            details: format!("unrecognized timestamp: {date_raw}"),
        })?;

        Ok(Self::from_parts(MessageParts {
            id,
            from,
            to: fields
                .to
                .as_deref()
                .map(EmailAddress::parse_list)
                .unwrap_or_default(),
            date,
            subject: fields.subject.unwrap_or_default(),
            body: fields.body.unwrap_or_default(),
            attachments: fields.attachments,
            folder: fields.folder,
            is_read: fields.is_read,
        }))
    }

    pub(crate) fn from_parts(parts: MessageParts) -> Self {
        Self {
            id: parts.id,
            from: parts.from,
            to: parts.to,
            date: parts.date,
            subject: parts.subject,
            body: parts.body,
            attachments: parts.attachments,
            folder: parts.folder,
            is_read: AtomicBool::new(parts.is_read),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn from(&self) -> &EmailAddress {
        &self.from
    }

    /// Recipients in header order
    #[must_use]
    pub fn to(&self) -> &[EmailAddress] {
        &self.to
    }

    /// Recipients joined the way they would appear in a `To:` header
    #[must_use]
    pub fn to_line(&self) -> String {
        self.to
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    #[must_use]
    pub const fn date(&self) -> DateTime<FixedOffset> {
        self.date
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Attachments in the order they appeared in the source
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    #[must_use]
    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    #[must_use]
    pub fn is_read(&self) -> bool {
        self.is_read.load(Ordering::Acquire)
    }

    pub fn mark_as_read(&self) {
        self.is_read.store(true, Ordering::Release);
    }

    pub fn mark_as_unread(&self) {
        self.is_read.store(false, Ordering::Release);
    }
}

impl Clone for Message {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            date: self.date,
            subject: self.subject.clone(),
            body: self.body.clone(),
            attachments: self.attachments.clone(),
            folder: self.folder.clone(),
            is_read: AtomicBool::new(self.is_read()),
        }
    }
}

/// A decoded attachment.
///
/// Content is decoded before construction, so `size()` is always the
/// length of `content()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    filename: String,
    content_type: String,
    content: Vec<u8>,
}

impl Attachment {
    /// Create an attachment from already decoded bytes.
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Result<Self> {
        let filename = filename.into().trim().to_string();
        if filename.is_empty() {
            return Err(MailError::InvalidField {
                field: "attachment.filename",
                details: "filename must not be empty".into(),
            });
        }

        let content_type = content_type.into().trim().to_lowercase();
        let content_type = if content_type.is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            content_type
        };

        Ok(Self {
            filename,
            content_type,
            content: content.into(),
        })
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Decoded byte length
    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }

    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

/// Email address with optional display name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,

    /// Bare address with the domain lowercased (e.g., "John@example.com")
    pub address: String,

    /// Part before the `@`
    pub local_part: String,

    /// Part after the `@`, lowercased
    pub domain: String,
}

impl EmailAddress {
    /// Parse `addr@host`, `<addr@host>` or `Name <addr@host>`
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();

        let (name, address) = match (s.find('<'), s.rfind('>')) {
            (Some(start), Some(end)) if start < end => {
                let name = s[..start].trim().trim_matches('"').trim();
                (
                    (!name.is_empty()).then(|| name.to_string()),
                    s[start + 1..end].trim(),
                )
            }
            _ => (None, s),
        };

        let (local, domain) = address.split_once('@')?;
        if local.is_empty() || domain.is_empty() || address.contains(char::is_whitespace) {
            return None;
        }

        // Domains are case-insensitive; the local part is kept as written
        let domain = domain.to_lowercase();
        Some(Self {
            name,
            address: format!("{local}@{domain}"),
            local_part: local.to_string(),
            domain,
        })
    }

    /// Parse a comma separated list, dropping entries that are not addresses.
    ///
    /// Commas inside a quoted display name or an angle-bracketed address do
    /// not split entries, so `"Doe, John" <john@x.com>` stays one address.
    #[must_use]
    pub fn parse_list(s: &str) -> Vec<Self> {
        let mut entries = Vec::new();
        let mut start = 0;
        let mut in_quotes = false;
        let mut in_angle = false;

        for (i, ch) in s.char_indices() {
            match ch {
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => in_angle = true,
                '>' if !in_quotes => in_angle = false,
                ',' if !in_quotes && !in_angle => {
                    entries.push(&s[start..i]);
                    start = i + 1;
                }
                _ => {}
            }
        }
        entries.push(&s[start..]);

        entries.into_iter().filter_map(Self::parse).collect()
    }

    /// Check if this is likely a noreply/automated address
    #[must_use]
    pub fn is_noreply(&self) -> bool {
        let lower = self.local_part.to_lowercase();
        ["noreply", "no-reply", "donotreply", "mailer-daemon"]
            .iter()
            .any(|marker| lower.contains(marker))
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if name.contains([',', ';', ':', '<', '>', '@']) => {
                write!(f, "\"{}\" <{}>", name.replace('"', "\\\""), self.address)
            }
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => write!(f, "{}", self.address),
        }
    }
}

/// Timestamp used when a source carries no usable `Date` header
#[must_use]
pub fn missing_date_sentinel() -> DateTime<FixedOffset> {
    DateTime::<Utc>::UNIX_EPOCH.fixed_offset()
}

/// Parse RFC 2822, RFC 3339, or anything `mailparse` understands (as UTC)
pub(crate) fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .or_else(|| {
            if !value.contains(|c: char| c.is_ascii_digit()) {
                return None;
            }
            mailparse::dateparse(value)
                .ok()
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
                .map(|dt| dt.fixed_offset())
        })
}
