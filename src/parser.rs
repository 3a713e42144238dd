//! Raw message parsing

use crate::error::{MailError, Result};
use crate::types::{
    Attachment, EmailAddress, Message, MessageParts, missing_date_sentinel, parse_date,
};
use chrono::{DateTime, FixedOffset};
use mailparse::{DispositionType, MailHeader, MailHeaderMap, ParsedMail};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Where a raw message came from
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Folder the source lives in
    pub folder: &'a str,

    /// Identifier of the source within its folder (e.g. a Maildir file name)
    pub source_id: &'a str,

    /// Read marker supplied by the storage layer rather than the message
    pub seen: bool,
}

impl<'a> ParseContext<'a> {
    #[must_use]
    pub const fn new(folder: &'a str, source_id: &'a str) -> Self {
        Self {
            folder,
            source_id,
            seen: false,
        }
    }

    #[must_use]
    pub const fn seen(mut self, seen: bool) -> Self {
        self.seen = seen;
        self
    }
}

/// Parse raw message bytes into a standardized [`Message`].
///
/// Fails with a parsing error when the source is empty, is rejected by the
/// MIME parser, or carries no usable `From` address. Undecodable parts do
/// not fail the message; they come through as empty text or empty bytes.
pub fn parse_message(raw: &[u8], ctx: &ParseContext<'_>) -> Result<Message> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(MailError::parsing(ctx.source_id, "empty message source"));
    }

    let parsed =
        mailparse::parse_mail(raw).map_err(|e| MailError::parsing(ctx.source_id, e.to_string()))?;

    let from = extract_from(&parsed.headers)
        .map_err(|reason| MailError::parsing(ctx.source_id, reason))?;
    let to = parsed
        .headers
        .get_first_value("To")
        .map(|v| EmailAddress::parse_list(&v))
        .unwrap_or_default();
    let subject = parsed
        .headers
        .get_first_value("Subject")
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let date = extract_date(&parsed.headers);
    let id = extract_message_id(&parsed.headers, raw);
    let is_read = ctx.seen || has_read_status(&parsed.headers);

    let mut content = Content::default();
    collect_parts(&parsed, ctx.source_id, &mut content);
    let body = content.take_body();

    debug!(
        source = ctx.source_id,
        folder = ctx.folder,
        attachments = content.attachments.len(),
        "Parsed message {id} from {}",
        from.address
    );

    Ok(Message::from_parts(MessageParts {
        id,
        from,
        to,
        date,
        subject,
        body,
        attachments: content.attachments,
        folder: Some(ctx.folder.to_string()),
        is_read,
    }))
}

fn extract_from(headers: &[MailHeader]) -> std::result::Result<EmailAddress, String> {
    let value = headers
        .get_first_value("From")
        .ok_or_else(|| "missing From header".to_string())?;

    EmailAddress::parse_list(&value)
        .into_iter()
        .next()
        .ok_or_else(|| format!("unparseable From header: {value}"))
}

fn extract_date(headers: &[MailHeader]) -> DateTime<FixedOffset> {
    headers
        .get_first_value("Date")
        .and_then(|v| parse_date(&v))
        .unwrap_or_else(missing_date_sentinel)
}

/// Header Message-ID without angle brackets, or a content hash when absent
fn extract_message_id(headers: &[MailHeader], raw: &[u8]) -> String {
    headers
        .get_first_value("Message-ID")
        .map(|v| v.trim().trim_start_matches('<').trim_end_matches('>').trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| synthetic_id(raw))
}

/// Deterministic identifier derived from the raw bytes
#[must_use]
pub fn synthetic_id(raw: &[u8]) -> String {
    let digest = Sha256::digest(raw);
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("synthetic-{hex}@local")
}

/// mbox writers record `Status: RO` once a message has been read
fn has_read_status(headers: &[MailHeader]) -> bool {
    headers
        .get_first_value("Status")
        .is_some_and(|v| v.contains('R'))
}

#[derive(Default)]
struct Content {
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<Attachment>,
}

impl Content {
    /// First `text/plain` part, else the first `text/html` part stripped of markup
    fn take_body(&mut self) -> String {
        let body = match (self.text.take(), self.html.take()) {
            (Some(text), _) => text,
            (None, Some(html)) => strip_html(&html),
            (None, None) => String::new(),
        };
        body.replace("\r\n", "\n").trim_end().to_string()
    }
}

/// Walk leaf parts depth-first, picking the body and collecting attachments
fn collect_parts(part: &ParsedMail, source_id: &str, content: &mut Content) {
    if !part.subparts.is_empty() {
        for sub in &part.subparts {
            collect_parts(sub, source_id, content);
        }
        return;
    }

    let mimetype = part.ctype.mimetype.to_lowercase();
    let disposition = part.get_content_disposition();
    let filename = disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    let marked_attachment = matches!(disposition.disposition, DispositionType::Attachment);

    if filename.is_none() && !marked_attachment && mimetype.starts_with("text/") {
        match mimetype.as_str() {
            "text/plain" if content.text.is_none() => {
                content.text = Some(decode_text(part, source_id));
            }
            "text/html" if content.html.is_none() => {
                content.html = Some(decode_text(part, source_id));
            }
            _ => {}
        }
        return;
    }

    let index = content.attachments.len();
    let filename = filename.unwrap_or_else(|| format!("attachment_{index}"));
    let bytes = part.get_body_raw().unwrap_or_else(|e| {
        debug!(source = source_id, "Undecodable attachment {filename}: {e}");
        Vec::new()
    });

    match Attachment::new(filename, mimetype, bytes) {
        Ok(attachment) => content.attachments.push(attachment),
        Err(e) => debug!(source = source_id, "Dropping attachment: {e}"),
    }
}

fn decode_text(part: &ParsedMail, source_id: &str) -> String {
    part.get_body().unwrap_or_else(|e| {
        debug!(source = source_id, "Undecodable {} part: {e}", part.ctype.mimetype);
        String::new()
    })
}

/// Reduce HTML to readable text: tags removed, script and style content
/// dropped, block ends turned into line breaks, common entities decoded
#[must_use]
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut rest = html;
    let mut skipping: Option<&str> = None;

    while let Some(open) = rest.find('<') {
        let opens_tag = rest[open + 1..]
            .starts_with(|c: char| c.is_ascii_alphabetic() || c == '/' || c == '!');
        if !opens_tag {
            // a bare `<` in text, e.g. `a < b`
            if skipping.is_none() {
                text.push_str(&rest[..=open]);
            }
            rest = &rest[open + 1..];
            continue;
        }

        if skipping.is_none() {
            text.push_str(&rest[..open]);
        }
        let Some(close) = rest[open..].find('>') else {
            rest = "";
            break;
        };
        let tag = rest[open + 1..open + close].trim().to_lowercase();
        rest = &rest[open + close + 1..];

        match skipping {
            Some(end_tag) if tag.starts_with(end_tag) => skipping = None,
            Some(_) => {}
            None if tag.starts_with("script") => skipping = Some("/script"),
            None if tag.starts_with("style") => skipping = Some("/style"),
            None => {
                if ["br", "/p", "/div", "/li", "/tr", "/h"]
                    .iter()
                    .any(|block| tag.starts_with(block))
                {
                    text.push('\n');
                }
            }
        }
    }
    if skipping.is_none() {
        text.push_str(rest);
    }

    decode_entities(&text)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Decode named and numeric (`&#8217;`, `&#x2019;`) character references.
/// Anything unrecognized is left as written.
fn decode_entities(text: &str) -> String {
    let mut decoded = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        decoded.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let entity = rest[1..]
            .find(';')
            .filter(|&end| end <= MAX_ENTITY_LEN)
            .and_then(|end| entity_char(&rest[1..=end]).map(|c| (c, end + 2)));
        match entity {
            Some((c, len)) => {
                decoded.push(c);
                rest = &rest[len..];
            }
            None => {
                decoded.push('&');
                rest = &rest[1..];
            }
        }
    }
    decoded.push_str(rest);
    decoded
}

const MAX_ENTITY_LEN: usize = 10;

/// Character for an entity name without its `&` and `;`
fn entity_char(name: &str) -> Option<char> {
    if let Some(number) = name.strip_prefix('#') {
        let code = match number.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => number.parse().ok()?,
        };
        // non-breaking space reads as a plain space
        return if code == 0xA0 { Some(' ') } else { char::from_u32(code) };
    }

    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => None,
    }
}
