//! Folder enumeration and lazy message iteration over local storage.
//!
//! A [`MailSource`] hands out raw bytes per `(folder, source id)`; a
//! [`LocalIngestor`] turns those into [`Message`]s on demand. Sources are
//! enumerated in lexicographic order of their identifiers, on every call.
//!
//! Failure policy: an unknown folder fails the whole call, while a single
//! unreadable or malformed source is skipped and recorded in
//! [`Messages::skipped`] without stopping the rest of the folder.

use crate::config::IngestConfig;
use crate::error::{MailError, Result};
use crate::parser::{ParseContext, parse_message};
use crate::types::Message;
use rayon::prelude::*;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// One message source inside a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Identifier relative to the folder, `/` separated
    pub id: String,
    /// Storage-level read marker (Maildir `S` flag)
    pub seen: bool,
}

/// Byte-stream access to stored messages, keyed by folder and source id
pub trait MailSource: Send + Sync {
    /// Folder names, sorted
    fn folders(&self) -> Result<Vec<String>>;

    /// Sources in `folder`, sorted by id. Fails with
    /// [`MailError::FolderNotFound`] if the folder does not exist.
    fn entries(&self, folder: &str) -> Result<Vec<SourceEntry>>;

    /// Raw bytes of one source
    fn read(&self, folder: &str, entry: &SourceEntry) -> Result<Vec<u8>>;
}

/// Directory-per-folder, file-per-message storage.
///
/// Messages live directly in the folder directory or in its Maildir `cur/`
/// and `new/` sub-directories. `tmp/` and hidden entries are ignored.
#[derive(Debug, Clone)]
pub struct MaildirSource {
    root: PathBuf,
}

const MAILDIR_SUBDIRS: [&str; 2] = ["cur", "new"];

impl MaildirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder_path(&self, folder: &str) -> Result<PathBuf> {
        let valid = !folder.is_empty()
            && !folder.starts_with('.')
            && !folder.contains(['/', '\\']);
        let path = self.root.join(folder);
        if valid && path.is_dir() {
            Ok(path)
        } else {
            Err(MailError::FolderNotFound(folder.to_string()))
        }
    }
}

impl MailSource for MaildirSource {
    fn folders(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| MailError::io(&self.root, e))?;

        let mut folders: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| !name.starts_with('.'))
            .collect();
        folders.sort();
        Ok(folders)
    }

    fn entries(&self, folder: &str) -> Result<Vec<SourceEntry>> {
        let folder_path = self.folder_path(folder)?;

        let mut found = list_files(&folder_path, None)?;
        for subdir in MAILDIR_SUBDIRS {
            let path = folder_path.join(subdir);
            if path.is_dir() {
                found.extend(list_files(&path, Some(subdir))?);
            }
        }
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    fn read(&self, folder: &str, entry: &SourceEntry) -> Result<Vec<u8>> {
        let path = self.folder_path(folder)?.join(&entry.id);
        std::fs::read(&path).map_err(|e| MailError::io(path, e))
    }
}

fn list_files(dir: &Path, prefix: Option<&str>) -> Result<Vec<SourceEntry>> {
    let entries = std::fs::read_dir(dir).map_err(|e| MailError::io(dir, e))?;

    Ok(entries
        .flatten()
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .map(|name| SourceEntry {
            seen: maildir_seen(&name),
            id: prefix.map_or_else(|| name.clone(), |p| format!("{p}/{name}")),
        })
        .collect())
}

/// Maildir info suffix, e.g. `1700000000.x.host:2,RS`
fn maildir_seen(file_name: &str) -> bool {
    file_name
        .rsplit_once(":2,")
        .is_some_and(|(_, flags)| flags.contains('S'))
}

/// Opaque capability from an authentication layer.
///
/// Carried alongside an ingestor for sources that need identity; local
/// storage never looks inside it.
#[derive(Clone)]
pub struct SessionToken {
    _inner: Arc<dyn Any + Send + Sync>,
}

impl SessionToken {
    pub fn new<T: Any + Send + Sync>(inner: T) -> Self {
        Self {
            _inner: Arc::new(inner),
        }
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(..)")
    }
}

/// Retrieval operations over a message store
pub trait Ingestor {
    /// Messages in `folder`, at most `limit` of them
    fn get_messages(&self, folder: &str, limit: Option<usize>) -> Result<Messages<'_>>;

    /// Messages whose subject or body contains `query`, ignoring case.
    /// Searches the default folder when `folder` is `None`.
    fn search_messages(&self, query: &str, folder: Option<&str>) -> Result<SearchResults<'_>>;

    /// Folder names; never empty
    fn get_folders(&self) -> Result<Vec<String>>;
}

/// Ingestor over any [`MailSource`], Maildir by default
#[derive(Debug)]
pub struct LocalIngestor<S = MaildirSource> {
    source: S,
    default_folder: String,
    batch_size: usize,
    session: Option<SessionToken>,
}

impl LocalIngestor<MaildirSource> {
    /// Ingestor over the Maildir tree at `config.mail_root`
    #[must_use]
    pub fn open(config: &IngestConfig) -> Self {
        Self::new(MaildirSource::new(config.mail_root.clone()), config)
    }
}

impl<S: MailSource> LocalIngestor<S> {
    pub fn new(source: S, config: &IngestConfig) -> Self {
        Self {
            source,
            default_folder: config.default_folder.clone(),
            batch_size: config.parse_batch_size.max(1),
            session: None,
        }
    }

    #[must_use]
    pub fn with_session(mut self, session: SessionToken) -> Self {
        self.session = Some(session);
        self
    }

    #[must_use]
    pub const fn session(&self) -> Option<&SessionToken> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn default_folder(&self) -> &str {
        &self.default_folder
    }

    pub const fn source(&self) -> &S {
        &self.source
    }
}

impl<S: MailSource> Ingestor for LocalIngestor<S> {
    fn get_messages(&self, folder: &str, limit: Option<usize>) -> Result<Messages<'_>> {
        let entries = self.source.entries(folder)?;
        info!(folder, sources = entries.len(), "Scanning folder");
        Ok(Messages::new(
            &self.source,
            folder,
            entries,
            limit,
            self.batch_size,
        ))
    }

    fn search_messages(&self, query: &str, folder: Option<&str>) -> Result<SearchResults<'_>> {
        let folder = folder.unwrap_or(&self.default_folder);
        Ok(SearchResults {
            messages: self.get_messages(folder, None)?,
            needle: query.to_lowercase(),
        })
    }

    fn get_folders(&self) -> Result<Vec<String>> {
        let folders = self.source.folders()?;
        if folders.is_empty() {
            return Ok(vec![self.default_folder.clone()]);
        }
        Ok(folders)
    }
}

/// A source that was left out of a sequence, and why
#[derive(Debug)]
pub struct SkippedMessage {
    pub source_id: String,
    pub error: MailError,
}

/// Lazy, finite sequence of parsed messages from one folder
pub struct Messages<'a> {
    source: &'a dyn MailSource,
    folder: String,
    pending: std::vec::IntoIter<SourceEntry>,
    parsed: VecDeque<Message>,
    remaining: Option<usize>,
    batch_size: usize,
    skipped: Vec<SkippedMessage>,
    yielded: usize,
    done: bool,
}

impl<'a> Messages<'a> {
    fn new(
        source: &'a dyn MailSource,
        folder: &str,
        entries: Vec<SourceEntry>,
        limit: Option<usize>,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            folder: folder.to_string(),
            pending: entries.into_iter(),
            parsed: VecDeque::new(),
            remaining: limit,
            batch_size,
            skipped: Vec::new(),
            yielded: 0,
            done: false,
        }
    }

    #[must_use]
    pub fn folder(&self) -> &str {
        &self.folder
    }

    /// Sources skipped so far
    #[must_use]
    pub fn skipped(&self) -> &[SkippedMessage] {
        &self.skipped
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Parse pending sources until at least one message is buffered or the
    /// folder is exhausted
    fn fill(&mut self) {
        let source = self.source;
        let folder = self.folder.as_str();

        while self.parsed.is_empty() {
            let take = self
                .remaining
                .map_or(self.batch_size, |r| r.min(self.batch_size));
            let batch: Vec<SourceEntry> = self.pending.by_ref().take(take).collect();
            if batch.is_empty() {
                return;
            }

            let results: Vec<(SourceEntry, Result<Message>)> = if batch.len() > 1 {
                batch
                    .into_par_iter()
                    .map(|entry| {
                        let result = load(source, folder, &entry);
                        (entry, result)
                    })
                    .collect()
            } else {
                batch
                    .into_iter()
                    .map(|entry| {
                        let result = load(source, folder, &entry);
                        (entry, result)
                    })
                    .collect()
            };

            for (entry, result) in results {
                match result {
                    Ok(message) => self.parsed.push_back(message),
                    Err(error) => {
                        warn!(folder, source = %entry.id, "Skipping message: {error}");
                        self.skipped.push(SkippedMessage {
                            source_id: entry.id,
                            error,
                        });
                    }
                }
            }
        }
    }

    fn finish(&mut self) {
        if !self.done {
            self.done = true;
            info!(
                folder = %self.folder,
                yielded = self.yielded,
                skipped = self.skipped.len(),
                "Finished folder scan"
            );
        }
    }
}

fn load(source: &dyn MailSource, folder: &str, entry: &SourceEntry) -> Result<Message> {
    let raw = source.read(folder, entry)?;
    parse_message(&raw, &ParseContext::new(folder, &entry.id).seen(entry.seen))
}

impl Iterator for Messages<'_> {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        if self.remaining == Some(0) {
            self.finish();
            return None;
        }

        self.fill();
        let Some(message) = self.parsed.pop_front() else {
            self.finish();
            return None;
        };

        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= 1;
        }
        self.yielded += 1;
        Some(message)
    }
}

impl fmt::Debug for Messages<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Messages")
            .field("folder", &self.folder)
            .field("yielded", &self.yielded)
            .field("skipped", &self.skipped.len())
            .finish_non_exhaustive()
    }
}

/// Messages from one folder matching a case-insensitive substring query
#[derive(Debug)]
pub struct SearchResults<'a> {
    messages: Messages<'a>,
    needle: String,
}

impl SearchResults<'_> {
    #[must_use]
    pub fn skipped(&self) -> &[SkippedMessage] {
        self.messages.skipped()
    }

    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.messages.skipped_count()
    }
}

impl Iterator for SearchResults<'_> {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        let needle = self.needle.as_str();
        self.messages.by_ref().find(|message| {
            needle.is_empty()
                || message.subject().to_lowercase().contains(needle)
                || message.body().to_lowercase().contains(needle)
        })
    }
}
