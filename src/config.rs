//! Configuration for ingestion and analysis.
//!
//! Every field has a built-in default, so a TOML file only needs to name
//! what it overrides:
//!
//! ```toml
//! [ingest]
//! mail_root = "/var/mail/alice"
//! parse_batch_size = 16
//!
//! [analyzer]
//! max_topics = 3
//! ```

use crate::error::{MailError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Hard cap on summary length, in characters
pub const SUMMARY_MAX_CHARS: usize = 200;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ingest: IngestConfig,
    pub analyzer: AnalyzerConfig,
}

/// Where messages are read from and how they are enumerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Root directory holding one sub-directory per folder.
    pub mail_root: PathBuf,
    /// Folder used when a call does not name one.
    pub default_folder: String,
    /// Number of sources parsed together. Values above 1 parse each batch
    /// on the rayon pool; enumeration order is unchanged.
    pub parse_batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            mail_root: dirs::home_dir().unwrap_or_default().join("mail"),
            default_folder: "INBOX".to_string(),
            parse_batch_size: 1,
        }
    }
}

/// Limits applied by the heuristic analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Topics kept per result.
    pub max_topics: usize,
    /// Entities kept per result.
    pub max_entities: usize,
    /// Topics reported by insights.
    pub common_topics_limit: usize,
    /// Summary length; never more than [`SUMMARY_MAX_CHARS`].
    pub summary_max_chars: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_topics: 5,
            max_entities: 10,
            common_topics_limit: 5,
            summary_max_chars: SUMMARY_MAX_CHARS,
        }
    }
}

impl AnalyzerConfig {
    /// Summary length with the hard cap applied
    #[must_use]
    pub fn summary_limit(&self) -> usize {
        self.summary_max_chars.min(SUMMARY_MAX_CHARS)
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| MailError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| MailError::io(path, e))?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> Result<()> {
        if self.ingest.default_folder.trim().is_empty() {
            return Err(MailError::Config("ingest.default_folder is empty".into()));
        }
        if self.ingest.parse_batch_size == 0 {
            return Err(MailError::Config(
                "ingest.parse_batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
