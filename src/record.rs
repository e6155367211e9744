//! Data model for accounts and stored file records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A registered account, bound to exactly one backing repository.
///
/// The identifier is the sanitized form used in virtual paths: any
/// character outside `[A-Za-z0-9]` in the raw identity is replaced with
/// `_`, matching how existing deployments derived it from the login email.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Account(String);

impl Account {
    /// Wrap an already-sanitized account id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an account id from a raw identity string (e.g. an email).
    #[must_use]
    pub fn from_identity(raw: &str) -> Self {
        let id: String = raw
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Self(id)
    }

    /// The path-safe account identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The backing repository bound to an account. Immutable once set; there
/// is no migration path to a different repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoBinding {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub name: String,
}

impl RepoBinding {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name` form used in logs and error messages.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Immutable metadata describing one stored object.
///
/// Field names match the JSON documents written by existing deployments,
/// so records round-trip bit-compatibly through the backing store. Records
/// are created once at ingestion and never updated, only deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Virtual path of the raw object under `uploads/`.
    pub path: String,
    /// Original display name of the upload.
    pub name: String,
    /// Upload time, UTC.
    pub timestamp: DateTime<Utc>,
    /// Object size in bytes.
    pub size: u64,
    /// MIME type.
    pub mime: String,
    /// SHA-256 content hash, lowercase hex.
    pub sha256: String,
    /// Perceptual fingerprint (`0x` + 16 hex digits), empty when the
    /// payload is not an image or fingerprinting failed.
    #[serde(default)]
    pub phash: String,
    /// User-supplied tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Extracted text, truncated to 1024 characters; empty when extraction
    /// was inapplicable or failed.
    #[serde(default)]
    pub ocr_text: String,
}

impl FileRecord {
    /// Whether this record matches a search needle.
    ///
    /// An empty needle matches everything; otherwise the needle must appear
    /// as a case-insensitive substring of the display name, the space-joined
    /// tag set, or the extracted text. The caller passes the needle already
    /// lowercased so one search lowers it once.
    #[must_use]
    pub fn matches(&self, needle_lower: &str) -> bool {
        if needle_lower.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(needle_lower)
            || self.tags.join(" ").to_lowercase().contains(needle_lower)
            || self.ocr_text.to_lowercase().contains(needle_lower)
    }
}

/// Normalize a comma-separated tag string into a trimmed, de-duplicated set.
#[must_use]
pub fn normalize_tags(raw: Option<&str>) -> Vec<String> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',') {
        let tag = tag.trim();
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}
