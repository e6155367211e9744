//! Virtual path scheme.
//!
//! Every stored object lives at a deterministic, day-partitioned path:
//!
//! ```text
//! uploads/{account}/{yyyy}/{mm}/{dd}/{ts}_{suffix}{ext}
//! meta/{account}/{yyyy}/{mm}/{dd}/{ts}_{suffix}.json
//! thumbs/{account}/{yyyy}/{mm}/{dd}/{ts}_{suffix}.jpg
//! ```
//!
//! `ts` is the compact UTC timestamp `YYYYMMDDThhmmssZ` and `suffix` is a
//! 6-character random identifier that keeps same-second uploads from
//! colliding. The format is load-bearing: day-bucket directory listings
//! substitute for an index, and previously stored data must keep resolving,
//! so none of it may change.

use crate::error::{Error, Result};
use crate::record::Account;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use uuid::Uuid;

/// Top-level prefix for raw objects.
pub const UPLOADS_PREFIX: &str = "uploads";
/// Top-level prefix for metadata records.
pub const META_PREFIX: &str = "meta";
/// Top-level prefix for thumbnails.
pub const THUMBS_PREFIX: &str = "thumbs";

/// The three virtual paths produced for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPaths {
    /// `uploads/...` path for the raw object.
    pub object: String,
    /// `meta/.../*.json` path for the metadata record.
    pub metadata: String,
    /// `thumbs/.../*.jpg` path for the thumbnail, used only for images.
    pub thumbnail: String,
    /// Bare object filename, used in commit messages.
    pub filename: String,
}

/// The path triple covered by one atomic delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteSet {
    pub object: String,
    pub metadata: String,
    pub thumbnail: String,
    /// Bare object filename, used in commit messages.
    pub filename: String,
}

/// Build the three virtual paths for an upload happening at `at`.
///
/// The extension is taken from the display name, lowercased, or `.bin`
/// when absent or not plain ASCII alphanumeric.
#[must_use]
pub fn upload_paths(account: &Account, display_name: &str, at: DateTime<Utc>) -> UploadPaths {
    let ts = at.format("%Y%m%dT%H%M%SZ");
    let suffix = short_suffix();
    let ext = extension_of(display_name);
    let day = format!(
        "{}/{:04}/{:02}/{:02}",
        account.as_str(),
        at.year(),
        at.month(),
        at.day()
    );
    let stem = format!("{ts}_{suffix}");
    let filename = format!("{stem}{ext}");
    UploadPaths {
        object: format!("{UPLOADS_PREFIX}/{day}/{filename}"),
        metadata: format!("{META_PREFIX}/{day}/{stem}.json"),
        thumbnail: format!("{THUMBS_PREFIX}/{day}/{stem}.jpg"),
        filename,
    }
}

/// The metadata day-bucket directory for one account and calendar day.
#[must_use]
pub fn day_bucket(account: &Account, day: NaiveDate) -> String {
    format!(
        "{META_PREFIX}/{}/{:04}/{:02}/{:02}",
        account.as_str(),
        day.year(),
        day.month(),
        day.day()
    )
}

/// Enumerate the metadata day buckets covering `[from, to]` inclusive (UTC).
///
/// An inverted range yields no buckets.
#[must_use]
pub fn day_buckets(account: &Account, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<String> {
    let mut buckets = Vec::new();
    let mut day = from.date_naive();
    let last = to.date_naive();
    while day <= last {
        buckets.push(day_bucket(account, day));
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    buckets
}

/// Derive the metadata and thumbnail paths belonging to an object path.
///
/// `uploads/{acct}/{yyyy}/{mm}/{dd}/{file}` maps to the `.json` record under
/// `meta/` and the `.jpg` thumbnail under `thumbs/` by segment and
/// extension substitution.
pub fn delete_set(object_path: &str) -> Result<DeleteSet> {
    let segments: Vec<&str> = object_path.split('/').collect();
    if segments.len() < 6 || segments[0] != UPLOADS_PREFIX {
        return Err(Error::validation(format!(
            "invalid object path format: {object_path}"
        )));
    }
    let filename = segments[segments.len() - 1];
    if filename.is_empty() {
        return Err(Error::validation(format!(
            "invalid object path format: {object_path}"
        )));
    }
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    };
    let dir = segments[1..segments.len() - 1].join("/");
    Ok(DeleteSet {
        object: object_path.to_string(),
        metadata: format!("{META_PREFIX}/{dir}/{stem}.json"),
        thumbnail: format!("{THUMBS_PREFIX}/{dir}/{stem}.jpg"),
        filename: filename.to_string(),
    })
}

/// Whether a virtual path belongs to the account.
///
/// Objects and thumbnails are account-readable; anything else (including
/// another account's prefix or a `meta/` path) is not.
#[must_use]
pub fn is_owned(path: &str, account: &Account) -> bool {
    let id = account.as_str();
    path.starts_with(&format!("{UPLOADS_PREFIX}/{id}/"))
        || path.starts_with(&format!("{THUMBS_PREFIX}/{id}/"))
}

/// Split a virtual path into its parent directory and entry name.
pub fn split_parent(path: &str) -> Result<(&str, &str)> {
    path.rsplit_once('/')
        .filter(|(parent, name)| !parent.is_empty() && !name.is_empty())
        .ok_or_else(|| Error::validation(format!("invalid virtual path: {path}")))
}

fn short_suffix() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..6].to_string()
}

fn extension_of(display_name: &str) -> String {
    std::path::Path::new(display_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map_or_else(|| ".bin".to_string(), |ext| format!(".{}", ext.to_lowercase()))
}
