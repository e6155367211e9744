//! Best-effort enrichment of uploaded payloads.
//!
//! Thumbnails, perceptual fingerprints, and text extraction all depend on
//! media codecs that live outside this crate; they are consumed here as
//! byte-in/result-out capabilities behind [`MediaProcessor`]. Every step
//! is best-effort: a failure becomes an empty field with a recorded
//! diagnostic, never an aborted ingestion.

use crate::fingerprint::GRID_LEN;
use async_trait::async_trait;
use tracing::warn;

/// External media capability: decode-and-transform operations on payload
/// bytes. Implementations wrap whatever codec stack the deployment has.
#[async_trait]
pub trait MediaProcessor: Send + Sync + 'static {
    /// JPEG thumbnail bounded to 224x224, aspect ratio preserved.
    async fn thumbnail(&self, bytes: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Row-major 9x8 grayscale downsample used for fingerprinting.
    async fn luma_grid(&self, bytes: &[u8]) -> anyhow::Result<[u8; GRID_LEN]>;

    /// Plain-text extraction (OCR or document text) for eligible payloads.
    async fn extract_text(&self, bytes: &[u8], mime: &str) -> anyhow::Result<String>;
}

/// Outcome of one best-effort enrichment step: either a value or a
/// recorded failure reason, observable without ever failing ingestion.
#[derive(Debug, Clone)]
pub struct Enrichment<T> {
    value: Option<T>,
    failure: Option<String>,
}

impl<T> Enrichment<T> {
    /// A step that did not apply to this payload.
    #[must_use]
    pub fn skipped() -> Self {
        Self {
            value: None,
            failure: None,
        }
    }

    /// Record a step result, logging the failure case at warn.
    pub fn from_result(step: &'static str, result: anyhow::Result<T>) -> Self {
        match result {
            Ok(value) => Self {
                value: Some(value),
                failure: None,
            },
            Err(error) => {
                warn!(step, error = %error, "enrichment step failed, field left empty");
                Self {
                    value: None,
                    failure: Some(format!("{step}: {error}")),
                }
            },
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    #[must_use]
    pub fn into_value(self) -> Option<T> {
        self.value
    }

    /// The recorded failure reason, if the step ran and failed.
    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

/// Whether a mime type is an image payload.
#[must_use]
pub fn is_image(mime: &str) -> bool {
    mime.starts_with("image/")
}

/// Whether a mime type is eligible for text extraction.
#[must_use]
pub fn text_extractable(mime: &str) -> bool {
    is_image(mime) || mime == "application/pdf"
}

/// No-op processor for deployments without a media stack: every
/// capability reports itself unavailable, so all enrichment fields stay
/// empty and ingestion proceeds untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMedia;

#[async_trait]
impl MediaProcessor for NoMedia {
    async fn thumbnail(&self, _bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("media processing not available")
    }

    async fn luma_grid(&self, _bytes: &[u8]) -> anyhow::Result<[u8; GRID_LEN]> {
        anyhow::bail!("media processing not available")
    }

    async fn extract_text(&self, _bytes: &[u8], _mime: &str) -> anyhow::Result<String> {
        anyhow::bail!("media processing not available")
    }
}
