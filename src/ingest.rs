//! Ingestion pipeline.
//!
//! Orchestrates one upload end to end: quota and size gates, content
//! hashing with optional declared-hash verification, best-effort media
//! enrichment, virtual path construction, record assembly, and a single
//! atomic commit of object + metadata (+ thumbnail). The quota counter is
//! incremented only after the commit lands, and only by the object bytes;
//! metadata and thumbnail bytes ride free.

use crate::commit::CommitEngine;
use crate::config::DriveConfig;
use crate::enrich::{is_image, text_extractable, Enrichment, MediaProcessor};
use crate::error::{Error, Result};
use crate::fingerprint::dhash;
use crate::hash::content_hash;
use crate::paths::upload_paths;
use crate::quota::QuotaTracker;
use crate::record::{normalize_tags, Account, FileRecord, RepoBinding};
use crate::store::{CommitId, TreeOp};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// Maximum characters of extracted text kept on a record.
pub const MAX_EXTRACTED_TEXT: usize = 1024;

/// One upload as submitted by the boundary.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub account: Account,
    /// Original display name (also the extension source).
    pub name: String,
    pub bytes: Bytes,
    /// MIME type as declared by the caller; detected from the display
    /// name's extension when absent.
    pub mime: Option<String>,
    /// Comma-separated tag string, as the boundary receives it.
    pub tags: Option<String>,
    /// Caller-computed SHA-256 for integrity verification, if any.
    pub declared_sha256: Option<String>,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub record: FileRecord,
    pub commit: CommitId,
    /// Thumbnail path, when one was generated and committed.
    pub thumbnail_path: Option<String>,
    /// Diagnostics from enrichment steps that ran and failed.
    pub enrichment_failures: Vec<String>,
}

/// The upload orchestrator.
pub struct IngestPipeline {
    engine: Arc<CommitEngine>,
    quota: Arc<QuotaTracker>,
    media: Arc<dyn MediaProcessor>,
    config: DriveConfig,
}

impl IngestPipeline {
    pub fn new(
        engine: Arc<CommitEngine>,
        quota: Arc<QuotaTracker>,
        media: Arc<dyn MediaProcessor>,
        config: DriveConfig,
    ) -> Self {
        Self {
            engine,
            quota,
            media,
            config,
        }
    }

    /// Ingest one upload into `repo`.
    ///
    /// Enrichment failures never fail the upload; every other error
    /// (validation, integrity, quota, commit) aborts before any write.
    pub async fn ingest(&self, repo: &RepoBinding, request: UploadRequest) -> Result<UploadOutcome> {
        if request.name.trim().is_empty() {
            return Err(Error::validation("display name must not be empty"));
        }
        let size = request.bytes.len() as u64;
        if size > self.config.max_upload_size {
            return Err(Error::validation(format!(
                "payload of {size} bytes exceeds the {} byte limit",
                self.config.max_upload_size
            )));
        }
        self.quota.check(&request.account, size).await?;

        let sha256 = content_hash(&request.bytes);
        if let Some(declared) = request
            .declared_sha256
            .as_deref()
            .filter(|d| !d.is_empty())
        {
            if !declared.eq_ignore_ascii_case(&sha256) {
                return Err(Error::Integrity {
                    declared: declared.to_string(),
                    computed: sha256,
                });
            }
        }

        let mime = request
            .mime
            .as_deref()
            .filter(|m| !m.is_empty())
            .map_or_else(
                || {
                    mime_guess::from_path(&request.name)
                        .first()
                        .map_or_else(|| "application/octet-stream".to_string(), |m| m.to_string())
                },
                str::to_string,
            );

        // Image-only enrichment, each step independently best-effort.
        let (thumbnail, phash) = if is_image(&mime) {
            let thumbnail = Enrichment::from_result(
                "thumbnail",
                self.media.thumbnail(&request.bytes).await,
            );
            let phash = Enrichment::from_result(
                "fingerprint",
                self.media
                    .luma_grid(&request.bytes)
                    .await
                    .map(|grid| dhash(&grid)),
            );
            (thumbnail, phash)
        } else {
            (Enrichment::skipped(), Enrichment::skipped())
        };
        let text = if text_extractable(&mime) {
            Enrichment::from_result(
                "text-extraction",
                self.media
                    .extract_text(&request.bytes, &mime)
                    .await
                    .map(truncate_text),
            )
        } else {
            Enrichment::skipped()
        };

        let now = Utc::now();
        let paths = upload_paths(&request.account, &request.name, now);
        let record = FileRecord {
            path: paths.object.clone(),
            name: request.name,
            timestamp: now,
            size,
            mime,
            sha256,
            phash: phash.value().cloned().unwrap_or_default(),
            tags: normalize_tags(request.tags.as_deref()),
            ocr_text: text.value().cloned().unwrap_or_default(),
        };

        // Stored pretty-printed, matching records written by earlier
        // deployments.
        let metadata_bytes = serde_json::to_vec_pretty(&record)
            .map_err(|e| Error::validation(format!("serializing metadata record: {e}")))?;

        let mut ops = vec![
            TreeOp::Put {
                path: paths.object.clone(),
                bytes: request.bytes,
            },
            TreeOp::Put {
                path: paths.metadata.clone(),
                bytes: Bytes::from(metadata_bytes),
            },
        ];
        let thumbnail_path = thumbnail.value().map(|bytes| {
            ops.push(TreeOp::Put {
                path: paths.thumbnail.clone(),
                bytes: Bytes::copy_from_slice(bytes),
            });
            paths.thumbnail.clone()
        });

        let message = format!("Upload {}", paths.filename);
        let commit = self
            .engine
            .submit(repo, &self.config.branch, ops, &message)
            .await?;

        // Object bytes only; committed strictly after the write landed.
        self.quota.commit(&request.account, size).await?;

        let enrichment_failures: Vec<String> = [
            thumbnail.failure(),
            phash.failure(),
            text.failure(),
        ]
        .into_iter()
        .flatten()
        .map(str::to_string)
        .collect();

        info!(
            account = %request.account,
            path = %record.path,
            size,
            commit = %commit,
            failures = enrichment_failures.len(),
            "upload committed"
        );

        Ok(UploadOutcome {
            record,
            commit,
            thumbnail_path,
            enrichment_failures,
        })
    }
}

fn truncate_text(text: String) -> String {
    if text.chars().count() <= MAX_EXTRACTED_TEXT {
        text
    } else {
        text.chars().take(MAX_EXTRACTED_TEXT).collect()
    }
}
