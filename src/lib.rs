//! Transactional, content-addressed file storage on Git hosting.
//!
//! `gitdrive` turns a version-controlled object store into a safe,
//! single-writer, multi-file-atomic file store with integrity checking,
//! per-account quotas, and substring search over time ranges. Every upload
//! lands as one commit carrying the raw object, its metadata record, and
//! (for images) a thumbnail, under a deterministic day-partitioned path
//! scheme that doubles as the search index.
//!
//! The crate is the engine only: authentication, session handling, and
//! HTTP/UI surfaces are external consumers of [`DriveService`].
//!
//! ```ignore
//! use gitdrive::{Account, DriveConfig, DriveService, UploadRequest};
//!
//! let (service, store, bindings) = DriveService::in_memory(DriveConfig::default());
//! let account = Account::from_identity("alice@example.com");
//! bindings.bind(&account, gitdrive::RepoBinding::new("alice", "drive"));
//! store.create_repo(&gitdrive::RepoBinding::new("alice", "drive"), "main");
//!
//! let outcome = service.upload(UploadRequest {
//!     account,
//!     name: "notes.txt".into(),
//!     bytes: b"hello".as_ref().into(),
//!     mime: Some("text/plain".into()),
//!     tags: Some("notes".into()),
//!     declared_sha256: None,
//! }).await?;
//! ```

pub mod commit;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fingerprint;
pub mod hash;
pub mod ingest;
pub mod paths;
pub mod quota;
pub mod record;
pub mod search;
pub mod service;
pub mod store;

pub use commit::CommitEngine;
pub use config::DriveConfig;
pub use enrich::{Enrichment, MediaProcessor, NoMedia};
pub use error::{Error, Result};
pub use ingest::{UploadOutcome, UploadRequest};
pub use quota::{MemoryQuotaStore, QuotaStore, QuotaTracker};
pub use record::{Account, FileRecord, RepoBinding};
pub use search::{SearchPage, SearchRequest};
pub use service::{BindingStore, DriveService, MemoryBindingStore};
pub use store::{GithubRepoStore, MemoryRepoStore, RepoStore};
