//! High-level drive service facade.
//!
//! Wires the pipeline, commit engine, search engine, and quota tracker
//! over one backing store and exposes the four boundary operations:
//! upload, delete, fetch, and search. Boundary layers (HTTP handlers,
//! session handling, dashboards) sit outside this crate and consume this
//! type.

use crate::commit::CommitEngine;
use crate::config::DriveConfig;
use crate::enrich::{MediaProcessor, NoMedia};
use crate::error::{Error, Result};
use crate::ingest::{IngestPipeline, UploadOutcome, UploadRequest};
use crate::paths::{delete_set, is_owned, split_parent};
use crate::quota::{MemoryQuotaStore, QuotaStore, QuotaTracker};
use crate::record::{Account, RepoBinding};
use crate::search::{SearchEngine, SearchPage, SearchRequest};
use crate::store::{CommitId, EntryKind, MemoryRepoStore, RepoStore, TreeOp};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Account-to-repository binding lookup.
///
/// Bindings are created at onboarding and immutable afterwards; the store
/// behind this trait is the deployment's user database.
#[async_trait]
pub trait BindingStore: Send + Sync + 'static {
    /// The repository bound to `account`, or `None` when onboarding never
    /// completed.
    async fn binding(&self, account: &Account) -> Result<Option<RepoBinding>>;
}

/// In-memory binding store for tests and embedded use.
#[derive(Clone, Default)]
pub struct MemoryBindingStore {
    bindings: DashMap<String, RepoBinding>,
}

impl MemoryBindingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind an account to its repository.
    pub fn bind(&self, account: &Account, repo: RepoBinding) {
        self.bindings.insert(account.as_str().to_string(), repo);
    }
}

#[async_trait]
impl BindingStore for MemoryBindingStore {
    async fn binding(&self, account: &Account) -> Result<Option<RepoBinding>> {
        Ok(self
            .bindings
            .get(account.as_str())
            .map(|entry| entry.value().clone()))
    }
}

/// The assembled storage engine.
///
/// `Clone`-free by design: wrap it in an `Arc` to share across handlers.
pub struct DriveService {
    store: Arc<dyn RepoStore>,
    bindings: Arc<dyn BindingStore>,
    engine: Arc<CommitEngine>,
    quota: Arc<QuotaTracker>,
    ingest: IngestPipeline,
    search: SearchEngine,
    config: DriveConfig,
}

impl DriveService {
    /// Assemble a service over the given backends.
    pub fn new(
        store: Arc<dyn RepoStore>,
        bindings: Arc<dyn BindingStore>,
        quota_store: Arc<dyn QuotaStore>,
        media: Arc<dyn MediaProcessor>,
        config: DriveConfig,
    ) -> Self {
        let engine = Arc::new(CommitEngine::new(Arc::clone(&store), &config));
        let quota = Arc::new(QuotaTracker::new(quota_store, config.storage_cap));
        let ingest = IngestPipeline::new(
            Arc::clone(&engine),
            Arc::clone(&quota),
            media,
            config.clone(),
        );
        let search = SearchEngine::new(Arc::clone(&store), &config);
        Self {
            store,
            bindings,
            engine,
            quota,
            ingest,
            search,
            config,
        }
    }

    /// Fully in-memory service: memory store, bindings, quota, and no
    /// media stack. Meant for tests and development.
    #[must_use]
    pub fn in_memory(config: DriveConfig) -> (Self, Arc<MemoryRepoStore>, Arc<MemoryBindingStore>) {
        let store = Arc::new(MemoryRepoStore::new());
        let bindings = Arc::new(MemoryBindingStore::new());
        let service = Self::new(
            Arc::clone(&store) as Arc<dyn RepoStore>,
            Arc::clone(&bindings) as Arc<dyn BindingStore>,
            Arc::new(MemoryQuotaStore::new()),
            Arc::new(NoMedia),
            config,
        );
        (service, store, bindings)
    }

    /// Ingest one upload for its account.
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome> {
        let repo = self.repo_for(&request.account).await?;
        self.ingest.ingest(&repo, request).await
    }

    /// Atomically delete an object with its metadata record and thumbnail.
    ///
    /// Paths already absent are tolerated: only the existing subset is
    /// committed, and when nothing exists at all the delete is a no-op
    /// returning `Ok(None)`.
    pub async fn delete(&self, account: &Account, object_path: &str) -> Result<Option<CommitId>> {
        if !is_owned(object_path, account) {
            return Err(Error::validation(format!(
                "path does not belong to account {account}"
            )));
        }
        let repo = self.repo_for(account).await?;
        let set = delete_set(object_path)?;

        let mut ops = Vec::new();
        for path in [&set.object, &set.metadata, &set.thumbnail] {
            if self.exists(&repo, path).await? {
                ops.push(TreeOp::Delete { path: path.clone() });
            }
        }
        if ops.is_empty() {
            info!(account = %account, path = object_path, "delete of absent paths, no-op");
            return Ok(None);
        }

        let message = format!("Delete {}", set.filename);
        let commit = self
            .engine
            .submit(&repo, &self.config.branch, ops, &message)
            .await?;
        info!(account = %account, path = object_path, commit = %commit, "delete committed");
        Ok(Some(commit))
    }

    /// Fetch the raw bytes of an object or thumbnail the account owns.
    pub async fn fetch(&self, account: &Account, path: &str) -> Result<Bytes> {
        if !is_owned(path, account) {
            return Err(Error::validation(format!(
                "path does not belong to account {account}"
            )));
        }
        let repo = self.repo_for(account).await?;
        let (parent, name) = split_parent(path)?;
        let entries = self.store.list_directory(&repo, parent).await?;
        let entry = entries
            .iter()
            .find(|e| e.kind == EntryKind::File && e.name == name)
            .ok_or_else(|| Error::not_found(path.to_string()))?;
        self.store.fetch_content(&repo, &entry.content).await
    }

    /// Search the account's records over a time range.
    pub async fn search(&self, account: &Account, request: SearchRequest) -> Result<SearchPage> {
        let repo = self.repo_for(account).await?;
        self.search.search(&repo, account, request).await
    }

    /// Current quota usage in bytes.
    pub async fn quota_usage(&self, account: &Account) -> Result<u64> {
        self.quota.usage(account).await
    }

    /// The configured per-account cap in bytes.
    #[must_use]
    pub fn quota_cap(&self) -> u64 {
        self.quota.cap()
    }

    async fn repo_for(&self, account: &Account) -> Result<RepoBinding> {
        self.bindings.binding(account).await?.ok_or_else(|| {
            Error::not_configured(format!("no repository bound for account '{account}'"))
        })
    }

    async fn exists(&self, repo: &RepoBinding, path: &str) -> Result<bool> {
        let (parent, name) = split_parent(path)?;
        let entries = self.store.list_directory(repo, parent).await?;
        Ok(entries
            .iter()
            .any(|e| e.kind == EntryKind::File && e.name == name))
    }
}
