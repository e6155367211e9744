//! Atomic multi-path commit engine.
//!
//! Turns a set of path writes/deletes into one all-or-nothing commit:
//! read the branch head, create content objects, derive a new tree from
//! the head's tree, commit with a single parent, then advance the ref
//! with compare-and-swap. A rejected swap means the branch moved; the
//! attempt rebuilds against the fresh head, bounded by the retry budget
//! with exponential backoff.
//!
//! Commits against the same repository are serialized through a keyed
//! async mutex in front of the CAS loop, so co-located submissions never
//! burn retries against each other. Different repositories share nothing.

use crate::config::DriveConfig;
use crate::error::{Error, Result};
use crate::record::RepoBinding;
use crate::store::{CommitId, RefUpdate, RepoStore, TreeEntry, TreeOp};
use backon::{ExponentialBuilder, Retryable};
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Serialized, optimistically-concurrent commit front-end for a store.
pub struct CommitEngine {
    store: Arc<dyn RepoStore>,
    locks: DashMap<String, Arc<Mutex<()>>>,
    retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl CommitEngine {
    pub fn new(store: Arc<dyn RepoStore>, config: &DriveConfig) -> Self {
        Self {
            store,
            locks: DashMap::new(),
            retries: config.commit_retries,
            initial_delay: config.retry_initial_delay,
            max_delay: config.retry_max_delay,
        }
    }

    /// Apply `ops` to `branch` as one commit and return its id.
    ///
    /// All-or-nothing: either every op lands in the new head commit or the
    /// branch is untouched. Paths not named by any op carry over unchanged.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty op set, `Conflict` once the retry budget
    /// is exhausted, plus whatever the store surfaces (`Transport`,
    /// `NotConfigured`).
    pub async fn submit(
        &self,
        repo: &RepoBinding,
        branch: &str,
        ops: Vec<TreeOp>,
        message: &str,
    ) -> Result<CommitId> {
        if ops.is_empty() {
            return Err(Error::validation("empty commit op set"));
        }

        let lock = self.repo_lock(repo);
        let _serialized = lock.lock().await;

        // Content objects are immutable and tree-independent, so they are
        // created once and reused across CAS attempts.
        let mut entries = Vec::with_capacity(ops.len());
        for op in &ops {
            match op {
                TreeOp::Put { path, bytes } => {
                    let id = self.store.create_object(repo, bytes).await?;
                    entries.push(TreeEntry::Object {
                        path: path.clone(),
                        id,
                    });
                },
                TreeOp::Delete { path } => {
                    entries.push(TreeEntry::Tombstone { path: path.clone() });
                },
            }
        }

        let attempts = AtomicU32::new(0);
        let attempt = || async {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            self.attempt(repo, branch, &entries, message, n).await
        };
        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.retries as usize)
            .with_jitter();

        let repo_name = repo.full_name();
        attempt
            .retry(backoff)
            .when(|e| matches!(e, Error::Conflict { .. }))
            .notify(|_, dur: Duration| {
                warn!(
                    repo = %repo_name,
                    next_delay_ms = dur.as_millis() as u64,
                    "branch moved during commit, rebuilding against new head"
                );
            })
            .await
    }

    async fn attempt(
        &self,
        repo: &RepoBinding,
        branch: &str,
        entries: &[TreeEntry],
        message: &str,
        attempt: u32,
    ) -> Result<CommitId> {
        let head = self.store.branch_head(repo, branch).await?;
        let tree = self.store.create_tree(repo, &head, entries).await?;
        let commit = self.store.create_commit(repo, &tree, &head, message).await?;
        match self
            .store
            .compare_and_swap_ref(repo, branch, &head, &commit)
            .await?
        {
            RefUpdate::Updated => {
                debug!(
                    repo = %repo.full_name(),
                    commit = %commit,
                    parent = %head,
                    paths = entries.len(),
                    attempt,
                    "commit landed"
                );
                Ok(commit)
            },
            RefUpdate::Conflict => Err(Error::Conflict {
                repo: repo.full_name(),
                attempts: attempt,
            }),
        }
    }

    fn repo_lock(&self, repo: &RepoBinding) -> Arc<Mutex<()>> {
        self.locks
            .entry(repo.full_name())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRepoStore;
    use bytes::Bytes;

    fn repo() -> RepoBinding {
        RepoBinding::new("alice", "drive")
    }

    fn engine_over(store: MemoryRepoStore) -> CommitEngine {
        let config = DriveConfig::default().with_commit_retries(3);
        CommitEngine::new(Arc::new(store), &config)
    }

    fn put(path: &str, bytes: &[u8]) -> TreeOp {
        TreeOp::Put {
            path: path.to_string(),
            bytes: Bytes::copy_from_slice(bytes),
        }
    }

    #[tokio::test]
    async fn test_multi_path_commit_is_atomic() {
        let store = MemoryRepoStore::new();
        store.create_repo(&repo(), "main");
        let engine = engine_over(store.clone());

        engine
            .submit(
                &repo(),
                "main",
                vec![
                    put("uploads/a/2025/01/01/f.png", b"img"),
                    put("meta/a/2025/01/01/f.json", b"{}"),
                    put("thumbs/a/2025/01/01/f.jpg", b"thumb"),
                ],
                "Upload f.png",
            )
            .await
            .unwrap();

        let mut paths = store.paths_at_head(&repo()).unwrap();
        paths.sort();
        assert_eq!(paths.len(), 3);
        // Root + one commit: a single commit covered all three writes.
        assert_eq!(store.history(&repo(), "main").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_op_set_rejected() {
        let store = MemoryRepoStore::new();
        store.create_repo(&repo(), "main");
        let engine = engine_over(store);
        let err = engine
            .submit(&repo(), "main", Vec::new(), "noop")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_same_repo_submissions_serialize() {
        let store = MemoryRepoStore::new();
        store.create_repo(&repo(), "main");
        let engine = Arc::new(engine_over(store.clone()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine
                    .submit(
                        &repo(),
                        "main",
                        vec![put(&format!("meta/a/2025/01/01/{i}.json"), b"{}")],
                        "Upload",
                    )
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Strictly linear history: root + 8 commits, one parent each.
        assert_eq!(store.history(&repo(), "main").unwrap().len(), 9);
        assert_eq!(store.paths_at_head(&repo()).unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_unknown_repo_surfaces_not_configured() {
        let engine = engine_over(MemoryRepoStore::new());
        let err = engine
            .submit(&repo(), "main", vec![put("meta/x.json", b"{}")], "Upload")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
    }
}
