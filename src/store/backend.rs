//! Backend trait for the version-controlled backing store.
//!
//! Defines the primitive operations the engine needs from a Git-like
//! object store, enabling pluggable backends (GitHub, in-memory, ...).
//! Commit-graph semantics (CAS loops, retries, serialization) live in
//! [`crate::commit`]; implementations only expose the raw primitives.

use super::types::{CommitId, ContentRef, DirEntry, ObjectId, RefUpdate, TreeEntry, TreeId};
use crate::error::Result;
use crate::record::RepoBinding;
use async_trait::async_trait;
use bytes::Bytes;

/// Primitive operations against one account repository.
///
/// All backends must be thread-safe (`Send + Sync`) for use with tokio.
#[async_trait]
pub trait RepoStore: Send + Sync + 'static {
    /// Current head commit of `branch`.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when the repository or branch does not exist;
    /// `Transport` on communication failure.
    async fn branch_head(&self, repo: &RepoBinding, branch: &str) -> Result<CommitId>;

    /// Create an immutable content object and return its id.
    async fn create_object(&self, repo: &RepoBinding, bytes: &[u8]) -> Result<ObjectId>;

    /// Build a new tree derived from the tree of `base`, applying each
    /// entry as an add or a tombstone; unlisted paths carry over unchanged.
    async fn create_tree(
        &self,
        repo: &RepoBinding,
        base: &CommitId,
        entries: &[TreeEntry],
    ) -> Result<TreeId>;

    /// Create a commit pointing at `tree` with the single parent `parent`.
    async fn create_commit(
        &self,
        repo: &RepoBinding,
        tree: &TreeId,
        parent: &CommitId,
        message: &str,
    ) -> Result<CommitId>;

    /// Advance `branch` from `expected` to `new`.
    ///
    /// Must report [`RefUpdate::Conflict`] without changing anything when
    /// the branch no longer points at `expected`.
    async fn compare_and_swap_ref(
        &self,
        repo: &RepoBinding,
        branch: &str,
        expected: &CommitId,
        new: &CommitId,
    ) -> Result<RefUpdate>;

    /// List the entries directly under `path` on the default branch.
    ///
    /// An absent path is a normal "empty" outcome, not an error.
    async fn list_directory(&self, repo: &RepoBinding, path: &str) -> Result<Vec<DirEntry>>;

    /// Fetch the raw bytes behind a directory entry's content handle.
    async fn fetch_content(&self, repo: &RepoBinding, content: &ContentRef) -> Result<Bytes>;
}
