//! In-memory backing store.
//!
//! A miniature Git-like object store with real compare-and-swap ref
//! semantics and a linear commit chain per branch. Non-persistent; meant
//! for tests, development, and embedded use.

use super::backend::RepoStore;
use super::types::{CommitId, ContentRef, DirEntry, EntryKind, ObjectId, RefUpdate, TreeEntry, TreeId};
use crate::error::{Error, Result};
use crate::hash::content_hash;
use crate::record::RepoBinding;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
struct CommitNode {
    tree: String,
    parent: Option<String>,
}

struct RepoState {
    default_branch: String,
    objects: HashMap<String, Bytes>,
    /// Tree id -> (path -> object id).
    trees: HashMap<String, BTreeMap<String, String>>,
    commits: HashMap<String, CommitNode>,
    refs: HashMap<String, String>,
}

/// In-memory repository store using DashMap for concurrent repo access.
///
/// Each repository's commit graph sits behind its own mutex, so CAS
/// updates are linearizable exactly like a real ref store.
#[derive(Clone, Default)]
pub struct MemoryRepoStore {
    repos: DashMap<String, Arc<Mutex<RepoState>>>,
}

impl MemoryRepoStore {
    /// Creates a new store with no repositories.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initialize a repository with an empty root commit on `branch`.
    ///
    /// Creating a repository twice is a no-op.
    pub fn create_repo(&self, repo: &RepoBinding, branch: &str) {
        self.repos
            .entry(repo.full_name())
            .or_insert_with(|| {
                let root_tree = new_id("tree");
                let root_commit = new_id("commit");
                let mut state = RepoState {
                    default_branch: branch.to_string(),
                    objects: HashMap::new(),
                    trees: HashMap::new(),
                    commits: HashMap::new(),
                    refs: HashMap::new(),
                };
                state.trees.insert(root_tree.clone(), BTreeMap::new());
                state.commits.insert(
                    root_commit.clone(),
                    CommitNode {
                        tree: root_tree,
                        parent: None,
                    },
                );
                state.refs.insert(branch.to_string(), root_commit);
                Arc::new(Mutex::new(state))
            });
    }

    /// Commit ids from the branch head back to the root, head first.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when the repository or branch is absent.
    pub fn history(&self, repo: &RepoBinding, branch: &str) -> Result<Vec<CommitId>> {
        let state = self.state(repo)?;
        let state = state.lock();
        let mut chain = Vec::new();
        let mut cursor = state.refs.get(branch).cloned();
        while let Some(id) = cursor {
            cursor = state.commits.get(&id).and_then(|c| c.parent.clone());
            chain.push(CommitId(id));
        }
        if chain.is_empty() {
            return Err(Error::not_configured(format!(
                "branch '{branch}' absent in {}",
                repo.full_name()
            )));
        }
        Ok(chain)
    }

    /// All paths present in the head tree of the default branch.
    pub fn paths_at_head(&self, repo: &RepoBinding) -> Result<Vec<String>> {
        let state = self.state(repo)?;
        let state = state.lock();
        let tree = head_tree(&state)?;
        Ok(tree.keys().cloned().collect())
    }

    fn state(&self, repo: &RepoBinding) -> Result<Arc<Mutex<RepoState>>> {
        self.repos
            .get(&repo.full_name())
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| {
                Error::not_configured(format!("repository {} does not exist", repo.full_name()))
            })
    }
}

fn new_id(kind: &str) -> String {
    format!("{kind}-{}", Uuid::new_v4().simple())
}

fn head_tree<'a>(state: &'a RepoState) -> Result<&'a BTreeMap<String, String>> {
    let head = state
        .refs
        .get(&state.default_branch)
        .ok_or_else(|| Error::not_configured("default branch absent".to_string()))?;
    let commit = state
        .commits
        .get(head)
        .ok_or_else(|| Error::transport("dangling head commit"))?;
    state
        .trees
        .get(&commit.tree)
        .ok_or_else(|| Error::transport("dangling tree reference"))
}

#[async_trait]
impl RepoStore for MemoryRepoStore {
    async fn branch_head(&self, repo: &RepoBinding, branch: &str) -> Result<CommitId> {
        let state = self.state(repo)?;
        let state = state.lock();
        state.refs.get(branch).cloned().map(CommitId).ok_or_else(|| {
            Error::not_configured(format!(
                "branch '{branch}' absent in {}",
                repo.full_name()
            ))
        })
    }

    async fn create_object(&self, repo: &RepoBinding, bytes: &[u8]) -> Result<ObjectId> {
        let state = self.state(repo)?;
        let mut state = state.lock();
        let id = content_hash(bytes);
        state
            .objects
            .entry(id.clone())
            .or_insert_with(|| Bytes::copy_from_slice(bytes));
        Ok(ObjectId(id))
    }

    async fn create_tree(
        &self,
        repo: &RepoBinding,
        base: &CommitId,
        entries: &[TreeEntry],
    ) -> Result<TreeId> {
        let state = self.state(repo)?;
        let mut state = state.lock();
        let base_tree = state
            .commits
            .get(base.as_str())
            .and_then(|c| state.trees.get(&c.tree))
            .ok_or_else(|| Error::not_found(format!("base commit {base}")))?;
        let mut tree = base_tree.clone();
        for entry in entries {
            match entry {
                TreeEntry::Object { path, id } => {
                    tree.insert(path.clone(), id.as_str().to_string());
                },
                TreeEntry::Tombstone { path } => {
                    tree.remove(path);
                },
            }
        }
        let id = new_id("tree");
        state.trees.insert(id.clone(), tree);
        Ok(TreeId(id))
    }

    async fn create_commit(
        &self,
        repo: &RepoBinding,
        tree: &TreeId,
        parent: &CommitId,
        _message: &str,
    ) -> Result<CommitId> {
        let state = self.state(repo)?;
        let mut state = state.lock();
        if !state.trees.contains_key(tree.as_str()) {
            return Err(Error::not_found(format!("tree {tree}")));
        }
        let id = new_id("commit");
        state.commits.insert(
            id.clone(),
            CommitNode {
                tree: tree.as_str().to_string(),
                parent: Some(parent.as_str().to_string()),
            },
        );
        Ok(CommitId(id))
    }

    async fn compare_and_swap_ref(
        &self,
        repo: &RepoBinding,
        branch: &str,
        expected: &CommitId,
        new: &CommitId,
    ) -> Result<RefUpdate> {
        let state = self.state(repo)?;
        let mut state = state.lock();
        let Some(current) = state.refs.get(branch) else {
            return Err(Error::not_configured(format!(
                "branch '{branch}' absent in {}",
                repo.full_name()
            )));
        };
        if current != expected.as_str() {
            return Ok(RefUpdate::Conflict);
        }
        state
            .refs
            .insert(branch.to_string(), new.as_str().to_string());
        Ok(RefUpdate::Updated)
    }

    async fn list_directory(&self, repo: &RepoBinding, path: &str) -> Result<Vec<DirEntry>> {
        let state = self.state(repo)?;
        let state = state.lock();
        let tree = head_tree(&state)?;
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let mut entries: Vec<DirEntry> = Vec::new();
        for (stored, object) in tree.range(prefix.clone()..) {
            let Some(rest) = stored.strip_prefix(&prefix) else {
                break;
            };
            match rest.split_once('/') {
                None => entries.push(DirEntry {
                    name: rest.to_string(),
                    kind: EntryKind::File,
                    content: ContentRef(object.clone()),
                }),
                Some((dir, _)) => {
                    if entries
                        .last()
                        .is_none_or(|e| e.kind != EntryKind::Dir || e.name != dir)
                    {
                        entries.push(DirEntry {
                            name: dir.to_string(),
                            kind: EntryKind::Dir,
                            content: ContentRef(String::new()),
                        });
                    }
                },
            }
        }
        Ok(entries)
    }

    async fn fetch_content(&self, repo: &RepoBinding, content: &ContentRef) -> Result<Bytes> {
        let state = self.state(repo)?;
        let state = state.lock();
        state
            .objects
            .get(content.as_str())
            .cloned()
            .ok_or_else(|| Error::not_found(format!("object {content}")))
    }
}
