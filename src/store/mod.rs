//! Backing-store abstraction over version-controlled object stores.
//!
//! The engine talks to repositories exclusively through the [`RepoStore`]
//! trait: head reads, object/tree/commit creation, compare-and-swap ref
//! updates, directory listing, and content fetch. Two backends ship here:
//! [`GithubRepoStore`] for production and [`MemoryRepoStore`] for tests
//! and embedded use.

mod backend;
mod github;
mod memory;
mod types;

pub use backend::RepoStore;
pub use github::GithubRepoStore;
pub use memory::MemoryRepoStore;
pub use types::{
    CommitId, ContentRef, DirEntry, EntryKind, ObjectId, RefUpdate, TreeEntry, TreeId, TreeOp,
};
