//! Identifier and entry types for the backing store.

use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub String);

        impl $name {
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

id_type! {
    /// Identifier of an immutable content object (blob).
    ObjectId
}

id_type! {
    /// Identifier of a tree snapshot.
    TreeId
}

id_type! {
    /// Identifier of a commit.
    CommitId
}

id_type! {
    /// Opaque handle to fetch an entry's content.
    ContentRef
}

/// One path mutation requested of the commit engine.
#[derive(Debug, Clone)]
pub enum TreeOp {
    /// Write `bytes` at `path`.
    Put { path: String, bytes: bytes::Bytes },
    /// Remove whatever lives at `path`.
    Delete { path: String },
}

impl TreeOp {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Put { path, .. } | Self::Delete { path } => path,
        }
    }
}

/// A resolved tree mutation: content objects already created, deletions
/// reduced to tombstones.
#[derive(Debug, Clone)]
pub enum TreeEntry {
    /// Point `path` at an existing content object.
    Object { path: String, id: ObjectId },
    /// Tombstone: drop `path` from the tree.
    Tombstone { path: String },
}

impl TreeEntry {
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Object { path, .. } | Self::Tombstone { path } => path,
        }
    }
}

/// Kind of a directory listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// One entry of a directory listing.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name without the directory prefix.
    pub name: String,
    pub kind: EntryKind,
    /// Handle for fetching the entry's bytes; meaningful for files only.
    pub content: ContentRef,
}

/// Outcome of a compare-and-swap ref update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefUpdate {
    /// The branch now points at the new commit.
    Updated,
    /// The branch moved since the expected head was read; nothing changed.
    Conflict,
}
