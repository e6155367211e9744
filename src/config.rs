//! Configuration for the drive engine.
//!
//! Defaults match the reference deployment: a 1 GiB per-account cap,
//! a 40 MiB per-file limit, and commits against the `main` branch.

use std::time::Duration;

/// Per-account storage cap in bytes (1 GiB).
pub const DEFAULT_STORAGE_CAP: u64 = 1024 * 1024 * 1024;

/// Maximum accepted payload size in bytes (40 MiB).
pub const DEFAULT_MAX_UPLOAD: u64 = 40 * 1024 * 1024;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Per-account storage cap in bytes.
    pub storage_cap: u64,
    /// Maximum accepted payload size in bytes.
    pub max_upload_size: u64,
    /// Branch the engine commits to and reads from.
    pub branch: String,
    /// Maximum concurrent day-bucket fetches during search.
    pub search_concurrency: usize,
    /// Overall search deadline; outstanding fetches are abandoned when it
    /// elapses and the request fails rather than returning partial results.
    pub search_deadline: Duration,
    /// Retries after a rejected ref update (not counting the first attempt).
    pub commit_retries: u32,
    /// Initial backoff delay between commit attempts.
    pub retry_initial_delay: Duration,
    /// Backoff delay cap.
    pub retry_max_delay: Duration,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            storage_cap: DEFAULT_STORAGE_CAP,
            max_upload_size: DEFAULT_MAX_UPLOAD,
            branch: "main".to_string(),
            search_concurrency: 8,
            search_deadline: Duration::from_secs(30),
            commit_retries: 3,
            retry_initial_delay: Duration::from_millis(100),
            retry_max_delay: Duration::from_secs(2),
        }
    }
}

impl DriveConfig {
    /// Set the per-account storage cap.
    #[must_use]
    pub const fn with_storage_cap(mut self, bytes: u64) -> Self {
        self.storage_cap = bytes;
        self
    }

    /// Set the maximum accepted payload size.
    #[must_use]
    pub const fn with_max_upload_size(mut self, bytes: u64) -> Self {
        self.max_upload_size = bytes;
        self
    }

    /// Set the branch the engine operates on.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    /// Set the search fan-out limit.
    #[must_use]
    pub const fn with_search_concurrency(mut self, limit: usize) -> Self {
        self.search_concurrency = limit;
        self
    }

    /// Set the overall search deadline.
    #[must_use]
    pub const fn with_search_deadline(mut self, deadline: Duration) -> Self {
        self.search_deadline = deadline;
        self
    }

    /// Set the commit retry budget.
    #[must_use]
    pub const fn with_commit_retries(mut self, retries: u32) -> Self {
        self.commit_retries = retries;
        self
    }
}
