//! Per-account storage quota tracking.
//!
//! The durable counter lives outside the engine (the deployment's user
//! database); the engine consumes it through [`QuotaStore`]. The contract
//! enforced here is `usage + candidate <= cap` at accept time, with the
//! increment applied only after a successful commit. Deletes do not
//! reclaim usage: [`QuotaTracker::commit`] is the only mutation path and
//! nothing in the delete flow calls it.

use crate::error::{Error, Result};
use crate::record::Account;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// Durable usage counter keyed by account.
#[async_trait]
pub trait QuotaStore: Send + Sync + 'static {
    /// Current usage in bytes; zero for unknown accounts.
    async fn usage(&self, account: &Account) -> Result<u64>;

    /// Atomically add `bytes` and return the new total. Must be safe
    /// under concurrent callers for the same account.
    async fn add(&self, account: &Account, bytes: u64) -> Result<u64>;
}

/// In-memory quota store for tests and embedded use.
#[derive(Clone, Default)]
pub struct MemoryQuotaStore {
    used: DashMap<String, u64>,
}

impl MemoryQuotaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn usage(&self, account: &Account) -> Result<u64> {
        Ok(self
            .used
            .get(account.as_str())
            .map(|entry| *entry.value())
            .unwrap_or(0))
    }

    async fn add(&self, account: &Account, bytes: u64) -> Result<u64> {
        // The entry guard holds the shard lock, making the read-modify-write
        // atomic per account.
        let mut entry = self.used.entry(account.as_str().to_string()).or_insert(0);
        *entry = entry.saturating_add(bytes);
        Ok(*entry)
    }
}

/// Gate and post-commit updater for the byte budget.
pub struct QuotaTracker {
    store: std::sync::Arc<dyn QuotaStore>,
    cap: u64,
}

impl QuotaTracker {
    pub fn new(store: std::sync::Arc<dyn QuotaStore>, cap: u64) -> Self {
        Self { store, cap }
    }

    /// The configured cap in bytes.
    #[must_use]
    pub fn cap(&self) -> u64 {
        self.cap
    }

    /// Current usage for an account.
    pub async fn usage(&self, account: &Account) -> Result<u64> {
        self.store.usage(account).await
    }

    /// Accept or reject a candidate payload before ingestion starts.
    ///
    /// Accepts when `usage + candidate` lands exactly on the cap and
    /// rejects one byte over it.
    pub async fn check(&self, account: &Account, candidate: u64) -> Result<()> {
        let used = self.store.usage(account).await?;
        if used.saturating_add(candidate) > self.cap {
            return Err(Error::QuotaExceeded {
                used,
                candidate,
                cap: self.cap,
            });
        }
        Ok(())
    }

    /// Record accepted bytes after a successful commit.
    pub async fn commit(&self, account: &Account, bytes: u64) -> Result<u64> {
        let total = self.store.add(account, bytes).await?;
        debug!(account = %account, bytes, total, "quota committed");
        Ok(total)
    }
}
