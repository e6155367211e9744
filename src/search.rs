//! Metadata search over day-partitioned buckets.
//!
//! There is no index structure: the deterministic path scheme is the
//! index. A query expands its time range into per-day metadata buckets,
//! lists them with bounded fan-out, parses each record, filters by
//! substring match and exact timestamp range, then sorts and paginates.
//! A missing bucket contributes nothing; a bucket that fails to list or
//! parse is logged and dropped rather than failing the search. The whole
//! request runs under one deadline - when it elapses, outstanding fetches
//! are abandoned and the request fails instead of returning partial
//! results.

use crate::config::DriveConfig;
use crate::error::{Error, Result};
use crate::paths::day_buckets;
use crate::record::{Account, FileRecord, RepoBinding};
use crate::store::{EntryKind, RepoStore};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// One search request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Substring needle; empty matches every record in range.
    pub query: String,
    /// Inclusive range start (UTC).
    pub from: DateTime<Utc>,
    /// Inclusive range end (UTC).
    pub to: DateTime<Utc>,
    /// 1-based page index.
    pub page: usize,
    pub per_page: usize,
}

/// One page of search results plus the pre-pagination total.
#[derive(Debug, Clone)]
pub struct SearchPage {
    pub results: Vec<FileRecord>,
    /// Total match count across all pages.
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
}

/// Day-bucket search engine.
pub struct SearchEngine {
    store: Arc<dyn RepoStore>,
    concurrency: usize,
    deadline: Duration,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn RepoStore>, config: &DriveConfig) -> Self {
        Self {
            store,
            concurrency: config.search_concurrency.max(1),
            deadline: config.search_deadline,
        }
    }

    /// Run a search against one account's buckets.
    ///
    /// # Errors
    ///
    /// `Validation` for a zero page or page size; `Transport` when the
    /// deadline elapses; store errors from the initial listing layer are
    /// per-bucket and dropped, never propagated.
    pub async fn search(
        &self,
        repo: &RepoBinding,
        account: &Account,
        request: SearchRequest,
    ) -> Result<SearchPage> {
        if request.page == 0 || request.per_page == 0 {
            return Err(Error::validation("page and per_page are 1-based and non-zero"));
        }

        let gather = self.gather(repo, account, &request);
        let mut matches = tokio::time::timeout(self.deadline, gather)
            .await
            .map_err(|_| Error::transport("search deadline elapsed"))?;

        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let total = matches.len();
        let start = (request.page - 1).saturating_mul(request.per_page);
        let results: Vec<FileRecord> = matches
            .into_iter()
            .skip(start)
            .take(request.per_page)
            .collect();

        debug!(
            account = %account,
            query = %request.query,
            total,
            page = request.page,
            returned = results.len(),
            "search complete"
        );

        Ok(SearchPage {
            results,
            total,
            page: request.page,
            per_page: request.per_page,
        })
    }

    /// Fan out over the day buckets and collect every matching record.
    /// Order is not meaningful here; the caller sorts.
    async fn gather(
        &self,
        repo: &RepoBinding,
        account: &Account,
        request: &SearchRequest,
    ) -> Vec<FileRecord> {
        let needle = request.query.to_lowercase();
        let buckets = day_buckets(account, request.from, request.to);
        let per_bucket = stream::iter(buckets)
            .map(|bucket| self.scan_bucket(repo, bucket, request, &needle))
            .buffer_unordered(self.concurrency)
            .collect::<Vec<Vec<FileRecord>>>()
            .await;
        per_bucket.into_iter().flatten().collect()
    }

    /// List one bucket and return its matching records. Any failure here
    /// drops the bucket's contribution with a warning.
    async fn scan_bucket(
        &self,
        repo: &RepoBinding,
        bucket: String,
        request: &SearchRequest,
        needle: &str,
    ) -> Vec<FileRecord> {
        let entries = match self.store.list_directory(repo, &bucket).await {
            Ok(entries) => entries,
            Err(error) => {
                warn!(%bucket, %error, "bucket listing failed, dropping its results");
                return Vec::new();
            },
        };

        let mut matches = Vec::new();
        for entry in entries {
            if entry.kind != EntryKind::File || !entry.name.ends_with(".json") {
                continue;
            }
            let bytes = match self.store.fetch_content(repo, &entry.content).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    warn!(%bucket, entry = %entry.name, %error, "record fetch failed, skipping");
                    continue;
                },
            };
            let record: FileRecord = match serde_json::from_slice(&bytes) {
                Ok(record) => record,
                Err(error) => {
                    warn!(%bucket, entry = %entry.name, %error, "record parse failed, skipping");
                    continue;
                },
            };
            if record.timestamp < request.from || record.timestamp > request.to {
                continue;
            }
            if record.matches(needle) {
                matches.push(record);
            }
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_slicing() {
        // Pure check of the slice arithmetic used by search().
        let total = 120;
        let per_page = 50;
        let page_len = |page: usize| -> usize {
            let start = (page - 1).saturating_mul(per_page);
            (0..total).skip(start).take(per_page).count()
        };
        assert_eq!(page_len(1), 50);
        assert_eq!(page_len(2), 50);
        assert_eq!(page_len(3), 20);
        assert_eq!(page_len(4), 0);
        assert_eq!(page_len(usize::MAX), 0);
    }
}
