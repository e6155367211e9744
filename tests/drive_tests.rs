//! End-to-end tests of upload, delete, quota, and commit behavior over the
//! in-memory backing store.

use async_trait::async_trait;
use bytes::Bytes;
use gitdrive::fingerprint::GRID_LEN;
use gitdrive::store::{
    CommitId, ContentRef, DirEntry, ObjectId, RefUpdate, TreeEntry, TreeId,
};
use gitdrive::{
    Account, DriveConfig, DriveService, Error, MediaProcessor, MemoryBindingStore,
    MemoryQuotaStore, MemoryRepoStore, RepoBinding, RepoStore, UploadRequest,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn account() -> Account {
    Account::from_identity("alice@example.com")
}

fn repo() -> RepoBinding {
    RepoBinding::new("alice", "drive")
}

fn upload_request(name: &str, bytes: &[u8], mime: &str) -> UploadRequest {
    UploadRequest {
        account: account(),
        name: name.to_string(),
        bytes: Bytes::copy_from_slice(bytes),
        mime: Some(mime.to_string()),
        tags: None,
        declared_sha256: None,
    }
}

struct TestDrive {
    service: DriveService,
    store: Arc<MemoryRepoStore>,
}

fn setup(config: DriveConfig) -> TestDrive {
    let (service, store, bindings) = DriveService::in_memory(config.clone());
    bindings.bind(&account(), repo());
    store.create_repo(&repo(), &config.branch);
    TestDrive { service, store }
}

/// Deterministic media stack: a fixed thumbnail, a gradient luma grid
/// whose fingerprint is all ones, and a fixed extracted text.
struct FakeMedia;

#[async_trait]
impl MediaProcessor for FakeMedia {
    async fn thumbnail(&self, _bytes: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(b"thumb-jpeg".to_vec())
    }

    async fn luma_grid(&self, _bytes: &[u8]) -> anyhow::Result<[u8; GRID_LEN]> {
        let mut grid = [0u8; GRID_LEN];
        for row in 0..8 {
            for col in 0..9 {
                grid[row * 9 + col] = (9 - col) as u8;
            }
        }
        Ok(grid)
    }

    async fn extract_text(&self, _bytes: &[u8], _mime: &str) -> anyhow::Result<String> {
        Ok("Invoice total 42.00".to_string())
    }
}

fn setup_with_media(config: DriveConfig, media: Arc<dyn MediaProcessor>) -> TestDrive {
    let store = Arc::new(MemoryRepoStore::new());
    let bindings = Arc::new(MemoryBindingStore::new());
    bindings.bind(&account(), repo());
    store.create_repo(&repo(), &config.branch);
    let service = DriveService::new(
        Arc::clone(&store) as Arc<dyn RepoStore>,
        bindings,
        Arc::new(MemoryQuotaStore::new()),
        media,
        config,
    );
    TestDrive { service, store }
}

#[tokio::test]
async fn test_upload_writes_object_and_metadata_atomically() {
    let drive = setup(DriveConfig::default());
    let outcome = drive
        .service
        .upload(upload_request("notes.txt", b"hello world", "text/plain"))
        .await
        .unwrap();

    let paths = drive.store.paths_at_head(&repo()).unwrap();
    assert!(paths.contains(&outcome.record.path));
    assert_eq!(paths.len(), 2, "object + metadata, no thumbnail for text");
    // One upload, one commit on top of the root.
    assert_eq!(drive.store.history(&repo(), "main").unwrap().len(), 2);
    assert_eq!(outcome.record.size, 11);
    assert_eq!(outcome.record.mime, "text/plain");
    assert!(outcome.record.phash.is_empty());
}

#[tokio::test]
async fn test_upload_then_fetch_round_trips_bytes() {
    let drive = setup(DriveConfig::default());
    let payload = b"the payload bytes";
    let outcome = drive
        .service
        .upload(upload_request("data.bin", payload, "application/octet-stream"))
        .await
        .unwrap();

    let fetched = drive
        .service
        .fetch(&account(), &outcome.record.path)
        .await
        .unwrap();
    assert_eq!(&fetched[..], payload);
}

#[tokio::test]
async fn test_image_upload_carries_thumbnail_and_fingerprint() {
    let drive = setup_with_media(DriveConfig::default(), Arc::new(FakeMedia));
    let outcome = drive
        .service
        .upload(upload_request("photo.png", b"png-bytes", "image/png"))
        .await
        .unwrap();

    assert_eq!(outcome.record.phash, "0xffffffffffffffff");
    assert_eq!(outcome.record.ocr_text, "Invoice total 42.00");
    let thumb = outcome.thumbnail_path.expect("thumbnail committed");
    let paths = drive.store.paths_at_head(&repo()).unwrap();
    assert_eq!(paths.len(), 3);
    assert!(paths.contains(&thumb));
    assert!(outcome.enrichment_failures.is_empty());
}

#[tokio::test]
async fn test_enrichment_failure_is_non_fatal() {
    // NoMedia fails every capability; the upload must still land.
    let drive = setup(DriveConfig::default());
    let outcome = drive
        .service
        .upload(upload_request("photo.png", b"png-bytes", "image/png"))
        .await
        .unwrap();

    assert!(outcome.record.phash.is_empty());
    assert!(outcome.record.ocr_text.is_empty());
    assert!(outcome.thumbnail_path.is_none());
    assert_eq!(outcome.enrichment_failures.len(), 3);
    assert_eq!(drive.store.paths_at_head(&repo()).unwrap().len(), 2);
}

#[tokio::test]
async fn test_integrity_mismatch_means_zero_writes_and_zero_quota() {
    let drive = setup(DriveConfig::default());
    let mut request = upload_request("doc.pdf", b"pdf bytes", "application/pdf");
    request.declared_sha256 = Some("00".repeat(32));

    let err = drive.service.upload(request).await.unwrap_err();
    assert!(matches!(err, Error::Integrity { .. }));
    assert!(drive.store.paths_at_head(&repo()).unwrap().is_empty());
    assert_eq!(drive.service.quota_usage(&account()).await.unwrap(), 0);
    // Only the root commit exists.
    assert_eq!(drive.store.history(&repo(), "main").unwrap().len(), 1);
}

#[tokio::test]
async fn test_matching_declared_hash_is_accepted_case_insensitively() {
    let drive = setup(DriveConfig::default());
    let payload = b"verified payload";
    let mut request = upload_request("doc.txt", payload, "text/plain");
    request.declared_sha256 = Some(gitdrive::hash::content_hash(payload).to_uppercase());
    drive.service.upload(request).await.unwrap();
}

#[tokio::test]
async fn test_quota_boundary_accept_at_cap_reject_over() {
    let drive = setup(DriveConfig::default().with_storage_cap(100));
    drive
        .service
        .upload(upload_request("a.bin", &[0u8; 60], "application/octet-stream"))
        .await
        .unwrap();
    assert_eq!(drive.service.quota_usage(&account()).await.unwrap(), 60);

    // usage + 40 == cap: accepted.
    drive
        .service
        .upload(upload_request("b.bin", &[0u8; 40], "application/octet-stream"))
        .await
        .unwrap();
    assert_eq!(drive.service.quota_usage(&account()).await.unwrap(), 100);

    // usage + 1 == cap + 1: rejected before any write.
    let err = drive
        .service
        .upload(upload_request("c.bin", &[0u8; 1], "application/octet-stream"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::QuotaExceeded { .. }));
    assert_eq!(drive.store.paths_at_head(&repo()).unwrap().len(), 4);
}

#[tokio::test]
async fn test_zero_byte_upload_is_accepted() {
    let drive = setup(DriveConfig::default());
    let outcome = drive
        .service
        .upload(upload_request("empty.txt", b"", "text/plain"))
        .await
        .unwrap();

    assert_eq!(outcome.record.size, 0);
    assert_eq!(
        outcome.record.sha256,
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert_eq!(drive.store.paths_at_head(&repo()).unwrap().len(), 2);
    assert_eq!(drive.service.quota_usage(&account()).await.unwrap(), 0);
}

#[tokio::test]
async fn test_oversize_payload_rejected() {
    let drive = setup(DriveConfig::default().with_max_upload_size(8));
    let err = drive
        .service
        .upload(upload_request("big.bin", &[0u8; 9], "application/octet-stream"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn test_delete_removes_object_metadata_and_thumbnail() {
    let drive = setup_with_media(DriveConfig::default(), Arc::new(FakeMedia));
    let outcome = drive
        .service
        .upload(upload_request("photo.png", b"png-bytes", "image/png"))
        .await
        .unwrap();
    assert_eq!(drive.store.paths_at_head(&repo()).unwrap().len(), 3);

    let commit = drive
        .service
        .delete(&account(), &outcome.record.path)
        .await
        .unwrap();
    assert!(commit.is_some());
    assert!(drive.store.paths_at_head(&repo()).unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_of_absent_paths_is_a_no_op() {
    let drive = setup(DriveConfig::default());
    let commits_before = drive.store.history(&repo(), "main").unwrap().len();

    let commit = drive
        .service
        .delete(
            &account(),
            "uploads/alice_example_com/2020/01/01/20200101T000000Z_abc123.png",
        )
        .await
        .unwrap();
    assert!(commit.is_none());
    assert_eq!(
        drive.store.history(&repo(), "main").unwrap().len(),
        commits_before
    );
}

#[tokio::test]
async fn test_delete_tolerates_partially_absent_triple() {
    // Text upload has no thumbnail; deleting must still succeed.
    let drive = setup(DriveConfig::default());
    let outcome = drive
        .service
        .upload(upload_request("notes.txt", b"hello", "text/plain"))
        .await
        .unwrap();

    drive
        .service
        .delete(&account(), &outcome.record.path)
        .await
        .unwrap()
        .expect("object and metadata existed");
    assert!(drive.store.paths_at_head(&repo()).unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_does_not_reclaim_quota() {
    let drive = setup(DriveConfig::default());
    let outcome = drive
        .service
        .upload(upload_request("notes.txt", b"hello", "text/plain"))
        .await
        .unwrap();
    assert_eq!(drive.service.quota_usage(&account()).await.unwrap(), 5);

    drive
        .service
        .delete(&account(), &outcome.record.path)
        .await
        .unwrap();
    // Usage is append-only: the counter keeps the accepted bytes.
    assert_eq!(drive.service.quota_usage(&account()).await.unwrap(), 5);
}

#[tokio::test]
async fn test_foreign_paths_are_rejected() {
    let drive = setup(DriveConfig::default());
    let foreign = "uploads/mallory/2025/01/01/20250101T000000Z_abc123.png";
    assert!(matches!(
        drive.service.delete(&account(), foreign).await.unwrap_err(),
        Error::Validation(_)
    ));
    assert!(matches!(
        drive.service.fetch(&account(), foreign).await.unwrap_err(),
        Error::Validation(_)
    ));
}

#[tokio::test]
async fn test_unbound_account_is_not_configured() {
    let (service, _store, _bindings) = DriveService::in_memory(DriveConfig::default());
    let err = service
        .upload(upload_request("x.txt", b"x", "text/plain"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotConfigured(_)));
}

/// Store wrapper that simulates a concurrent writer: the first
/// compare-and-swap triggers an out-of-band commit first, so the engine's
/// swap is rejected once and must rebuild against the new head.
struct RacingStore {
    inner: Arc<MemoryRepoStore>,
    raced: AtomicBool,
}

impl RacingStore {
    async fn interleave_commit(&self, repo: &RepoBinding) {
        let head = self.inner.branch_head(repo, "main").await.unwrap();
        let object = self.inner.create_object(repo, b"competing").await.unwrap();
        let tree = self
            .inner
            .create_tree(
                repo,
                &head,
                &[TreeEntry::Object {
                    path: "meta/alice_example_com/2025/01/01/competitor.json".to_string(),
                    id: object,
                }],
            )
            .await
            .unwrap();
        let commit = self
            .inner
            .create_commit(repo, &tree, &head, "Upload competitor")
            .await
            .unwrap();
        let updated = self
            .inner
            .compare_and_swap_ref(repo, "main", &head, &commit)
            .await
            .unwrap();
        assert_eq!(updated, RefUpdate::Updated);
    }
}

#[async_trait]
impl RepoStore for RacingStore {
    async fn branch_head(&self, repo: &RepoBinding, branch: &str) -> gitdrive::Result<CommitId> {
        self.inner.branch_head(repo, branch).await
    }

    async fn create_object(&self, repo: &RepoBinding, bytes: &[u8]) -> gitdrive::Result<ObjectId> {
        self.inner.create_object(repo, bytes).await
    }

    async fn create_tree(
        &self,
        repo: &RepoBinding,
        base: &CommitId,
        entries: &[TreeEntry],
    ) -> gitdrive::Result<TreeId> {
        self.inner.create_tree(repo, base, entries).await
    }

    async fn create_commit(
        &self,
        repo: &RepoBinding,
        tree: &TreeId,
        parent: &CommitId,
        message: &str,
    ) -> gitdrive::Result<CommitId> {
        self.inner.create_commit(repo, tree, parent, message).await
    }

    async fn compare_and_swap_ref(
        &self,
        repo: &RepoBinding,
        branch: &str,
        expected: &CommitId,
        new: &CommitId,
    ) -> gitdrive::Result<RefUpdate> {
        if !self.raced.swap(true, Ordering::SeqCst) {
            self.interleave_commit(repo).await;
        }
        self.inner
            .compare_and_swap_ref(repo, branch, expected, new)
            .await
    }

    async fn list_directory(
        &self,
        repo: &RepoBinding,
        path: &str,
    ) -> gitdrive::Result<Vec<DirEntry>> {
        self.inner.list_directory(repo, path).await
    }

    async fn fetch_content(
        &self,
        repo: &RepoBinding,
        content: &ContentRef,
    ) -> gitdrive::Result<Bytes> {
        self.inner.fetch_content(repo, content).await
    }
}

#[tokio::test]
async fn test_racing_commit_rebuilds_once_and_lands_linearly() {
    let inner = Arc::new(MemoryRepoStore::new());
    inner.create_repo(&repo(), "main");
    let racing = Arc::new(RacingStore {
        inner: Arc::clone(&inner),
        raced: AtomicBool::new(false),
    });
    let bindings = Arc::new(MemoryBindingStore::new());
    bindings.bind(&account(), repo());
    let service = DriveService::new(
        racing as Arc<dyn RepoStore>,
        bindings,
        Arc::new(MemoryQuotaStore::new()),
        Arc::new(gitdrive::NoMedia),
        DriveConfig::default(),
    );

    let outcome = service
        .upload(upload_request("notes.txt", b"racer", "text/plain"))
        .await
        .unwrap();

    // Root + competing commit + rebuilt upload commit, one parent each:
    // never two divergent heads.
    assert_eq!(inner.history(&repo(), "main").unwrap().len(), 3);
    let paths = inner.paths_at_head(&repo()).unwrap();
    assert!(paths.contains(&outcome.record.path));
    assert!(
        paths.contains(&"meta/alice_example_com/2025/01/01/competitor.json".to_string()),
        "the competing write survives the rebuild"
    );
}
