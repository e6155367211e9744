//! GitHub-backed repository store.
//!
//! Implements the store primitives against the GitHub Git Data API
//! (blobs/trees/commits/refs) and the Contents API for directory listing.
//! A 404 on a directory listing is the normal "no files that day" outcome;
//! everything else non-2xx surfaces as a transport error with the response
//! detail preserved for logging.

use super::backend::RepoStore;
use super::types::{CommitId, ContentRef, DirEntry, EntryKind, ObjectId, RefUpdate, TreeEntry, TreeId};
use crate::error::{Error, Result};
use crate::record::RepoBinding;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

/// GitHub repository store.
///
/// One instance per authorization credential; the credential's scope is
/// trusted as declared by the identity provider and not re-validated here.
#[derive(Clone)]
pub struct GithubRepoStore {
    http: Client,
    api_base: String,
}

#[derive(Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Deserialize)]
struct ShaResponse {
    sha: String,
}

#[derive(Deserialize)]
struct ContentEntry {
    name: String,
    sha: String,
    #[serde(rename = "type")]
    kind: String,
}

impl GithubRepoStore {
    /// Create a store authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the token is not a valid header value.
    pub fn new(token: &str) -> Result<Self> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Create a store against a non-default API base (GitHub Enterprise,
    /// or a local fixture server in tests).
    pub fn with_api_base(token: &str, api_base: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| Error::validation("authorization token is not header-safe"))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(USER_AGENT, HeaderValue::from_static("gitdrive"));
        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::transport_with("building http client", e))?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, repo: &RepoBinding, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{tail}",
            self.api_base, repo.owner, repo.name
        )
    }

    async fn send(&self, request: reqwest::RequestBuilder, context: &str) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::transport_with(context.to_string(), e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(context, status = status.as_u16(), %body, "backing store rejected request");
        Err(Error::transport(format!("{context}: status {status}")))
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: Response,
        context: &str,
    ) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| Error::transport_with(format!("{context}: decoding response"), e))
    }
}

/// Request body for tree creation: tombstones carry a null sha, which the
/// backing store interprets as "drop this path".
fn tree_request_body(base: &CommitId, entries: &[TreeEntry]) -> Value {
    let items: Vec<Value> = entries
        .iter()
        .map(|entry| match entry {
            TreeEntry::Object { path, id } => json!({
                "path": path,
                "mode": "100644",
                "type": "blob",
                "sha": id.as_str(),
            }),
            TreeEntry::Tombstone { path } => json!({
                "path": path,
                "mode": "100644",
                "type": "blob",
                "sha": Value::Null,
            }),
        })
        .collect();
    json!({ "base_tree": base.as_str(), "tree": items })
}

#[async_trait]
impl RepoStore for GithubRepoStore {
    async fn branch_head(&self, repo: &RepoBinding, branch: &str) -> Result<CommitId> {
        let url = self.url(repo, &format!("git/ref/heads/{branch}"));
        let response = self
            .http
            .get(&url)
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| Error::transport_with("reading branch head", e))?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::not_configured(format!(
                "branch '{branch}' absent in {}",
                repo.full_name()
            ))),
            status if status.is_success() => {
                let parsed: RefResponse = Self::parse(response, "reading branch head").await?;
                Ok(CommitId(parsed.object.sha))
            },
            status => Err(Error::transport(format!(
                "reading branch head: status {status}"
            ))),
        }
    }

    async fn create_object(&self, repo: &RepoBinding, bytes: &[u8]) -> Result<ObjectId> {
        let url = self.url(repo, "git/blobs");
        let body = json!({
            "content": BASE64.encode(bytes),
            "encoding": "base64",
        });
        let request = self.http.post(&url).header(ACCEPT, JSON_MEDIA_TYPE).json(&body);
        let response = self.send(request, "creating content object").await?;
        let parsed: ShaResponse = Self::parse(response, "creating content object").await?;
        Ok(ObjectId(parsed.sha))
    }

    async fn create_tree(
        &self,
        repo: &RepoBinding,
        base: &CommitId,
        entries: &[TreeEntry],
    ) -> Result<TreeId> {
        let url = self.url(repo, "git/trees");
        let body = tree_request_body(base, entries);
        let request = self.http.post(&url).header(ACCEPT, JSON_MEDIA_TYPE).json(&body);
        let response = self.send(request, "creating tree").await?;
        let parsed: ShaResponse = Self::parse(response, "creating tree").await?;
        Ok(TreeId(parsed.sha))
    }

    async fn create_commit(
        &self,
        repo: &RepoBinding,
        tree: &TreeId,
        parent: &CommitId,
        message: &str,
    ) -> Result<CommitId> {
        let url = self.url(repo, "git/commits");
        let body = json!({
            "message": message,
            "tree": tree.as_str(),
            "parents": [parent.as_str()],
        });
        let request = self.http.post(&url).header(ACCEPT, JSON_MEDIA_TYPE).json(&body);
        let response = self.send(request, "creating commit").await?;
        let parsed: ShaResponse = Self::parse(response, "creating commit").await?;
        Ok(CommitId(parsed.sha))
    }

    async fn compare_and_swap_ref(
        &self,
        repo: &RepoBinding,
        branch: &str,
        expected: &CommitId,
        new: &CommitId,
    ) -> Result<RefUpdate> {
        // A non-forced ref update is fast-forward-only. Our candidate
        // commit's parent is `expected`, so the update can only succeed
        // while the branch still points at `expected` - the stale-head
        // case is rejected with 422, which is exactly the CAS contract.
        let url = self.url(repo, &format!("git/refs/heads/{branch}"));
        let body = json!({ "sha": new.as_str(), "force": false });
        let response = self
            .http
            .patch(&url)
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::transport_with("advancing branch ref", e))?;
        match response.status() {
            status if status.is_success() => Ok(RefUpdate::Updated),
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
                debug!(
                    branch,
                    expected = expected.as_str(),
                    new = new.as_str(),
                    "ref update rejected, branch moved"
                );
                Ok(RefUpdate::Conflict)
            },
            status => Err(Error::transport(format!(
                "advancing branch ref: status {status}"
            ))),
        }
    }

    async fn list_directory(&self, repo: &RepoBinding, path: &str) -> Result<Vec<DirEntry>> {
        let url = self.url(repo, &format!("contents/{path}"));
        let response = self
            .http
            .get(&url)
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| Error::transport_with("listing directory", e))?;
        match response.status() {
            // No bucket for that day: a normal empty outcome.
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => {
                let entries: Vec<ContentEntry> =
                    Self::parse(response, "listing directory").await?;
                Ok(entries
                    .into_iter()
                    .map(|entry| DirEntry {
                        kind: if entry.kind == "dir" {
                            EntryKind::Dir
                        } else {
                            EntryKind::File
                        },
                        content: ContentRef(entry.sha),
                        name: entry.name,
                    })
                    .collect())
            },
            status => Err(Error::transport(format!(
                "listing directory: status {status}"
            ))),
        }
    }

    async fn fetch_content(&self, repo: &RepoBinding, content: &ContentRef) -> Result<Bytes> {
        let url = self.url(repo, &format!("git/blobs/{}", content.as_str()));
        let response = self
            .http
            .get(&url)
            .header(ACCEPT, RAW_MEDIA_TYPE)
            .send()
            .await
            .map_err(|e| Error::transport_with("fetching content", e))?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::not_found(format!("object {content}"))),
            status if status.is_success() => response
                .bytes()
                .await
                .map_err(|e| Error::transport_with("fetching content body", e)),
            status => Err(Error::transport(format!(
                "fetching content: status {status}"
            ))),
        }
    }
}
