//!
//! Backend service collaborators
//! -----------------------------
//! Capability traits for the external services the core talks to: the remote
//! HPC storage gateway, the consumer cloud provider, the search index and the
//! task queue. Each trait has one reqwest-backed implementation; adapters and
//! tests depend only on the trait objects, never on the wire formats.
//!
//! Error taxonomy at this layer: a 404 becomes `ClientError::NotFound` (the
//! benign absence case existence probes rely on), any other non-success HTTP
//! status becomes `ClientError::Http`, and connection-level failures surface
//! as `ClientError::Transport`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::fm::{DownloadHandle, FileKind, FileResource, PermissionRecord};
use crate::paths;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("backend returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Primary remote storage gateway API.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Metadata for a single entry. 404s surface as `ClientError::NotFound`.
    async fn stat(&self, system: &str, path: &str) -> ClientResult<FileResource>;

    async fn listing(&self, system: &str, path: &str, offset: usize, limit: usize) -> ClientResult<Vec<FileResource>>;

    async fn upload(&self, system: &str, path: &str, file_name: &str, content: Vec<u8>) -> ClientResult<FileResource>;

    async fn download_postit(&self, system: &str, path: &str) -> ClientResult<DownloadHandle>;

    async fn mkdir(&self, system: &str, path: &str, dir_name: &str) -> ClientResult<FileResource>;

    async fn copy(&self, system: &str, path: &str, dest_path: &str, dest_name: &str) -> ClientResult<FileResource>;

    async fn move_to(&self, system: &str, path: &str, dest_path: &str, dest_name: Option<&str>) -> ClientResult<FileResource>;

    async fn rename(&self, system: &str, path: &str, new_name: &str) -> ClientResult<FileResource>;

    async fn delete(&self, system: &str, path: &str) -> ClientResult<()>;

    async fn list_permissions(&self, system: &str, path: &str) -> ClientResult<Vec<PermissionRecord>>;

    async fn update_permission(&self, system: &str, path: &str, username: &str, permission: &str, recursive: bool) -> ClientResult<()>;

    async fn import_data(&self, system: &str, path: &str, from_system: &str, from_path: &str) -> ClientResult<FileResource>;

    /// Create every missing directory level of `path`, walking from the root.
    /// Only a missing level triggers a mkdir; any non-404 probe failure
    /// propagates.
    async fn ensure_path(&self, system: &str, path: &str) -> ClientResult<()> {
        let norm = paths::normalize(path);
        if norm == paths::ROOT {
            return Ok(());
        }
        let mut built = String::new();
        for segment in norm.split('/') {
            let current = if built.is_empty() { segment.to_string() } else { format!("{}/{}", built, segment) };
            match self.stat(system, &current).await {
                Ok(_) => {}
                Err(ClientError::NotFound(_)) => {
                    let parent = if built.is_empty() { paths::ROOT.to_string() } else { built.clone() };
                    self.mkdir(system, &parent, segment).await?;
                }
                Err(e) => return Err(e),
            }
            built = current;
        }
        Ok(())
    }
}

/// Consumer cloud storage provider API.
#[async_trait]
pub trait CloudStorage: Send + Sync {
    async fn entry(&self, path: &str) -> ClientResult<FileResource>;

    async fn children(&self, path: &str, offset: usize, limit: usize) -> ClientResult<Vec<FileResource>>;

    async fn upload(&self, path: &str, file_name: &str, content: Vec<u8>) -> ClientResult<FileResource>;

    async fn share_link(&self, path: &str) -> ClientResult<DownloadHandle>;

    async fn new_folder(&self, path: &str, name: &str) -> ClientResult<FileResource>;

    async fn copy_to(&self, path: &str, dest_path: &str, dest_name: &str) -> ClientResult<FileResource>;

    async fn move_to(&self, path: &str, dest_path: &str, dest_name: Option<&str>) -> ClientResult<FileResource>;

    async fn rename(&self, path: &str, new_name: &str) -> ClientResult<FileResource>;

    async fn remove(&self, path: &str) -> ClientResult<()>;

    async fn invite(&self, path: &str, login: &str, role: &str) -> ClientResult<()>;

    async fn search(&self, q: &str, offset: usize, limit: usize) -> ClientResult<Vec<FileResource>>;
}

/// Search index over the file tree.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search_files(&self, username: &str, system: &str, q: &str, offset: usize, limit: usize) -> ClientResult<Vec<FileResource>>;
}

/// External asynchronous task queue. The contract ends at "message accepted
/// for delivery"; execution guarantees belong to the consumer.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn submit(&self, channel: &str, task_name: &str, payload: &Value) -> ClientResult<()>;
}

// ---- wire helpers shared by the reqwest implementations ----

#[derive(Debug, Deserialize)]
struct WireFile {
    name: String,
    path: String,
    #[serde(default)]
    system: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    length: u64,
    #[serde(rename = "lastModified", default)]
    last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    permissions: Option<String>,
}

impl WireFile {
    fn into_resource(self, fallback_system: &str) -> FileResource {
        let kind = match self.kind.as_deref() {
            Some("dir") | Some("folder") => FileKind::Dir,
            _ => FileKind::File,
        };
        FileResource {
            name: self.name,
            path: self.path,
            system: self.system.unwrap_or_else(|| fallback_system.to_string()),
            kind,
            length: self.length,
            last_modified: self.last_modified,
            permissions: self.permissions.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePostit {
    url: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    expires: Option<DateTime<Utc>>,
}

impl From<WirePostit> for DownloadHandle {
    fn from(w: WirePostit) -> Self {
        DownloadHandle { url: w.url, method: w.method.unwrap_or_else(|| "GET".to_string()), expires: w.expires }
    }
}

/// Percent-encode each segment of a logical path; the root encodes to "".
fn encode_path(path: &str) -> String {
    let norm = paths::normalize(path);
    if norm == paths::ROOT {
        return String::new();
    }
    norm.split('/').map(|s| urlencoding::encode(s).into_owned()).collect::<Vec<_>>().join("/")
}

/// Unwrap an optional `{"result": ...}` envelope.
fn result_value(v: Value) -> Value {
    match v {
        Value::Object(mut map) => map.remove("result").unwrap_or(Value::Object(map)),
        other => other,
    }
}

async fn into_json(resp: reqwest::Response, what: &str) -> ClientResult<Value> {
    let status = resp.status();
    if status.as_u16() == 404 {
        return Err(ClientError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(ClientError::Http { status: status.as_u16(), message });
    }
    Ok(resp.json::<Value>().await?)
}

async fn into_unit(resp: reqwest::Response, what: &str) -> ClientResult<()> {
    let status = resp.status();
    if status.as_u16() == 404 {
        return Err(ClientError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(ClientError::Http { status: status.as_u16(), message });
    }
    Ok(())
}

fn parse_file(v: Value, system: &str) -> ClientResult<FileResource> {
    let wire: WireFile = serde_json::from_value(result_value(v)).map_err(|e| ClientError::Http {
        status: 500,
        message: format!("unparseable file payload: {}", e),
    })?;
    Ok(wire.into_resource(system))
}

fn parse_files(v: Value, system: &str) -> ClientResult<Vec<FileResource>> {
    let wires: Vec<WireFile> = serde_json::from_value(result_value(v)).map_err(|e| ClientError::Http {
        status: 500,
        message: format!("unparseable listing payload: {}", e),
    })?;
    Ok(wires.into_iter().map(|w| w.into_resource(system)).collect())
}

// ---- reqwest implementations ----

/// Authenticated HTTP client for the remote storage gateway.
pub struct HttpStorageGateway {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl HttpStorageGateway {
    pub fn new(base: impl Into<String>, token: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base: base.into(), token: token.into() }
    }

    fn url(&self, kind: &str, system: &str, path: &str) -> String {
        format!("{}/files/{}/{}/{}", self.base, kind, system, encode_path(path))
    }

    async fn media_action(&self, system: &str, path: &str, body: Value) -> ClientResult<FileResource> {
        let url = self.url("media", system, path);
        let resp = self.http.put(&url).bearer_auth(&self.token).json(&body).send().await?;
        parse_file(into_json(resp, path).await?, system)
    }
}

#[async_trait]
impl StorageGateway for HttpStorageGateway {
    async fn stat(&self, system: &str, path: &str) -> ClientResult<FileResource> {
        let url = self.url("stat", system, path);
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;
        parse_file(into_json(resp, path).await?, system)
    }

    async fn listing(&self, system: &str, path: &str, offset: usize, limit: usize) -> ClientResult<Vec<FileResource>> {
        let url = self.url("listings", system, path);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;
        parse_files(into_json(resp, path).await?, system)
    }

    async fn upload(&self, system: &str, path: &str, file_name: &str, content: Vec<u8>) -> ClientResult<FileResource> {
        let url = self.url("media", system, path);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .query(&[("name", file_name)])
            .body(content)
            .send()
            .await?;
        parse_file(into_json(resp, path).await?, system)
    }

    async fn download_postit(&self, system: &str, path: &str) -> ClientResult<DownloadHandle> {
        let url = format!("{}/postits", self.base);
        let body = json!({ "system": system, "path": paths::normalize(path) });
        let resp = self.http.post(&url).bearer_auth(&self.token).json(&body).send().await?;
        let wire: WirePostit = serde_json::from_value(result_value(into_json(resp, path).await?))
            .map_err(|e| ClientError::Http { status: 500, message: format!("unparseable postit payload: {}", e) })?;
        Ok(wire.into())
    }

    async fn mkdir(&self, system: &str, path: &str, dir_name: &str) -> ClientResult<FileResource> {
        self.media_action(system, path, json!({ "action": "mkdir", "path": dir_name })).await
    }

    async fn copy(&self, system: &str, path: &str, dest_path: &str, dest_name: &str) -> ClientResult<FileResource> {
        self.media_action(system, path, json!({ "action": "copy", "path": paths::join(dest_path, dest_name) })).await
    }

    async fn move_to(&self, system: &str, path: &str, dest_path: &str, dest_name: Option<&str>) -> ClientResult<FileResource> {
        let name = dest_name.map(str::to_string).unwrap_or_else(|| paths::file_name(path));
        self.media_action(system, path, json!({ "action": "move", "path": paths::join(dest_path, &name) })).await
    }

    async fn rename(&self, system: &str, path: &str, new_name: &str) -> ClientResult<FileResource> {
        self.media_action(system, path, json!({ "action": "rename", "path": new_name })).await
    }

    async fn delete(&self, system: &str, path: &str) -> ClientResult<()> {
        let url = self.url("media", system, path);
        let resp = self.http.delete(&url).bearer_auth(&self.token).send().await?;
        into_unit(resp, path).await
    }

    async fn list_permissions(&self, system: &str, path: &str) -> ClientResult<Vec<PermissionRecord>> {
        let url = self.url("pems", system, path);
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;
        let v = result_value(into_json(resp, path).await?);
        serde_json::from_value(v)
            .map_err(|e| ClientError::Http { status: 500, message: format!("unparseable permissions payload: {}", e) })
    }

    async fn update_permission(&self, system: &str, path: &str, username: &str, permission: &str, recursive: bool) -> ClientResult<()> {
        let url = self.url("pems", system, path);
        let body = json!({ "username": username, "permission": permission, "recursive": recursive });
        let resp = self.http.post(&url).bearer_auth(&self.token).json(&body).send().await?;
        into_unit(resp, path).await
    }

    async fn import_data(&self, system: &str, path: &str, from_system: &str, from_path: &str) -> ClientResult<FileResource> {
        self.media_action(
            system,
            path,
            json!({ "action": "import", "from_system": from_system, "from_path": paths::normalize(from_path) }),
        )
        .await
    }
}

/// Authenticated HTTP client for the consumer cloud provider.
pub struct HttpCloudStorage {
    http: reqwest::Client,
    base: String,
    token: String,
    /// Logical system label stamped onto returned resources.
    system: String,
}

impl HttpCloudStorage {
    pub fn new(base: impl Into<String>, token: impl Into<String>, system: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base: base.into(), token: token.into(), system: system.into() }
    }

    fn item_url(&self, path: &str, tail: &str) -> String {
        let enc = encode_path(path);
        if tail.is_empty() {
            format!("{}/items/{}", self.base, enc)
        } else {
            format!("{}/items/{}/{}", self.base, enc, tail)
        }
    }
}

#[async_trait]
impl CloudStorage for HttpCloudStorage {
    async fn entry(&self, path: &str) -> ClientResult<FileResource> {
        let resp = self.http.get(self.item_url(path, "")).bearer_auth(&self.token).send().await?;
        parse_file(into_json(resp, path).await?, &self.system)
    }

    async fn children(&self, path: &str, offset: usize, limit: usize) -> ClientResult<Vec<FileResource>> {
        let resp = self
            .http
            .get(self.item_url(path, "children"))
            .bearer_auth(&self.token)
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;
        parse_files(into_json(resp, path).await?, &self.system)
    }

    async fn upload(&self, path: &str, file_name: &str, content: Vec<u8>) -> ClientResult<FileResource> {
        let resp = self
            .http
            .post(self.item_url(path, "content"))
            .bearer_auth(&self.token)
            .query(&[("name", file_name)])
            .body(content)
            .send()
            .await?;
        parse_file(into_json(resp, path).await?, &self.system)
    }

    async fn share_link(&self, path: &str) -> ClientResult<DownloadHandle> {
        let resp = self.http.post(self.item_url(path, "link")).bearer_auth(&self.token).send().await?;
        let wire: WirePostit = serde_json::from_value(result_value(into_json(resp, path).await?))
            .map_err(|e| ClientError::Http { status: 500, message: format!("unparseable link payload: {}", e) })?;
        Ok(wire.into())
    }

    async fn new_folder(&self, path: &str, name: &str) -> ClientResult<FileResource> {
        let body = json!({ "parent": paths::normalize(path), "name": name });
        let resp = self.http.post(format!("{}/folders", self.base)).bearer_auth(&self.token).json(&body).send().await?;
        parse_file(into_json(resp, path).await?, &self.system)
    }

    async fn copy_to(&self, path: &str, dest_path: &str, dest_name: &str) -> ClientResult<FileResource> {
        let body = json!({ "dest_path": paths::normalize(dest_path), "name": dest_name });
        let resp = self.http.post(self.item_url(path, "copy")).bearer_auth(&self.token).json(&body).send().await?;
        parse_file(into_json(resp, path).await?, &self.system)
    }

    async fn move_to(&self, path: &str, dest_path: &str, dest_name: Option<&str>) -> ClientResult<FileResource> {
        let name = dest_name.map(str::to_string).unwrap_or_else(|| paths::file_name(path));
        let body = json!({ "dest_path": paths::normalize(dest_path), "name": name });
        let resp = self.http.post(self.item_url(path, "move")).bearer_auth(&self.token).json(&body).send().await?;
        parse_file(into_json(resp, path).await?, &self.system)
    }

    async fn rename(&self, path: &str, new_name: &str) -> ClientResult<FileResource> {
        let body = json!({ "name": new_name });
        let resp = self.http.put(self.item_url(path, "")).bearer_auth(&self.token).json(&body).send().await?;
        parse_file(into_json(resp, path).await?, &self.system)
    }

    async fn remove(&self, path: &str) -> ClientResult<()> {
        let resp = self.http.delete(self.item_url(path, "")).bearer_auth(&self.token).send().await?;
        into_unit(resp, path).await
    }

    async fn invite(&self, path: &str, login: &str, role: &str) -> ClientResult<()> {
        let body = json!({ "path": paths::normalize(path), "login": login, "role": role });
        let resp = self.http.post(format!("{}/collaborations", self.base)).bearer_auth(&self.token).json(&body).send().await?;
        into_unit(resp, path).await
    }

    async fn search(&self, q: &str, offset: usize, limit: usize) -> ClientResult<Vec<FileResource>> {
        let resp = self
            .http
            .get(format!("{}/search", self.base))
            .bearer_auth(&self.token)
            .query(&[("query", q)])
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;
        parse_files(into_json(resp, q).await?, &self.system)
    }
}

/// HTTP client for the search index service.
pub struct HttpSearchIndex {
    http: reqwest::Client,
    base: String,
}

impl HttpSearchIndex {
    pub fn new(base: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base: base.into() }
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn search_files(&self, username: &str, system: &str, q: &str, offset: usize, limit: usize) -> ClientResult<Vec<FileResource>> {
        let body = json!({
            "username": username,
            "system": system,
            "q": q,
            "offset": offset,
            "limit": limit,
        });
        let resp = self.http.post(format!("{}/files/_search", self.base)).json(&body).send().await?;
        parse_files(into_json(resp, q).await?, system)
    }
}

/// HTTP client for the external task queue.
pub struct HttpTaskQueue {
    http: reqwest::Client,
    base: String,
}

impl HttpTaskQueue {
    pub fn new(base: impl Into<String>) -> Self {
        Self { http: reqwest::Client::new(), base: base.into() }
    }
}

#[async_trait]
impl TaskQueue for HttpTaskQueue {
    async fn submit(&self, channel: &str, task_name: &str, payload: &Value) -> ClientResult<()> {
        let url = format!("{}/channels/{}/tasks", self.base, channel);
        let body = json!({ "task": task_name, "payload": payload });
        let resp = self.http.post(&url).json(&body).send().await?;
        into_unit(resp, task_name).await
    }
}
