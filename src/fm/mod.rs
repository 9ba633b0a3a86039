//!
//! depot file-manager abstraction layer
//! ------------------------------------
//! One polymorphic `FileManager` contract implemented by a backend-specific
//! adapter per storage provider:
//! - `gateway`: the primary remote HPC storage gateway (reference adapter),
//! - `public`: the public/shared storage view,
//! - `cloud`: the consumer cloud provider.
//!
//! Adapters normalize each provider's native semantics (paths, permissions,
//! trash conventions, search) behind this one operation set. HTTP handlers
//! consume adapters uniformly via `Box<dyn FileManager>` and never see a
//! provider's wire format.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub mod cloud;
pub mod gateway;
pub mod public;

/// A remote file or directory entry: an immutable snapshot of backend
/// metadata at fetch time, unique per (system, path) within one backend's
/// namespace. Never persisted locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResource {
    pub name: String,
    pub path: String,
    pub system: String,
    #[serde(rename = "type")]
    pub kind: FileKind,
    #[serde(default)]
    pub length: u64,
    #[serde(rename = "lastModified")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permissions: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Dir,
}

/// Time-limited pre-authenticated retrieval handle returned by the download
/// operation instead of raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadHandle {
    pub url: String,
    pub method: String,
    pub expires: Option<DateTime<Utc>>,
}

/// One permission entry attached to a FileResource; owned by the backend and
/// mirrored transiently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionRecord {
    pub username: String,
    pub permission: String,
    pub recursive: bool,
}

/// One file extracted from a multipart request body.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Closed set of backend discriminators carried in the `resource` route
/// segment. Adding a backend means adding a variant here and an arm in the
/// dispatcher's adapter table, keeping the supported set exhaustively
/// checkable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Default,
    Public,
    Cloud,
}

impl Resource {
    pub fn from_route(name: &str) -> AppResult<Self> {
        match name {
            "default" => Ok(Resource::Default),
            "public" => Ok(Resource::Public),
            "cloud" => Ok(Resource::Cloud),
            other => Err(AppError::unknown_resource(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Default => "default",
            Resource::Public => "public",
            Resource::Cloud => "cloud",
        }
    }
}

/// Closed set of operation names accepted in the `action` body key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOp {
    Listing,
    Upload,
    Download,
    Mkdir,
    Copy,
    Move,
    Rename,
    Delete,
    Trash,
    Share,
    ImportData,
    Search,
}

impl FileOp {
    pub fn from_name(name: &str) -> AppResult<Self> {
        match name {
            "listing" => Ok(FileOp::Listing),
            "upload" => Ok(FileOp::Upload),
            "download" => Ok(FileOp::Download),
            "mkdir" => Ok(FileOp::Mkdir),
            "copy" => Ok(FileOp::Copy),
            "move" => Ok(FileOp::Move),
            "rename" => Ok(FileOp::Rename),
            "delete" => Ok(FileOp::Delete),
            "trash" => Ok(FileOp::Trash),
            "share" => Ok(FileOp::Share),
            "import_data" => Ok(FileOp::ImportData),
            "search" => Ok(FileOp::Search),
            other => Err(AppError::unknown_operation(other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileOp::Listing => "listing",
            FileOp::Upload => "upload",
            FileOp::Download => "download",
            FileOp::Mkdir => "mkdir",
            FileOp::Copy => "copy",
            FileOp::Move => "move",
            FileOp::Rename => "rename",
            FileOp::Delete => "delete",
            FileOp::Trash => "trash",
            FileOp::Share => "share",
            FileOp::ImportData => "import_data",
            FileOp::Search => "search",
        }
    }
}

/// Parameter bag assembled by the dispatcher from the JSON body, with route
/// parameters merged over it afterwards. Unknown body keys are ignored and
/// fields of the wrong shape degrade to absent rather than failing the
/// request.
#[derive(Debug, Clone, Default)]
pub struct OpParams {
    pub system: Option<String>,
    pub path: Option<String>,
    pub dest_path: Option<String>,
    pub dest_name: Option<String>,
    pub new_name: Option<String>,
    pub dir_name: Option<String>,
    pub trash_path: Option<String>,
    pub username: Option<String>,
    pub permission: Option<String>,
    pub from_system: Option<String>,
    pub from_path: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub q: Option<String>,
}

fn str_field(v: &serde_json::Value, key: &str) -> Option<String> {
    v.get(key).and_then(|x| x.as_str()).map(str::to_string)
}

fn num_field(v: &serde_json::Value, key: &str) -> Option<usize> {
    v.get(key).and_then(|x| {
        x.as_u64()
            .map(|n| n as usize)
            .or_else(|| x.as_str().and_then(|s| s.parse().ok()))
    })
}

impl OpParams {
    /// Build from a parsed body value, field by field.
    pub fn from_body(value: &serde_json::Value) -> Self {
        OpParams {
            system: str_field(value, "system"),
            path: str_field(value, "path"),
            dest_path: str_field(value, "dest_path"),
            dest_name: str_field(value, "dest_name"),
            new_name: str_field(value, "new_name"),
            dir_name: str_field(value, "dir_name"),
            trash_path: str_field(value, "trash_path"),
            username: str_field(value, "username"),
            permission: str_field(value, "permission"),
            from_system: str_field(value, "from_system"),
            from_path: str_field(value, "from_path"),
            offset: num_field(value, "offset"),
            limit: num_field(value, "limit"),
            q: str_field(value, "q"),
        }
    }
}

/// Common operation contract implemented by every backend adapter.
///
/// All paths are logical (backend-relative); adapters normalize them before
/// any backend call. Every mutating operation enqueues its reindex job(s)
/// only after the underlying mutation succeeds, and never lets a reindex
/// handoff failure surface as an operation failure.
#[async_trait]
pub trait FileManager: Send + Sync {
    /// Stable adapter identifier used in logs and dispatch checks.
    fn backend_name(&self) -> &'static str;

    /// System-id used when a request does not name one.
    fn default_system(&self) -> &str;

    async fn listing(&self, system: &str, path: &str, offset: usize, limit: usize) -> AppResult<Vec<FileResource>>;

    async fn upload(&self, system: &str, path: &str, file: &UploadedFile) -> AppResult<FileResource>;

    async fn download(&self, system: &str, path: &str) -> AppResult<DownloadHandle>;

    async fn mkdir(&self, system: &str, path: &str, dir_name: &str) -> AppResult<FileResource>;

    async fn copy(&self, system: &str, path: &str, dest_path: Option<&str>, dest_name: Option<&str>) -> AppResult<FileResource>;

    async fn move_to(&self, system: &str, path: &str, dest_path: &str, dest_name: Option<&str>) -> AppResult<FileResource>;

    async fn rename(&self, system: &str, path: &str, new_name: &str) -> AppResult<FileResource>;

    async fn delete(&self, system: &str, path: &str) -> AppResult<()>;

    async fn trash(&self, system: &str, path: &str, trash_path: &str) -> AppResult<FileResource>;

    async fn share(&self, system: &str, path: &str, username: &str, permission: &str) -> AppResult<PermissionRecord>;

    async fn list_permissions(&self, system: &str, path: &str) -> AppResult<Vec<PermissionRecord>>;

    async fn import_data(&self, system: &str, path: &str, from_system: &str, from_path: &str) -> AppResult<FileResource>;

    async fn search(&self, q: &str, offset: usize, limit: usize) -> AppResult<Vec<FileResource>>;
}
