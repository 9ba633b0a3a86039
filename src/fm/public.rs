//!
//! Public view adapter
//! -------------------
//! The public/shared storage view is a fixed-system facade over the same
//! gateway: every operation runs against the configured public system-id,
//! whatever system the caller named. Reads dominate; the mutating operations
//! exist for curation flows and inherit the gateway adapter's collision and
//! reindex policies unchanged.

use async_trait::async_trait;
use std::sync::Arc;

use crate::clients::{SearchIndex, StorageGateway};
use crate::error::AppResult;
use crate::fm::gateway::GatewayFileManager;
use crate::fm::{DownloadHandle, FileManager, FileResource, PermissionRecord, UploadedFile};
use crate::reindex::ReindexNotifier;

pub struct PublicFileManager {
    inner: GatewayFileManager,
    system: String,
}

impl PublicFileManager {
    pub fn new(
        gateway: Arc<dyn StorageGateway>,
        index: Arc<dyn SearchIndex>,
        notifier: ReindexNotifier,
        username: impl Into<String>,
        public_system: impl Into<String>,
    ) -> Self {
        let system = public_system.into();
        let inner = GatewayFileManager::new(gateway, index, notifier, username, system.clone());
        Self { inner, system }
    }
}

#[async_trait]
impl FileManager for PublicFileManager {
    fn backend_name(&self) -> &'static str {
        "public"
    }

    fn default_system(&self) -> &str {
        &self.system
    }

    async fn listing(&self, _system: &str, path: &str, offset: usize, limit: usize) -> AppResult<Vec<FileResource>> {
        self.inner.listing(&self.system, path, offset, limit).await
    }

    async fn upload(&self, _system: &str, path: &str, file: &UploadedFile) -> AppResult<FileResource> {
        self.inner.upload(&self.system, path, file).await
    }

    async fn download(&self, _system: &str, path: &str) -> AppResult<DownloadHandle> {
        self.inner.download(&self.system, path).await
    }

    async fn mkdir(&self, _system: &str, path: &str, dir_name: &str) -> AppResult<FileResource> {
        self.inner.mkdir(&self.system, path, dir_name).await
    }

    async fn copy(&self, _system: &str, path: &str, dest_path: Option<&str>, dest_name: Option<&str>) -> AppResult<FileResource> {
        self.inner.copy(&self.system, path, dest_path, dest_name).await
    }

    async fn move_to(&self, _system: &str, path: &str, dest_path: &str, dest_name: Option<&str>) -> AppResult<FileResource> {
        self.inner.move_to(&self.system, path, dest_path, dest_name).await
    }

    async fn rename(&self, _system: &str, path: &str, new_name: &str) -> AppResult<FileResource> {
        self.inner.rename(&self.system, path, new_name).await
    }

    async fn delete(&self, _system: &str, path: &str) -> AppResult<()> {
        self.inner.delete(&self.system, path).await
    }

    async fn trash(&self, _system: &str, path: &str, trash_path: &str) -> AppResult<FileResource> {
        self.inner.trash(&self.system, path, trash_path).await
    }

    async fn share(&self, _system: &str, path: &str, username: &str, permission: &str) -> AppResult<PermissionRecord> {
        self.inner.share(&self.system, path, username, permission).await
    }

    async fn list_permissions(&self, _system: &str, path: &str) -> AppResult<Vec<PermissionRecord>> {
        self.inner.list_permissions(&self.system, path).await
    }

    async fn import_data(&self, _system: &str, path: &str, from_system: &str, from_path: &str) -> AppResult<FileResource> {
        self.inner.import_data(&self.system, path, from_system, from_path).await
    }

    async fn search(&self, q: &str, offset: usize, limit: usize) -> AppResult<Vec<FileResource>> {
        self.inner.search(q, offset, limit).await
    }
}
