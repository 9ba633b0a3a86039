//!
//! Primary storage gateway adapter
//! -------------------------------
//! Reference implementation of the `FileManager` contract against the remote
//! HPC storage gateway. The collision-avoidance and reindex policies here are
//! the binding ones: every other adapter mirrors them.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use crate::clients::{ClientError, SearchIndex, StorageGateway};
use crate::error::AppResult;
use crate::fm::{DownloadHandle, FileManager, FileResource, PermissionRecord, UploadedFile};
use crate::paths;
use crate::reindex::ReindexNotifier;

pub struct GatewayFileManager {
    gateway: Arc<dyn StorageGateway>,
    index: Arc<dyn SearchIndex>,
    notifier: ReindexNotifier,
    username: String,
    system: String,
}

impl GatewayFileManager {
    pub fn new(
        gateway: Arc<dyn StorageGateway>,
        index: Arc<dyn SearchIndex>,
        notifier: ReindexNotifier,
        username: impl Into<String>,
        system: impl Into<String>,
    ) -> Self {
        Self { gateway, index, notifier, username: username.into(), system: system.into() }
    }

    /// Physical mount root for a system-id, when one exists. `None` means
    /// the backend-native path is the path.
    pub fn base_mounted_path(&self, system_id: &str) -> Option<&'static str> {
        crate::config::base_mounted_path(system_id)
    }

    fn notify(&self, system: &str, path: &str, levels: Option<u32>) {
        self.notifier.notify(&ReindexNotifier::file_id(system, path), levels);
    }
}

#[async_trait]
impl FileManager for GatewayFileManager {
    fn backend_name(&self) -> &'static str {
        "gateway"
    }

    fn default_system(&self) -> &str {
        &self.system
    }

    async fn listing(&self, system: &str, path: &str, offset: usize, limit: usize) -> AppResult<Vec<FileResource>> {
        debug!(system = %system, path = %path, mount = ?self.base_mounted_path(system), "gateway listing");
        Ok(self.gateway.listing(system, path, offset, limit).await?)
    }

    async fn upload(&self, system: &str, path: &str, file: &UploadedFile) -> AppResult<FileResource> {
        let created = self.gateway.upload(system, path, &file.file_name, file.content.clone()).await?;
        self.notify(system, path, Some(1));
        Ok(created)
    }

    async fn download(&self, system: &str, path: &str) -> AppResult<DownloadHandle> {
        // Stat first so a missing entry reports 404 instead of a broken link.
        self.gateway.stat(system, path).await?;
        Ok(self.gateway.download_postit(system, path).await?)
    }

    async fn mkdir(&self, system: &str, path: &str, dir_name: &str) -> AppResult<FileResource> {
        let created = self.gateway.mkdir(system, path, dir_name).await?;
        self.notify(system, path, None);
        Ok(created)
    }

    async fn copy(&self, system: &str, path: &str, dest_path: Option<&str>, dest_name: Option<&str>) -> AppResult<FileResource> {
        let src = self.gateway.stat(system, path).await?;
        let src_dir = paths::parent(path);
        let src_name = src.name;

        // default to same path and name
        let dest_dir = dest_path.map(paths::normalize).unwrap_or_else(|| src_dir.clone());
        let mut name = dest_name.map(str::to_string).unwrap_or_else(|| src_name.clone());

        // A copy landing on its own source gets the `_copy` suffix, re-probed
        // so a repeated copy never overwrites an earlier one. No numeric
        // suffixes: the suffix just stacks.
        if dest_dir == src_dir && name == src_name {
            name = paths::copy_name(&name);
            loop {
                match self.gateway.stat(system, &paths::join(&dest_dir, &name)).await {
                    Ok(_) => name = paths::copy_name(&name),
                    Err(ClientError::NotFound(_)) => break,
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let copied = self.gateway.copy(system, path, &dest_dir, &name).await?;
        self.notify(system, &paths::join(&dest_dir, &name), None);
        Ok(copied)
    }

    async fn move_to(&self, system: &str, path: &str, dest_path: &str, dest_name: Option<&str>) -> AppResult<FileResource> {
        self.gateway.stat(system, path).await?;
        let moved = self.gateway.move_to(system, path, dest_path, dest_name).await?;
        self.notify(system, &paths::parent(path), Some(1));
        self.notify(system, &paths::join(dest_path, &moved.name), Some(1));
        Ok(moved)
    }

    async fn rename(&self, system: &str, path: &str, new_name: &str) -> AppResult<FileResource> {
        self.gateway.stat(system, path).await?;
        let renamed = self.gateway.rename(system, path, new_name).await?;
        self.notify(system, &paths::parent(path), Some(1));
        Ok(renamed)
    }

    async fn delete(&self, system: &str, path: &str) -> AppResult<()> {
        self.gateway.delete(system, path).await?;
        self.notify(system, &paths::parent(path), Some(1));
        Ok(())
    }

    async fn trash(&self, system: &str, path: &str, trash_path: &str) -> AppResult<FileResource> {
        let mut name = paths::file_name(path);

        // first ensure the trash location exists
        self.gateway.ensure_path(system, trash_path).await?;

        // check for an entry of the same name in the trash; a 404 is the
        // expected (benign) outcome, anything else propagates
        match self.gateway.stat(system, &paths::join(trash_path, &name)).await {
            Ok(_) => name = paths::trash_name(&name, Utc::now()),
            Err(ClientError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let moved = self.gateway.move_to(system, path, trash_path, Some(&name)).await?;
        self.notify(system, trash_path, Some(1));
        self.notify(system, &paths::parent(path), Some(1));
        Ok(moved)
    }

    async fn share(&self, system: &str, path: &str, username: &str, permission: &str) -> AppResult<PermissionRecord> {
        let recursive = true;
        self.gateway.update_permission(system, path, username, permission, recursive).await?;
        self.notify(system, path, None);
        Ok(PermissionRecord { username: username.to_string(), permission: permission.to_string(), recursive })
    }

    async fn list_permissions(&self, system: &str, path: &str) -> AppResult<Vec<PermissionRecord>> {
        Ok(self.gateway.list_permissions(system, path).await?)
    }

    async fn import_data(&self, system: &str, path: &str, from_system: &str, from_path: &str) -> AppResult<FileResource> {
        // destination must exist before the backend starts the import
        self.gateway.stat(system, path).await?;
        let imported = self.gateway.import_data(system, path, from_system, from_path).await?;
        let imported_name = paths::file_name(from_path);
        self.notify(system, &paths::join(path, &imported_name), None);
        Ok(imported)
    }

    async fn search(&self, q: &str, offset: usize, limit: usize) -> AppResult<Vec<FileResource>> {
        Ok(self.index.search_files(&self.username, &self.system, q, offset, limit).await?)
    }
}
