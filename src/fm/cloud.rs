//!
//! Consumer cloud adapter
//! ----------------------
//! Normalizes the cloud provider's item-oriented API into the common
//! `FileManager` contract. The provider owns its own namespace (no
//! system-ids), so the configured cloud system label stands in for `system`
//! everywhere, and search goes through the provider's native search rather
//! than the depot index. Collision and reindex policies match the gateway
//! adapter.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;

use crate::clients::{ClientError, CloudStorage};
use crate::error::{AppError, AppResult};
use crate::fm::{DownloadHandle, FileManager, FileResource, PermissionRecord, UploadedFile};
use crate::paths;
use crate::reindex::ReindexNotifier;

pub struct CloudFileManager {
    cloud: Arc<dyn CloudStorage>,
    notifier: ReindexNotifier,
    system: String,
}

impl CloudFileManager {
    pub fn new(cloud: Arc<dyn CloudStorage>, notifier: ReindexNotifier, system: impl Into<String>) -> Self {
        Self { cloud, notifier, system: system.into() }
    }

    fn notify(&self, path: &str, levels: Option<u32>) {
        self.notifier.notify(&ReindexNotifier::file_id(&self.system, path), levels);
    }
}

#[async_trait]
impl FileManager for CloudFileManager {
    fn backend_name(&self) -> &'static str {
        "cloud"
    }

    fn default_system(&self) -> &str {
        &self.system
    }

    async fn listing(&self, _system: &str, path: &str, offset: usize, limit: usize) -> AppResult<Vec<FileResource>> {
        Ok(self.cloud.children(path, offset, limit).await?)
    }

    async fn upload(&self, _system: &str, path: &str, file: &UploadedFile) -> AppResult<FileResource> {
        let created = self.cloud.upload(path, &file.file_name, file.content.clone()).await?;
        self.notify(path, Some(1));
        Ok(created)
    }

    async fn download(&self, _system: &str, path: &str) -> AppResult<DownloadHandle> {
        self.cloud.entry(path).await?;
        Ok(self.cloud.share_link(path).await?)
    }

    async fn mkdir(&self, _system: &str, path: &str, dir_name: &str) -> AppResult<FileResource> {
        let created = self.cloud.new_folder(path, dir_name).await?;
        self.notify(path, None);
        Ok(created)
    }

    async fn copy(&self, _system: &str, path: &str, dest_path: Option<&str>, dest_name: Option<&str>) -> AppResult<FileResource> {
        let src = self.cloud.entry(path).await?;
        let src_dir = paths::parent(path);
        let src_name = src.name;

        let dest_dir = dest_path.map(paths::normalize).unwrap_or_else(|| src_dir.clone());
        let mut name = dest_name.map(str::to_string).unwrap_or_else(|| src_name.clone());

        if dest_dir == src_dir && name == src_name {
            name = paths::copy_name(&name);
            loop {
                match self.cloud.entry(&paths::join(&dest_dir, &name)).await {
                    Ok(_) => name = paths::copy_name(&name),
                    Err(ClientError::NotFound(_)) => break,
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let copied = self.cloud.copy_to(path, &dest_dir, &name).await?;
        self.notify(&paths::join(&dest_dir, &name), None);
        Ok(copied)
    }

    async fn move_to(&self, _system: &str, path: &str, dest_path: &str, dest_name: Option<&str>) -> AppResult<FileResource> {
        let moved = self.cloud.move_to(path, dest_path, dest_name).await?;
        self.notify(&paths::parent(path), Some(1));
        self.notify(&paths::join(dest_path, &moved.name), Some(1));
        Ok(moved)
    }

    async fn rename(&self, _system: &str, path: &str, new_name: &str) -> AppResult<FileResource> {
        let renamed = self.cloud.rename(path, new_name).await?;
        self.notify(&paths::parent(path), Some(1));
        Ok(renamed)
    }

    async fn delete(&self, _system: &str, path: &str) -> AppResult<()> {
        self.cloud.remove(path).await?;
        self.notify(&paths::parent(path), Some(1));
        Ok(())
    }

    async fn trash(&self, _system: &str, path: &str, trash_path: &str) -> AppResult<FileResource> {
        let mut name = paths::file_name(path);

        match self.cloud.entry(&paths::join(trash_path, &name)).await {
            Ok(_) => name = paths::trash_name(&name, Utc::now()),
            Err(ClientError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let moved = self.cloud.move_to(path, trash_path, Some(&name)).await?;
        self.notify(trash_path, Some(1));
        self.notify(&paths::parent(path), Some(1));
        Ok(moved)
    }

    async fn share(&self, _system: &str, path: &str, username: &str, permission: &str) -> AppResult<PermissionRecord> {
        self.cloud.invite(path, username, permission).await?;
        self.notify(path, None);
        Ok(PermissionRecord { username: username.to_string(), permission: permission.to_string(), recursive: false })
    }

    async fn list_permissions(&self, _system: &str, _path: &str) -> AppResult<Vec<PermissionRecord>> {
        // The provider exposes collaborations per invite, not per entry.
        Ok(Vec::new())
    }

    async fn import_data(&self, _system: &str, _path: &str, _from_system: &str, _from_path: &str) -> AppResult<FileResource> {
        Err(AppError::bad_request("unsupported_operation", "import_data is not supported by the cloud backend"))
    }

    async fn search(&self, q: &str, offset: usize, limit: usize) -> AppResult<Vec<FileResource>> {
        Ok(self.cloud.search(q, offset, limit).await?)
    }
}
