//! In-memory mock collaborators shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use depot::clients::{ClientError, ClientResult, CloudStorage, SearchIndex, StorageGateway};
use depot::fm::{DownloadHandle, FileKind, FileResource, PermissionRecord};
use depot::paths;
use depot::reindex::ReindexJob;
use tokio::sync::mpsc::Receiver;

pub fn resource(system: &str, path: &str, kind: FileKind) -> FileResource {
    let norm = paths::normalize(path);
    FileResource {
        name: paths::file_name(&norm),
        path: norm,
        system: system.to_string(),
        kind,
        length: 0,
        last_modified: Some(Utc::now()),
        permissions: "ALL".to_string(),
    }
}

/// Drain every job currently queued on the notifier's receiving end.
pub fn drain_jobs(rx: &mut Receiver<ReindexJob>) -> Vec<ReindexJob> {
    let mut jobs = Vec::new();
    while let Ok(job) = rx.try_recv() {
        jobs.push(job);
    }
    jobs
}

/// Gateway mock over an in-memory (system, path) set, recording every
/// mutating call in order.
#[derive(Default)]
pub struct MockGateway {
    pub entries: Mutex<BTreeSet<(String, String)>>,
    /// Forced stat failures: normalized path -> HTTP status.
    pub stat_errors: Mutex<HashMap<String, u16>>,
    /// When set, every mutating call fails with a 500.
    pub fail_mutations: Mutex<bool>,
    pub calls: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn with_entries(system: &str, entry_paths: &[&str]) -> Self {
        let mock = Self::default();
        {
            let mut entries = mock.entries.lock().unwrap();
            for p in entry_paths {
                entries.insert((system.to_string(), paths::normalize(p)));
            }
        }
        mock
    }

    pub fn force_stat_error(&self, path: &str, status: u16) {
        self.stat_errors.lock().unwrap().insert(paths::normalize(path), status);
    }

    pub fn fail_mutations(&self) {
        *self.fail_mutations.lock().unwrap() = true;
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_mutation(&self, what: &str) -> ClientResult<()> {
        if *self.fail_mutations.lock().unwrap() {
            return Err(ClientError::Http { status: 500, message: format!("{} failed", what) });
        }
        Ok(())
    }
}

#[async_trait]
impl StorageGateway for MockGateway {
    async fn stat(&self, system: &str, path: &str) -> ClientResult<FileResource> {
        let norm = paths::normalize(path);
        if let Some(status) = self.stat_errors.lock().unwrap().get(&norm) {
            return Err(ClientError::Http { status: *status, message: "forced stat failure".into() });
        }
        let entries = self.entries.lock().unwrap();
        if entries.contains(&(system.to_string(), norm.clone())) {
            Ok(resource(system, &norm, FileKind::File))
        } else {
            Err(ClientError::NotFound(norm))
        }
    }

    async fn listing(&self, system: &str, path: &str, offset: usize, limit: usize) -> ClientResult<Vec<FileResource>> {
        let prefix = paths::normalize(path);
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|(s, p)| s == system && (prefix == paths::ROOT || p.starts_with(&format!("{}/", prefix))))
            .skip(offset)
            .take(limit)
            .map(|(s, p)| resource(s, p, FileKind::File))
            .collect())
    }

    async fn upload(&self, system: &str, path: &str, file_name: &str, _content: Vec<u8>) -> ClientResult<FileResource> {
        self.check_mutation("upload")?;
        let target = paths::join(path, file_name);
        self.record(format!("upload {} {}", system, target));
        self.entries.lock().unwrap().insert((system.to_string(), target.clone()));
        Ok(resource(system, &target, FileKind::File))
    }

    async fn download_postit(&self, system: &str, path: &str) -> ClientResult<DownloadHandle> {
        Ok(DownloadHandle {
            url: format!("https://gateway.test/postits/{}/{}", system, paths::normalize(path)),
            method: "GET".to_string(),
            expires: None,
        })
    }

    async fn mkdir(&self, system: &str, path: &str, dir_name: &str) -> ClientResult<FileResource> {
        self.check_mutation("mkdir")?;
        let target = paths::join(path, dir_name);
        self.record(format!("mkdir {} {}", system, target));
        self.entries.lock().unwrap().insert((system.to_string(), target.clone()));
        Ok(resource(system, &target, FileKind::Dir))
    }

    async fn copy(&self, system: &str, path: &str, dest_path: &str, dest_name: &str) -> ClientResult<FileResource> {
        self.check_mutation("copy")?;
        let target = paths::join(dest_path, dest_name);
        self.record(format!("copy {} {} -> {}", system, paths::normalize(path), target));
        self.entries.lock().unwrap().insert((system.to_string(), target.clone()));
        Ok(resource(system, &target, FileKind::File))
    }

    async fn move_to(&self, system: &str, path: &str, dest_path: &str, dest_name: Option<&str>) -> ClientResult<FileResource> {
        self.check_mutation("move")?;
        let name = dest_name.map(str::to_string).unwrap_or_else(|| paths::file_name(path));
        let target = paths::join(dest_path, &name);
        self.record(format!("move {} {} -> {}", system, paths::normalize(path), target));
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&(system.to_string(), paths::normalize(path)));
        entries.insert((system.to_string(), target.clone()));
        Ok(resource(system, &target, FileKind::File))
    }

    async fn rename(&self, system: &str, path: &str, new_name: &str) -> ClientResult<FileResource> {
        self.check_mutation("rename")?;
        let target = paths::join(&paths::parent(path), new_name);
        self.record(format!("rename {} {} -> {}", system, paths::normalize(path), target));
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&(system.to_string(), paths::normalize(path)));
        entries.insert((system.to_string(), target.clone()));
        Ok(resource(system, &target, FileKind::File))
    }

    async fn delete(&self, system: &str, path: &str) -> ClientResult<()> {
        self.check_mutation("delete")?;
        self.record(format!("delete {} {}", system, paths::normalize(path)));
        self.entries.lock().unwrap().remove(&(system.to_string(), paths::normalize(path)));
        Ok(())
    }

    async fn list_permissions(&self, _system: &str, _path: &str) -> ClientResult<Vec<PermissionRecord>> {
        Ok(vec![PermissionRecord { username: "owner".into(), permission: "ALL".into(), recursive: true }])
    }

    async fn update_permission(&self, system: &str, path: &str, username: &str, permission: &str, recursive: bool) -> ClientResult<()> {
        self.check_mutation("share")?;
        self.record(format!("share {} {} {}={} recursive={}", system, paths::normalize(path), username, permission, recursive));
        Ok(())
    }

    async fn import_data(&self, system: &str, path: &str, from_system: &str, from_path: &str) -> ClientResult<FileResource> {
        self.check_mutation("import")?;
        let target = paths::join(path, &paths::file_name(from_path));
        self.record(format!("import {}:{} -> {} {}", from_system, paths::normalize(from_path), system, target));
        self.entries.lock().unwrap().insert((system.to_string(), target.clone()));
        Ok(resource(system, &target, FileKind::File))
    }
}

/// Cloud mock mirroring the gateway mock, namespace pinned to one system
/// label.
#[derive(Default)]
pub struct MockCloud {
    pub system: String,
    pub entries: Mutex<BTreeSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl MockCloud {
    pub fn with_entries(system: &str, entry_paths: &[&str]) -> Self {
        let mock = MockCloud { system: system.to_string(), ..Default::default() };
        {
            let mut entries = mock.entries.lock().unwrap();
            for p in entry_paths {
                entries.insert(paths::normalize(p));
            }
        }
        mock
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CloudStorage for MockCloud {
    async fn entry(&self, path: &str) -> ClientResult<FileResource> {
        let norm = paths::normalize(path);
        if self.entries.lock().unwrap().contains(&norm) {
            Ok(resource(&self.system, &norm, FileKind::File))
        } else {
            Err(ClientError::NotFound(norm))
        }
    }

    async fn children(&self, path: &str, offset: usize, limit: usize) -> ClientResult<Vec<FileResource>> {
        let prefix = paths::normalize(path);
        let entries = self.entries.lock().unwrap();
        Ok(entries
            .iter()
            .filter(|p| prefix == paths::ROOT || p.starts_with(&format!("{}/", prefix)))
            .skip(offset)
            .take(limit)
            .map(|p| resource(&self.system, p, FileKind::File))
            .collect())
    }

    async fn upload(&self, path: &str, file_name: &str, _content: Vec<u8>) -> ClientResult<FileResource> {
        let target = paths::join(path, file_name);
        self.record(format!("upload {}", target));
        self.entries.lock().unwrap().insert(target.clone());
        Ok(resource(&self.system, &target, FileKind::File))
    }

    async fn share_link(&self, path: &str) -> ClientResult<DownloadHandle> {
        Ok(DownloadHandle {
            url: format!("https://cloud.test/links/{}", paths::normalize(path)),
            method: "GET".to_string(),
            expires: None,
        })
    }

    async fn new_folder(&self, path: &str, name: &str) -> ClientResult<FileResource> {
        let target = paths::join(path, name);
        self.record(format!("new_folder {}", target));
        self.entries.lock().unwrap().insert(target.clone());
        Ok(resource(&self.system, &target, FileKind::Dir))
    }

    async fn copy_to(&self, path: &str, dest_path: &str, dest_name: &str) -> ClientResult<FileResource> {
        let target = paths::join(dest_path, dest_name);
        self.record(format!("copy {} -> {}", paths::normalize(path), target));
        self.entries.lock().unwrap().insert(target.clone());
        Ok(resource(&self.system, &target, FileKind::File))
    }

    async fn move_to(&self, path: &str, dest_path: &str, dest_name: Option<&str>) -> ClientResult<FileResource> {
        let name = dest_name.map(str::to_string).unwrap_or_else(|| paths::file_name(path));
        let target = paths::join(dest_path, &name);
        self.record(format!("move {} -> {}", paths::normalize(path), target));
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&paths::normalize(path));
        entries.insert(target.clone());
        Ok(resource(&self.system, &target, FileKind::File))
    }

    async fn rename(&self, path: &str, new_name: &str) -> ClientResult<FileResource> {
        let target = paths::join(&paths::parent(path), new_name);
        self.record(format!("rename {} -> {}", paths::normalize(path), target));
        let mut entries = self.entries.lock().unwrap();
        entries.remove(&paths::normalize(path));
        entries.insert(target.clone());
        Ok(resource(&self.system, &target, FileKind::File))
    }

    async fn remove(&self, path: &str) -> ClientResult<()> {
        self.record(format!("remove {}", paths::normalize(path)));
        self.entries.lock().unwrap().remove(&paths::normalize(path));
        Ok(())
    }

    async fn invite(&self, path: &str, login: &str, role: &str) -> ClientResult<()> {
        self.record(format!("invite {} {}={}", paths::normalize(path), login, role));
        Ok(())
    }

    async fn search(&self, q: &str, _offset: usize, _limit: usize) -> ClientResult<Vec<FileResource>> {
        let entries = self.entries.lock().unwrap();
        Ok(entries.iter().filter(|p| p.contains(q)).map(|p| resource(&self.system, p, FileKind::File)).collect())
    }
}

/// Search-index mock recording the query it was handed.
#[derive(Default)]
pub struct MockIndex {
    pub queries: Mutex<Vec<(String, String, String)>>,
    pub results: Mutex<Vec<FileResource>>,
}

impl MockIndex {
    pub fn with_results(results: Vec<FileResource>) -> Self {
        let mock = Self::default();
        *mock.results.lock().unwrap() = results;
        mock
    }
}

#[async_trait]
impl SearchIndex for MockIndex {
    async fn search_files(&self, username: &str, system: &str, q: &str, offset: usize, limit: usize) -> ClientResult<Vec<FileResource>> {
        self.queries.lock().unwrap().push((username.to_string(), system.to_string(), q.to_string()));
        Ok(self.results.lock().unwrap().iter().skip(offset).take(limit).cloned().collect())
    }
}
