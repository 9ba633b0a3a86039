//! Dispatcher tests: adapter selection by resource discriminator, operation
//! extraction from the request body, parameter merging, and the serialized
//! response shape.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{drain_jobs, MockCloud, MockGateway, MockIndex};
use depot::config::Settings;
use depot::fm::{FileOp, OpParams, Resource, UploadedFile};
use depot::reindex::ReindexNotifier;
use depot::server::{execute_operation, file_manager_for, merge_route_params, parse_body_lenient, AppState};
use serde_json::json;
use tokio::sync::RwLock;

fn settings() -> Settings {
    Settings {
        http_port: 0,
        users_file: "users.json".into(),
        gateway_url: "http://gateway.test".into(),
        gateway_token: String::new(),
        cloud_url: "http://cloud.test".into(),
        cloud_token: String::new(),
        index_url: "http://index.test".into(),
        queue_url: "http://queue.test".into(),
        reindex_user: "depot_admin".into(),
        default_system: "depot.storage.default".into(),
        public_system: "depot.storage.published".into(),
        cloud_system: "cloud".into(),
    }
}

fn state_with(
    gateway: Arc<MockGateway>,
    cloud: Arc<MockCloud>,
) -> (AppState, tokio::sync::mpsc::Receiver<depot::reindex::ReindexJob>) {
    let (notifier, rx) = ReindexNotifier::channel("depot_admin", 32);
    let state = AppState {
        settings: Arc::new(settings()),
        gateway,
        cloud,
        index: Arc::new(MockIndex::default()),
        notifier,
        sessions: Arc::new(RwLock::new(HashMap::new())),
    };
    (state, rx)
}

#[test]
fn unknown_resource_fails_before_any_adapter_exists() {
    let err = Resource::from_route("ftp").unwrap_err();
    assert_eq!(err.code_str(), "unknown_resource");
    assert_eq!(err.http_status(), 400);
}

#[test]
fn each_discriminator_selects_its_adapter() {
    let gw = Arc::new(MockGateway::default());
    let cloud = Arc::new(MockCloud::with_entries("cloud", &[]));
    let (state, _rx) = state_with(gw, cloud);

    assert_eq!(file_manager_for(&state, Resource::Default, "maria").backend_name(), "gateway");
    assert_eq!(file_manager_for(&state, Resource::Public, "maria").backend_name(), "public");
    assert_eq!(file_manager_for(&state, Resource::Cloud, "maria").backend_name(), "cloud");
}

#[test]
fn public_adapter_is_pinned_to_the_public_system() {
    let gw = Arc::new(MockGateway::default());
    let cloud = Arc::new(MockCloud::with_entries("cloud", &[]));
    let (state, _rx) = state_with(gw, cloud);

    let fm = file_manager_for(&state, Resource::Public, "maria");
    assert_eq!(fm.default_system(), "depot.storage.published");
}

#[test]
fn recovered_empty_body_surfaces_as_unknown_operation() {
    // malformed JSON degrades to an empty parameter set...
    let body = parse_body_lenient(b"{not json");
    assert_eq!(body, json!({}));
    // ...and the missing action then takes the unknown-operation error path
    let err = body
        .get("action")
        .and_then(|v| v.as_str())
        .map(FileOp::from_name)
        .unwrap_or_else(|| Err(depot::error::AppError::unknown_operation("<missing action>")))
        .unwrap_err();
    assert_eq!(err.code_str(), "unknown_operation");
}

#[tokio::test]
async fn copy_dispatch_returns_the_normalized_result_shape() {
    let gw = Arc::new(MockGateway::with_entries("depot.storage.default", &["/a/b/report.pdf"]));
    let cloud = Arc::new(MockCloud::with_entries("cloud", &[]));
    let (state, mut rx) = state_with(gw, cloud);

    let params = OpParams::from_body(&json!({"path": "/a/b/report.pdf"}));
    let resp = execute_operation(&state, Resource::Default, "maria", FileOp::Copy, params, Vec::new())
        .await
        .unwrap();

    let value = resp.0;
    assert_eq!(value["status"], "ok");
    assert_eq!(value["results"]["name"], "report_copy.pdf");
    assert_eq!(drain_jobs(&mut rx).len(), 1);
}

#[tokio::test]
async fn delete_dispatch_acknowledges_the_deleted_path() {
    let gw = Arc::new(MockGateway::with_entries("depot.storage.default", &["/a/b/old.txt"]));
    let cloud = Arc::new(MockCloud::with_entries("cloud", &[]));
    let (state, mut rx) = state_with(gw, cloud);

    let params = merge_route_params(OpParams::default(), Some("a/b/old.txt".to_string()));
    let resp = execute_operation(&state, Resource::Default, "maria", FileOp::Delete, params, Vec::new())
        .await
        .unwrap();

    let value = resp.0;
    assert_eq!(value["status"], "ok");
    assert_eq!(value["results"]["deleted"], true);
    assert_eq!(value["results"]["path"], "a/b/old.txt");
    assert_eq!(drain_jobs(&mut rx).len(), 1);
}

#[tokio::test]
async fn mkdir_without_dir_name_is_a_client_error() {
    let gw = Arc::new(MockGateway::default());
    let cloud = Arc::new(MockCloud::with_entries("cloud", &[]));
    let (state, _rx) = state_with(gw.clone(), cloud);

    let params = OpParams::from_body(&json!({"path": "/a"}));
    let err = execute_operation(&state, Resource::Default, "maria", FileOp::Mkdir, params, Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "missing_param");
    assert!(gw.recorded_calls().is_empty());
}

#[tokio::test]
async fn upload_without_file_parts_is_a_client_error() {
    let gw = Arc::new(MockGateway::default());
    let cloud = Arc::new(MockCloud::with_entries("cloud", &[]));
    let (state, _rx) = state_with(gw, cloud);

    let params = OpParams::from_body(&json!({"path": "/a"}));
    let err = execute_operation(&state, Resource::Default, "maria", FileOp::Upload, params, Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "missing_file");
}

#[tokio::test]
async fn upload_dispatch_sends_every_file_part() {
    let gw = Arc::new(MockGateway::with_entries("depot.storage.default", &["/a"]));
    let cloud = Arc::new(MockCloud::with_entries("cloud", &[]));
    let (state, mut rx) = state_with(gw.clone(), cloud);

    let files = vec![
        UploadedFile { file_name: "one.txt".into(), content: b"1".to_vec() },
        UploadedFile { file_name: "two.txt".into(), content: b"2".to_vec() },
    ];
    let params = OpParams::from_body(&json!({"path": "/a"}));
    let resp = execute_operation(&state, Resource::Default, "maria", FileOp::Upload, params, files)
        .await
        .unwrap();

    let value = resp.0;
    assert_eq!(value["results"].as_array().unwrap().len(), 2);
    assert_eq!(gw.recorded_calls().len(), 2);
    assert_eq!(drain_jobs(&mut rx).len(), 2);
}

#[tokio::test]
async fn body_system_overrides_the_adapter_default() {
    let gw = Arc::new(MockGateway::with_entries("project-123", &["/shared/file.txt"]));
    let cloud = Arc::new(MockCloud::with_entries("cloud", &[]));
    let (state, _rx) = state_with(gw, cloud);

    let params = OpParams::from_body(&json!({"system": "project-123", "path": "/shared/file.txt"}));
    let resp = execute_operation(&state, Resource::Default, "maria", FileOp::Listing, params, Vec::new())
        .await
        .unwrap();
    assert_eq!(resp.0["status"], "ok");
}

#[tokio::test]
async fn cloud_import_is_a_typed_unsupported_error() {
    let gw = Arc::new(MockGateway::default());
    let cloud = Arc::new(MockCloud::with_entries("cloud", &["/docs"]));
    let (state, mut rx) = state_with(gw, cloud);

    let params = OpParams::from_body(&json!({
        "path": "/docs",
        "from_system": "depot.storage.default",
        "from_path": "/a/data.csv"
    }));
    let err = execute_operation(&state, Resource::Cloud, "maria", FileOp::ImportData, params, Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.code_str(), "unsupported_operation");
    assert!(drain_jobs(&mut rx).is_empty());
}

#[tokio::test]
async fn cloud_trash_applies_the_common_collision_policy() {
    let gw = Arc::new(MockGateway::default());
    let cloud = Arc::new(MockCloud::with_entries("cloud", &["/docs/note.txt", "/trash/note.txt"]));
    let (state, mut rx) = state_with(gw, cloud);

    let params = OpParams::from_body(&json!({"path": "/docs/note.txt", "trash_path": "/trash"}));
    let resp = execute_operation(&state, Resource::Cloud, "maria", FileOp::Trash, params, Vec::new())
        .await
        .unwrap();

    let name = resp.0["results"]["name"].as_str().unwrap().to_string();
    let pattern = regex::Regex::new(r"^note \d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.txt$").unwrap();
    assert!(pattern.is_match(&name), "unexpected trash name: {}", name);

    let jobs = drain_jobs(&mut rx);
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].file_id, "cloud/trash");
    assert_eq!(jobs[1].file_id, "cloud/docs");
}
