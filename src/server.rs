//!
//! depot HTTP server and dispatcher
//! --------------------------------
//! Axum-based HTTP API for the unified file manager.
//!
//! Responsibilities:
//! - Session management with a simple cookie model backed by the local user
//!   file (login/logout endpoints).
//! - Dispatch: the `resource` route segment selects exactly one backend
//!   adapter per request, bound to the authenticated username.
//! - Request normalization: lenient JSON body parsing, multipart file
//!   extraction, route parameters merged over body parameters.
//! - Serialization of every adapter result to the normalized
//!   `{"status":"ok","results":...}` response shape.

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::extract::{FromRequest, Multipart, Path, Query, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::clients::{
    CloudStorage, HttpCloudStorage, HttpSearchIndex, HttpStorageGateway, HttpTaskQueue, SearchIndex, StorageGateway,
};
use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::fm::{cloud::CloudFileManager, gateway::GatewayFileManager, public::PublicFileManager};
use crate::fm::{FileManager, FileOp, OpParams, Resource, UploadedFile};
use crate::reindex::ReindexNotifier;
use crate::security;

const SESSION_COOKIE: &str = "depot_session";

/// Outbound reindex channel depth; jobs beyond this are dropped with a warn.
const REINDEX_QUEUE_CAPACITY: usize = 1024;

const DEFAULT_LISTING_LIMIT: usize = 100;

/// Shared server state injected into all handlers.
///
/// Holds the collaborator clients (trait objects, so tests can substitute
/// mocks), the reindex notifier handle and the session map. Adapters are NOT
/// held here: one adapter is constructed per request, bound to the request's
/// authenticated username, and dropped with the response.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub gateway: Arc<dyn StorageGateway>,
    pub cloud: Arc<dyn CloudStorage>,
    pub index: Arc<dyn SearchIndex>,
    pub notifier: ReindexNotifier,
    /// Session id -> username mapping
    pub sessions: Arc<RwLock<HashMap<String, String>>>,
}

/// Adapter lookup table: one arm per `Resource` variant, so a new backend
/// cannot be added without the compiler pointing here.
pub fn file_manager_for(state: &AppState, resource: Resource, username: &str) -> Box<dyn FileManager> {
    match resource {
        Resource::Default => Box::new(GatewayFileManager::new(
            state.gateway.clone(),
            state.index.clone(),
            state.notifier.clone(),
            username,
            &state.settings.default_system,
        )),
        Resource::Public => Box::new(PublicFileManager::new(
            state.gateway.clone(),
            state.index.clone(),
            state.notifier.clone(),
            username,
            &state.settings.public_system,
        )),
        Resource::Cloud => Box::new(CloudFileManager::new(
            state.cloud.clone(),
            state.notifier.clone(),
            &state.settings.cloud_system,
        )),
    }
}

/// Start the depot HTTP server with reqwest-backed collaborators.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    security::ensure_default_admin(&settings.users_file)?;

    let queue = Arc::new(HttpTaskQueue::new(settings.queue_url.clone()));
    let notifier = ReindexNotifier::spawn(queue, settings.reindex_user.clone(), REINDEX_QUEUE_CAPACITY);

    let state = AppState {
        gateway: Arc::new(HttpStorageGateway::new(settings.gateway_url.clone(), settings.gateway_token.clone())),
        cloud: Arc::new(HttpCloudStorage::new(
            settings.cloud_url.clone(),
            settings.cloud_token.clone(),
            settings.cloud_system.clone(),
        )),
        index: Arc::new(HttpSearchIndex::new(settings.index_url.clone())),
        notifier,
        sessions: Arc::new(RwLock::new(HashMap::new())),
        settings: Arc::new(settings),
    };

    let port = state.settings.http_port;
    serve(state, port).await
}

/// Mount all routes and serve until shutdown. Split from `run` so tests can
/// build an `AppState` over mock collaborators.
pub async fn serve(state: AppState, http_port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "depot ok" }))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/api/files/listing/{resource}", get(listing_root))
        .route("/api/files/listing/{resource}/{*file_path}", get(listing))
        .route("/api/files/search/{resource}", get(search))
        .route("/api/files/download/{resource}/{*file_path}", get(download))
        .route("/api/files/pems/{resource}/{*file_path}", get(pems))
        .route("/api/files/media/{resource}", post(media_root).put(media_root).delete(delete_root))
        .route("/api/files/media/{resource}/{*file_path}", post(media).put(media).delete(delete_path))
        .with_state(state)
}

// ---- session plumbing ----

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

async fn require_username(state: &AppState, headers: &HeaderMap) -> AppResult<String> {
    let sid = parse_cookie(headers, SESSION_COOKIE)
        .ok_or_else(|| AppError::auth("unauthorized", "missing session"))?;
    let map = state.sessions.read().await;
    map.get(&sid).cloned().ok_or_else(|| AppError::auth("unauthorized", "invalid session"))
}

fn set_session_cookie(sid: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE, sid)).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!(
        "{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/",
        SESSION_COOKIE
    ))
    .unwrap()
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    match security::authenticate(&state.settings.users_file, &payload.username, &payload.password) {
        Ok(true) => {
            let mut bytes = [0u8; 16];
            let _ = getrandom::getrandom(&mut bytes);
            let mut sid = String::with_capacity(32);
            use std::fmt::Write as _;
            for b in &bytes {
                let _ = write!(&mut sid, "{:02x}", b);
            }
            {
                let mut map = state.sessions.write().await;
                map.insert(sid.clone(), payload.username.clone());
            }
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&sid));
            (StatusCode::OK, headers, Json(json!({"status":"ok"})))
        }
        Ok(false) => (StatusCode::UNAUTHORIZED, HeaderMap::new(), Json(json!({"status":"unauthorized"}))),
        Err(e) => {
            error!("login error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), Json(json!({"status":"error","error": e.to_string()})))
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(sid) = parse_cookie(&headers, SESSION_COOKIE) {
        let mut map = state.sessions.write().await;
        map.remove(&sid);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok"})))
}

// ---- request normalization ----

/// Parse a request body leniently: malformed or empty JSON degrades to an
/// empty object so body-less mutating requests still dispatch (and then fail
/// with the unknown-operation error if they carried no action).
pub fn parse_body_lenient(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap_or_else(|_| json!({}))
}

/// Merge route parameters over body parameters: the route's file path wins
/// when both are present.
pub fn merge_route_params(mut params: OpParams, route_path: Option<String>) -> OpParams {
    if let Some(p) = route_path {
        if !p.is_empty() {
            params.path = Some(p);
        }
    }
    params
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    offset: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LISTING_LIMIT
}

/// Pull the operation name out of the parsed body. A body that carried no
/// usable `action` (including a recovered-empty malformed body) surfaces as
/// the unknown-operation error.
fn body_action(body: &Value) -> AppResult<FileOp> {
    match body.get("action").and_then(|v| v.as_str()) {
        Some(name) => FileOp::from_name(name),
        None => Err(AppError::unknown_operation("<missing action>")),
    }
}

// ---- handlers ----

async fn listing_root(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(resource): Path<String>,
    Query(page): Query<Pagination>,
) -> AppResult<Json<Value>> {
    listing_inner(&state, &headers, &resource, None, page).await
}

async fn listing(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((resource, file_path)): Path<(String, String)>,
    Query(page): Query<Pagination>,
) -> AppResult<Json<Value>> {
    listing_inner(&state, &headers, &resource, Some(file_path), page).await
}

async fn listing_inner(
    state: &AppState,
    headers: &HeaderMap,
    resource: &str,
    file_path: Option<String>,
    page: Pagination,
) -> AppResult<Json<Value>> {
    let username = require_username(state, headers).await?;
    let resource = Resource::from_route(resource)?;
    let fm = file_manager_for(state, resource, &username);
    let system = fm.default_system().to_string();
    let path = file_path.unwrap_or_else(|| crate::paths::ROOT.to_string());
    let children = fm.listing(&system, &path, page.offset, page.limit).await?;
    Ok(Json(json!({"status":"ok","results": children})))
}

async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(resource): Path<String>,
    Query(raw): Query<HashMap<String, String>>,
) -> AppResult<Json<Value>> {
    let username = require_username(&state, &headers).await?;
    let resource = Resource::from_route(&resource)?;
    let fm = file_manager_for(&state, resource, &username);
    let q = raw.get("q").cloned().unwrap_or_default();
    let offset = raw.get("offset").and_then(|s| s.parse().ok()).unwrap_or(0);
    let limit = raw.get("limit").and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_LISTING_LIMIT);
    let matches = fm.search(&q, offset, limit).await?;
    Ok(Json(json!({"status":"ok","results": matches})))
}

async fn download(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((resource, file_path)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let username = require_username(&state, &headers).await?;
    let resource = Resource::from_route(&resource)?;
    let fm = file_manager_for(&state, resource, &username);
    let system = fm.default_system().to_string();
    let handle = fm.download(&system, &file_path).await?;
    Ok(Json(json!({"status":"ok","results": handle})))
}

async fn pems(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((resource, file_path)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let username = require_username(&state, &headers).await?;
    let resource = Resource::from_route(&resource)?;
    let fm = file_manager_for(&state, resource, &username);
    let system = fm.default_system().to_string();
    let records = fm.list_permissions(&system, &file_path).await?;
    Ok(Json(json!({"status":"ok","results": records})))
}

async fn media_root(
    State(state): State<AppState>,
    Path(resource): Path<String>,
    headers: HeaderMap,
    req: Request,
) -> AppResult<Json<Value>> {
    media_inner(state, resource, None, headers, req).await
}

async fn media(
    State(state): State<AppState>,
    Path((resource, file_path)): Path<(String, String)>,
    headers: HeaderMap,
    req: Request,
) -> AppResult<Json<Value>> {
    media_inner(state, resource, Some(file_path), headers, req).await
}

/// POST/PUT dispatch: extract the operation name from the body's `action`
/// key, normalize parameters and uploaded files, and execute.
async fn media_inner(
    state: AppState,
    resource: String,
    route_path: Option<String>,
    headers: HeaderMap,
    req: Request,
) -> AppResult<Json<Value>> {
    let username = require_username(&state, &headers).await?;
    let resource = Resource::from_route(&resource)?;

    let is_multipart = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let (body, files) = if is_multipart {
        read_multipart(req, &state).await?
    } else {
        let bytes = axum::body::to_bytes(req.into_body(), usize::MAX)
            .await
            .map_err(|e| AppError::bad_request("unreadable_body".into(), e.to_string()))?;
        (parse_body_lenient(&bytes), Vec::new())
    };

    let op = body_action(&body)?;
    let params = merge_route_params(OpParams::from_body(&body), route_path);
    execute_operation(&state, resource, &username, op, params, files).await
}

async fn delete_root(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(resource): Path<String>,
) -> AppResult<Json<Value>> {
    delete_inner(state, resource, None, headers).await
}

async fn delete_path(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((resource, file_path)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    delete_inner(state, resource, Some(file_path), headers).await
}

/// DELETE maps unconditionally to the delete operation.
async fn delete_inner(
    state: AppState,
    resource: String,
    route_path: Option<String>,
    headers: HeaderMap,
) -> AppResult<Json<Value>> {
    let username = require_username(&state, &headers).await?;
    let resource = Resource::from_route(&resource)?;
    let params = merge_route_params(OpParams::default(), route_path);
    execute_operation(&state, resource, &username, FileOp::Delete, params, Vec::new()).await
}

/// Collect multipart text fields into a JSON object and file parts into the
/// uploaded-file set.
async fn read_multipart(req: Request, state: &AppState) -> AppResult<(Value, Vec<UploadedFile>)> {
    let mut multipart = Multipart::from_request(req, state)
        .await
        .map_err(|e| AppError::bad_request("bad_multipart".into(), e.to_string()))?;
    let mut fields = serde_json::Map::new();
    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request("bad_multipart".into(), e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(file_name) = field.file_name().map(str::to_string) {
            let content = field
                .bytes()
                .await
                .map_err(|e| AppError::bad_request("bad_multipart".into(), e.to_string()))?;
            files.push(UploadedFile { file_name, content: content.to_vec() });
        } else {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::bad_request("bad_multipart".into(), e.to_string()))?;
            fields.insert(name, Value::String(text));
        }
    }
    Ok((Value::Object(fields), files))
}

/// Execute one adapter operation with a fully merged parameter set and
/// serialize its result. Exactly one adapter is constructed per call.
pub async fn execute_operation(
    state: &AppState,
    resource: Resource,
    username: &str,
    op: FileOp,
    params: OpParams,
    files: Vec<UploadedFile>,
) -> AppResult<Json<Value>> {
    let fm = file_manager_for(state, resource, username);
    let system = params.system.clone().unwrap_or_else(|| fm.default_system().to_string());
    let path = params.path.clone().unwrap_or_else(|| crate::paths::ROOT.to_string());
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_LISTING_LIMIT);

    info!(
        backend = fm.backend_name(),
        op = op.as_str(),
        system = %system,
        path = %path,
        user = %username,
        "dispatching file operation"
    );

    let results = match op {
        FileOp::Listing => {
            let children = fm.listing(&system, &path, offset, limit).await?;
            json!(children)
        }
        FileOp::Upload => {
            if files.is_empty() {
                return Err(AppError::bad_request("missing_file", "upload requires at least one file part"));
            }
            let mut uploaded = Vec::with_capacity(files.len());
            for file in &files {
                uploaded.push(fm.upload(&system, &path, file).await?);
            }
            if uploaded.len() == 1 { json!(uploaded[0]) } else { json!(uploaded) }
        }
        FileOp::Download => {
            let handle = fm.download(&system, &path).await?;
            json!(handle)
        }
        FileOp::Mkdir => {
            let dir_name = params
                .dir_name
                .as_deref()
                .ok_or_else(|| AppError::bad_request("missing_param", "mkdir requires 'dir_name'"))?;
            json!(fm.mkdir(&system, &path, dir_name).await?)
        }
        FileOp::Copy => {
            json!(fm.copy(&system, &path, params.dest_path.as_deref(), params.dest_name.as_deref()).await?)
        }
        FileOp::Move => {
            let dest_path = params
                .dest_path
                .as_deref()
                .ok_or_else(|| AppError::bad_request("missing_param", "move requires 'dest_path'"))?;
            json!(fm.move_to(&system, &path, dest_path, params.dest_name.as_deref()).await?)
        }
        FileOp::Rename => {
            let new_name = params
                .new_name
                .as_deref()
                .ok_or_else(|| AppError::bad_request("missing_param", "rename requires 'new_name'"))?;
            json!(fm.rename(&system, &path, new_name).await?)
        }
        FileOp::Delete => {
            fm.delete(&system, &path).await?;
            json!({ "system": system, "path": path, "deleted": true })
        }
        FileOp::Trash => {
            let trash_path = params
                .trash_path
                .as_deref()
                .ok_or_else(|| AppError::bad_request("missing_param", "trash requires 'trash_path'"))?;
            json!(fm.trash(&system, &path, trash_path).await?)
        }
        FileOp::Share => {
            let share_user = params
                .username
                .as_deref()
                .ok_or_else(|| AppError::bad_request("missing_param", "share requires 'username'"))?;
            let permission = params
                .permission
                .as_deref()
                .ok_or_else(|| AppError::bad_request("missing_param", "share requires 'permission'"))?;
            json!(fm.share(&system, &path, share_user, permission).await?)
        }
        FileOp::ImportData => {
            let from_system = params
                .from_system
                .as_deref()
                .ok_or_else(|| AppError::bad_request("missing_param", "import_data requires 'from_system'"))?;
            let from_path = params
                .from_path
                .as_deref()
                .ok_or_else(|| AppError::bad_request("missing_param", "import_data requires 'from_path'"))?;
            json!(fm.import_data(&system, &path, from_system, from_path).await?)
        }
        FileOp::Search => {
            let q = params.q.clone().unwrap_or_default();
            json!(fm.search(&q, offset, limit).await?)
        }
    };

    Ok(Json(json!({"status":"ok","results": results})))
}
