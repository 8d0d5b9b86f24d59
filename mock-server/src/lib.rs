//! In-memory imitation of the sketch editor API.
//!
//! Accounts are fixed at startup. Requests authenticate either with the
//! `connect.sid` session cookie or with HTTP Basic `username:token`. A
//! throttle can be armed to answer the next N requests with 429 so clients'
//! backoff can be exercised over real HTTP.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub content: String,
    pub file_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileEntry>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: String,
    pub username: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub owner: Owner,
    pub files: Vec<FileEntry>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SketchSummary {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Deserialize)]
pub struct NewProject {
    pub name: Option<String>,
    pub files: Vec<FileEntry>,
}

#[derive(Deserialize)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub files: Option<Vec<FileEntry>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub field: String,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ErrorDetail>>,
}

/// A registered user with both credential kinds.
#[derive(Clone, Debug)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub session: String,
    pub token: String,
}

impl Account {
    pub fn new(username: &str) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            username: username.to_string(),
            session: format!("{username}-session"),
            token: format!("{username}-token"),
        }
    }
}

pub const RATE_LIMIT: u64 = 60;

/// Shared server state. Tests keep an `Arc` to inspect counters and arm the
/// throttle while the server runs.
pub struct AppState {
    accounts: Vec<Account>,
    projects: RwLock<Vec<Project>>,
    throttled: AtomicU32,
    retry_after: Option<u64>,
    hits: AtomicUsize,
}

impl AppState {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            accounts,
            projects: RwLock::new(Vec::new()),
            throttled: AtomicU32::new(0),
            retry_after: None,
            hits: AtomicUsize::new(0),
        }
    }

    /// Send `Retry-After: <seconds>` with every 429.
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Answer the next `count` requests with 429.
    pub fn throttle(&self, count: u32) {
        self.throttled.store(count, Ordering::SeqCst);
    }

    /// Requests received so far, throttled ones included.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn authenticate(&self, headers: &HeaderMap) -> Option<&Account> {
        if let Some(session) = session_cookie(headers) {
            return self.accounts.iter().find(|a| a.session == session);
        }
        let (username, token) = basic_credentials(headers)?;
        self.accounts
            .iter()
            .find(|a| a.username == username && a.token == token)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(vec![Account::new("alice"), Account::new("bob")])
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "connect.sid")
        .map(|(_, value)| value.to_string())
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded).ok()?).ok()?;
    let (username, token) = decoded.split_once(':')?;
    Some((username.to_string(), token.to_string()))
}

pub struct ApiFailure {
    status: StatusCode,
    envelope: ErrorEnvelope,
}

impl ApiFailure {
    fn new(status: StatusCode, error: &str, message: &str) -> Self {
        Self {
            status,
            envelope: ErrorEnvelope {
                error: error.to_string(),
                message: message.to_string(),
                details: None,
            },
        }
    }

    fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", "Authentication required")
    }

    fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Forbidden", "You do not own this project")
    }

    fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NotFound", &format!("{what} not found"))
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(self.envelope)).into_response()
    }
}

pub fn app() -> Router {
    router(Arc::new(AppState::default()))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/projects", axum::routing::post(create_project))
        .route(
            "/api/projects/{id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/api/auth/access-check", get(access_check))
        .route("/api/{username}/sketches", get(list_sketches))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    run_with(listener, Arc::new(AppState::default())).await
}

pub async fn run_with(listener: TcpListener, state: Arc<AppState>) -> Result<(), std::io::Error> {
    axum::serve(listener, router(state)).await
}

async fn rate_limit(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);

    let throttled = state
        .throttled
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    let reset = (Utc::now().timestamp() + 60).to_string();

    let mut response = if throttled {
        tracing::debug!(path = %request.uri().path(), "throttling request");
        let mut response = ApiFailure::new(
            StatusCode::TOO_MANY_REQUESTS,
            "TooManyRequests",
            "Rate limit exceeded",
        )
        .into_response();
        if let Some(seconds) = state.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
            .headers_mut()
            .insert("x-ratelimit-remaining", HeaderValue::from(0u64));
        response
    } else {
        let mut response = next.run(request).await;
        response
            .headers_mut()
            .insert("x-ratelimit-remaining", HeaderValue::from(RATE_LIMIT - 1));
        response
    };

    response
        .headers_mut()
        .insert("x-ratelimit-limit", HeaderValue::from(RATE_LIMIT));
    if let Ok(value) = HeaderValue::from_str(&reset) {
        response.headers_mut().insert("x-ratelimit-reset", value);
    }
    response
}

fn slugify(name: &str) -> String {
    let mut slug = String::new();
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Give every file in the tree a server id.
fn assign_ids(files: &mut [FileEntry]) {
    for file in files {
        file.id = Some(new_id());
        if let Some(children) = file.children.as_mut() {
            assign_ids(children);
        }
    }
}

fn collect_file_errors(files: &[FileEntry], prefix: &str, details: &mut Vec<ErrorDetail>) {
    for (i, f) in files.iter().enumerate() {
        let field = format!("{prefix}[{i}]");
        if f.name.trim().is_empty() {
            details.push(ErrorDetail {
                field: format!("{field}.name"),
                message: "name is required".to_string(),
            });
        }
        if f.file_type != "file" && f.file_type != "folder" {
            details.push(ErrorDetail {
                field: format!("{field}.fileType"),
                message: "fileType must be \"file\" or \"folder\"".to_string(),
            });
        }
        if let Some(children) = &f.children {
            collect_file_errors(children, &format!("{field}.children"), details);
        }
    }
}

fn validate_files(files: &[FileEntry]) -> Result<(), ApiFailure> {
    let mut details = Vec::new();
    collect_file_errors(files, "files", &mut details);
    if details.is_empty() {
        return Ok(());
    }
    let mut failure = ApiFailure::new(StatusCode::BAD_REQUEST, "ValidationError", "Invalid input");
    failure.envelope.details = Some(details);
    Err(failure)
}

/// Unwrap a JSON body, reporting extractor failures in the error envelope.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiFailure> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        ApiFailure::new(rejection.status(), "InvalidBody", &rejection.body_text())
    })
}

async fn create_project(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<NewProject>, JsonRejection>,
) -> Result<(StatusCode, Json<Project>), ApiFailure> {
    let account = state.authenticate(&headers).ok_or_else(ApiFailure::unauthorized)?;
    let input = json_body(payload)?;
    validate_files(&input.files)?;

    let name = input
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "Untitled Sketch".to_string());
    let mut files = input.files;
    assign_ids(&mut files);
    let now = Utc::now().to_rfc3339();

    let project = Project {
        id: new_id(),
        slug: slugify(&name),
        name,
        owner: Owner {
            id: account.id.clone(),
            username: account.username.clone(),
        },
        files,
        created_at: now.clone(),
        updated_at: now,
    };
    state.projects.write().await.push(project.clone());
    tracing::info!(id = %project.id, owner = %account.username, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Project>, ApiFailure> {
    let projects = state.projects.read().await;
    projects
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiFailure::not_found("Project"))
}

/// Files carrying a known `_id` replace the stored file; files without one
/// are created. An unknown `_id` is a validation error.
fn merge_files(existing: &[FileEntry], incoming: Vec<FileEntry>) -> Result<Vec<FileEntry>, ApiFailure> {
    let mut unknown = Vec::new();
    let mut merged = Vec::with_capacity(incoming.len());
    for (i, mut file) in incoming.into_iter().enumerate() {
        match file.id.as_deref() {
            Some(id) if existing.iter().any(|e| e.id.as_deref() == Some(id)) => {}
            Some(_) => unknown.push(ErrorDetail {
                field: format!("files[{i}]._id"),
                message: "no such file in project".to_string(),
            }),
            None => {
                file.id = Some(new_id());
                if let Some(children) = file.children.as_mut() {
                    assign_ids(children);
                }
            }
        }
        merged.push(file);
    }
    if unknown.is_empty() {
        return Ok(merged);
    }
    let mut failure = ApiFailure::new(StatusCode::BAD_REQUEST, "ValidationError", "Invalid input");
    failure.envelope.details = Some(unknown);
    Err(failure)
}

async fn update_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    payload: Result<Json<ProjectUpdate>, JsonRejection>,
) -> Result<Json<Project>, ApiFailure> {
    let account = state.authenticate(&headers).ok_or_else(ApiFailure::unauthorized)?;
    let input = json_body(payload)?;
    let mut projects = state.projects.write().await;
    let project = projects
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or_else(|| ApiFailure::not_found("Project"))?;
    if project.owner.id != account.id {
        return Err(ApiFailure::forbidden());
    }

    if let Some(files) = input.files {
        validate_files(&files)?;
        project.files = merge_files(&project.files, files)?;
    }
    if let Some(name) = input.name {
        project.slug = slugify(&name);
        project.name = name;
    }
    project.updated_at = Utc::now().to_rfc3339();
    Ok(Json(project.clone()))
}

async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiFailure> {
    let account = state.authenticate(&headers).ok_or_else(ApiFailure::unauthorized)?;
    let mut projects = state.projects.write().await;
    let index = projects
        .iter()
        .position(|p| p.id == id)
        .ok_or_else(|| ApiFailure::not_found("Project"))?;
    if projects[index].owner.id != account.id {
        return Err(ApiFailure::forbidden());
    }
    projects.remove(index);
    Ok(StatusCode::NO_CONTENT)
}

async fn list_sketches(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<Vec<SketchSummary>>, ApiFailure> {
    if !state.accounts.iter().any(|a| a.username == username) {
        return Err(ApiFailure::not_found("User"));
    }
    let projects = state.projects.read().await;
    let sketches = projects
        .iter()
        .filter(|p| p.owner.username == username)
        .map(|p| SketchSummary {
            id: p.id.clone(),
            name: p.name.clone(),
            slug: p.slug.clone(),
            created_at: p.created_at.clone(),
            updated_at: p.updated_at.clone(),
        })
        .collect();
    Ok(Json(sketches))
}

#[derive(Serialize)]
struct AccessMessage {
    message: String,
}

async fn access_check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiFailure> {
    let account = state.authenticate(&headers).ok_or_else(ApiFailure::unauthorized)?;
    Ok(Json(AccessMessage {
        message: format!("Access granted for {}", account.username),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Test Sketch - Basic (Python)"), "test-sketch-basic-python");
        assert_eq!(slugify("  Hello!! "), "hello");
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let map = headers(&[(header::COOKIE, "theme=dark; connect.sid=abc; x=1")]);
        assert_eq!(session_cookie(&map).as_deref(), Some("abc"));
    }

    #[test]
    fn basic_credentials_decode() {
        let map = headers(&[(header::AUTHORIZATION, "Basic YWxpY2U6c2VjcmV0")]);
        assert_eq!(
            basic_credentials(&map),
            Some(("alice".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn authenticate_matches_accounts() {
        let state = AppState::default();
        let cookie = headers(&[(header::COOKIE, "connect.sid=alice-session")]);
        assert_eq!(state.authenticate(&cookie).unwrap().username, "alice");

        let wrong = headers(&[(header::COOKIE, "connect.sid=nope")]);
        assert!(state.authenticate(&wrong).is_none());
        assert!(state.authenticate(&HeaderMap::new()).is_none());
    }

    #[test]
    fn merge_keeps_known_ids_and_assigns_new_ones() {
        let existing = vec![FileEntry {
            id: Some("f1".to_string()),
            name: "sketch.js".to_string(),
            content: "old".to_string(),
            file_type: "file".to_string(),
            children: None,
        }];
        let incoming = vec![
            FileEntry {
                content: "new".to_string(),
                ..existing[0].clone()
            },
            FileEntry {
                id: None,
                name: "style.css".to_string(),
                content: String::new(),
                file_type: "file".to_string(),
                children: None,
            },
        ];
        let merged = merge_files(&existing, incoming).ok().unwrap();
        assert_eq!(merged[0].id.as_deref(), Some("f1"));
        assert_eq!(merged[0].content, "new");
        assert!(merged[1].id.is_some());
    }

    #[test]
    fn validation_descends_into_children() {
        let files = vec![FileEntry {
            id: None,
            name: "assets".to_string(),
            content: String::new(),
            file_type: "folder".to_string(),
            children: Some(vec![FileEntry {
                id: None,
                name: " ".to_string(),
                content: String::new(),
                file_type: "file".to_string(),
                children: None,
            }]),
        }];
        let failure = validate_files(&files).err().unwrap();
        let details = failure.envelope.details.unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].field, "files[0].children[0].name");
    }

    #[test]
    fn merge_rejects_unknown_ids() {
        let incoming = vec![FileEntry {
            id: Some("ghost".to_string()),
            name: "a.js".to_string(),
            content: String::new(),
            file_type: "file".to_string(),
            children: None,
        }];
        let failure = merge_files(&[], incoming).err().unwrap();
        assert_eq!(failure.status, StatusCode::BAD_REQUEST);
        assert_eq!(failure.envelope.details.unwrap()[0].field, "files[0]._id");
    }
}
