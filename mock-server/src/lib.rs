//! In-memory stand-in for the container engine's HTTP API.
//!
//! Serves the subset of `/v1.16` that `engine-client` drives: container
//! create/inspect/start/stop/remove, image build from a tar context, the
//! version document and the event log. Nothing is ever executed; containers
//! are records that flip between created and running.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const API_PREFIX: &str = "/v1.16";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub config: Value,
    pub running: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub status: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub time: i64,
}

#[derive(Default)]
pub struct Engine {
    containers: HashMap<String, ContainerRecord>,
    events: Vec<EventRecord>,
}

impl Engine {
    fn find(&self, key: &str) -> Option<&ContainerRecord> {
        self.containers
            .get(key)
            .or_else(|| self.containers.values().find(|c| c.name == key))
    }

    fn find_mut(&mut self, key: &str) -> Option<&mut ContainerRecord> {
        let id = self.find(key)?.id.clone();
        self.containers.get_mut(&id)
    }

    fn record(&mut self, status: &str, id: &str, from: Option<String>) {
        self.events.push(EventRecord {
            status: status.to_string(),
            id: id.to_string(),
            from,
            time: now(),
        });
    }
}

pub type Db = Arc<RwLock<Engine>>;

#[derive(Deserialize)]
struct CreateParams {
    name: Option<String>,
}

#[derive(Deserialize)]
struct RemoveParams {
    #[serde(default, deserialize_with = "flag")]
    force: bool,
}

#[derive(Deserialize)]
struct EventParams {
    since: Option<i64>,
    until: Option<i64>,
}

/// Query booleans arrive as `true`/`false` or `1`/`0`.
fn flag<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(matches!(raw.as_str(), "1" | "true" | "True"))
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Engine::default()));
    let api = Router::new()
        .route("/containers/create", post(create_container))
        .route("/containers/{id}/json", get(inspect_container))
        .route("/containers/{id}/start", post(start_container))
        .route("/containers/{id}/stop", post(stop_container))
        .route("/containers/{id}", delete(remove_container))
        .route("/build", post(build_image))
        .route("/version", get(version))
        .route("/events", get(events))
        .with_state(db);
    Router::new().nest(API_PREFIX, api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "mock engine listening");
    }
    axum::serve(listener, app()).await
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}

/// 64 hex characters, the shape of an engine object id.
fn new_id() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

fn plain(status: StatusCode, message: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], message).into_response()
}

fn no_such_container(key: &str) -> Response {
    plain(StatusCode::NOT_FOUND, format!("no such id: {key}"))
}

/// Newline-delimited JSON, one value per line.
fn json_lines<T: Serialize>(entries: &[T]) -> Response {
    let body: String = entries
        .iter()
        .filter_map(|entry| serde_json::to_string(entry).ok())
        .map(|line| line + "\n")
        .collect();
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn create_container(
    State(db): State<Db>,
    Query(params): Query<CreateParams>,
    Json(config): Json<Value>,
) -> Response {
    let Some(image) = config.get("Image").and_then(Value::as_str).filter(|i| !i.is_empty()) else {
        return plain(StatusCode::INTERNAL_SERVER_ERROR, "No image was specified".to_string());
    };
    let image = image.to_string();

    let mut engine = db.write().await;
    let id = new_id();
    let name = params.name.unwrap_or_else(|| id[..12].to_string());
    if engine.containers.values().any(|c| c.name == name) {
        return plain(
            StatusCode::CONFLICT,
            format!("Conflict, the name {name} is already assigned"),
        );
    }
    debug!(%id, %name, %image, "creating container");
    engine.containers.insert(
        id.clone(),
        ContainerRecord {
            id: id.clone(),
            name,
            config,
            running: false,
        },
    );
    engine.record("create", &id, Some(image));
    (StatusCode::CREATED, Json(json!({"Id": id, "Warnings": null}))).into_response()
}

async fn inspect_container(State(db): State<Db>, Path(key): Path<String>) -> Response {
    let engine = db.read().await;
    let Some(container) = engine.find(&key) else {
        return no_such_container(&key);
    };
    let host_config = container.config.get("HostConfig").cloned().unwrap_or_else(|| json!({}));
    Json(json!({
        "Id": container.id,
        "Name": format!("/{}", container.name),
        "Config": container.config,
        "HostConfig": host_config,
        "State": {"Running": container.running},
    }))
    .into_response()
}

async fn start_container(State(db): State<Db>, Path(key): Path<String>) -> Response {
    let mut engine = db.write().await;
    let Some(container) = engine.find_mut(&key) else {
        return no_such_container(&key);
    };
    if container.running {
        return StatusCode::NOT_MODIFIED.into_response();
    }
    container.running = true;
    let id = container.id.clone();
    engine.record("start", &id, None);
    StatusCode::NO_CONTENT.into_response()
}

async fn stop_container(State(db): State<Db>, Path(key): Path<String>) -> Response {
    let mut engine = db.write().await;
    let Some(container) = engine.find_mut(&key) else {
        return no_such_container(&key);
    };
    if !container.running {
        return StatusCode::NOT_MODIFIED.into_response();
    }
    container.running = false;
    let id = container.id.clone();
    engine.record("die", &id, None);
    engine.record("stop", &id, None);
    StatusCode::NO_CONTENT.into_response()
}

async fn remove_container(
    State(db): State<Db>,
    Path(key): Path<String>,
    Query(params): Query<RemoveParams>,
) -> Response {
    let mut engine = db.write().await;
    let Some(container) = engine.find(&key) else {
        return no_such_container(&key);
    };
    if container.running && !params.force {
        return plain(
            StatusCode::CONFLICT,
            format!("Conflict, You cannot remove a running container {key}. Stop the container before attempting removal or use -f"),
        );
    }
    let id = container.id.clone();
    engine.containers.remove(&id);
    engine.record("destroy", &id, None);
    StatusCode::NO_CONTENT.into_response()
}

/// Names of the regular files in a tar archive.
fn archive_entries(bytes: &[u8]) -> std::io::Result<Vec<(String, String)>> {
    let mut archive = tar::Archive::new(bytes);
    let mut entries = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let name = entry.path()?.to_string_lossy().into_owned();
        let mut contents = String::new();
        if entry.read_to_string(&mut contents).is_err() {
            contents.clear();
        }
        entries.push((name, contents));
    }
    Ok(entries)
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum BuildLine {
    Stream(String),
    Error(String),
}

async fn build_image(State(db): State<Db>, body: Bytes) -> Response {
    let entries = match archive_entries(&body) {
        Ok(entries) => entries,
        Err(e) => return json_lines(&[BuildLine::Error(format!("invalid build context: {e}"))]),
    };
    let Some((_, dockerfile)) = entries.iter().find(|(name, _)| name == "Dockerfile") else {
        return json_lines(&[BuildLine::Error(
            "Cannot locate specified Dockerfile: Dockerfile".to_string(),
        )]);
    };

    let mut lines = Vec::new();
    for (step, instruction) in dockerfile
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
    {
        lines.push(BuildLine::Stream(format!("Step {step} : {instruction}\n")));
        lines.push(BuildLine::Stream(format!(" ---> {}\n", &new_id()[..12])));
    }
    if lines.is_empty() {
        return json_lines(&[BuildLine::Error("Dockerfile cannot be empty".to_string())]);
    }

    let id = new_id();
    let short = &id[..12];
    lines.push(BuildLine::Stream(format!("Successfully built {short}\n")));
    debug!(image = short, files = entries.len(), "built image");
    db.write().await.record("build", short, None);
    json_lines(&lines)
}

async fn version() -> Json<Value> {
    Json(json!({
        "ApiVersion": "1.16",
        "Version": "1.4.1",
        "GitCommit": "mock",
        "GoVersion": "go1.3.3",
        "Os": std::env::consts::OS,
        "Arch": std::env::consts::ARCH,
    }))
}

async fn events(State(db): State<Db>, Query(params): Query<EventParams>) -> Response {
    let engine = db.read().await;
    let selected: Vec<&EventRecord> = engine
        .events
        .iter()
        .filter(|event| params.since.map_or(true, |since| event.time >= since))
        .filter(|event| params.until.map_or(true, |until| event.time <= until))
        .collect();
    json_lines(&selected)
}
