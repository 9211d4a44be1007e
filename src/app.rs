use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{delete, get, post, put},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::bundle::{self, Bundle};
use crate::config::Config;
use crate::editor::{EditorCommand, Effect, Session, SessionState};
use crate::error::{Result, TourError};
use crate::graph::TourGraph;
use crate::publisher::Publisher;
use crate::saving;
use crate::scene::{ImageRef, Position};
use crate::storage::{FsObjectStore, FsRecordStore};
use crate::viewer;

/// Panoramas are large; the bundle import carries every one of them at once.
const MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

pub struct AppState {
    session: Mutex<Session>,
    objects: Arc<FsObjectStore>,
    records: Arc<FsRecordStore>,
    config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        AppState {
            session: Mutex::new(Session::new()),
            objects: Arc::new(FsObjectStore::new(config.storage_dir(), &config.storage_url())),
            records: Arc::new(FsRecordStore::new(config.records_dir())),
            config,
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the session's busy flag when an export or publish ends, however it ends.
struct OperationGuard(Arc<AppState>);

impl OperationGuard {
    fn begin(state: &Arc<AppState>) -> Result<(Self, TourGraph)> {
        let graph = state.session().begin_operation()?;
        Ok((OperationGuard(state.clone()), graph))
    }
}

impl Drop for OperationGuard {
    fn drop(&mut self) {
        self.0.session().finish_operation();
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    message: Option<String>,
}

#[derive(Serialize)]
struct EffectsResponse {
    status: &'static str,
    effects: Vec<Effect>,
}

#[derive(Serialize)]
struct HotspotView<'a> {
    id: &'a str,
    pitch: f64,
    yaw: f64,
    target: &'a str,
    target_yaw: f64,
    text: &'a str,
}

#[derive(Serialize)]
struct SceneView<'a> {
    id: &'a str,
    name: &'a str,
    image_url: String,
    hotspots: Vec<HotspotView<'a>>,
}

#[derive(Serialize)]
struct SessionView<'a> {
    state: SessionState,
    current_scene: Option<&'a str>,
    initial_scene: Option<&'a str>,
    remote_id: Option<&'a str>,
    project_name: Option<&'a str>,
    busy: bool,
    scenes: Vec<SceneView<'a>>,
}

#[derive(Deserialize)]
struct CompleteHotspot {
    target: String,
    target_yaw: Option<f64>,
}

#[derive(Deserialize)]
struct EditHotspot {
    target: Option<String>,
    target_yaw: Option<f64>,
}

#[derive(Deserialize)]
struct PublishRequest {
    project_name: Option<String>,
}

#[derive(Serialize)]
struct PublishResponse {
    status: &'static str,
    id: String,
    link: String,
    shareable: bool,
}

#[derive(Serialize)]
struct TourResponse {
    id: String,
    project_name: String,
    config: serde_json::Value,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct LinkResponse {
    link: String,
}

impl IntoResponse for TourError {
    fn into_response(self) -> Response {
        let status = match &self {
            TourError::DuplicateId(_)
            | TourError::InvalidId(_)
            | TourError::InvalidTarget(_)
            | TourError::EmptyTour => StatusCode::BAD_REQUEST,
            TourError::NotFound(_) => StatusCode::NOT_FOUND,
            TourError::Busy => StatusCode::CONFLICT,
            TourError::SharingLocked(_) => StatusCode::PAYMENT_REQUIRED,
            TourError::UploadFailure { .. } => StatusCode::BAD_GATEWAY,
            TourError::Corrupt(_) => StatusCode::UNPROCESSABLE_ENTITY,
            TourError::Io(_) | TourError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("{}", self);
        }
        (
            status,
            Json(StatusResponse {
                status: "error",
                message: Some(self.to_string()),
            }),
        )
            .into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let storage = ServeDir::new(state.config.storage_dir());

    Router::new()
        .route("/", get(serve_editor))
        .route("/viewer", get(serve_viewer))
        .route("/api/scenes", get(get_session).post(add_scene))
        .route("/api/scenes/:id", delete(remove_scene))
        .route("/api/scenes/:id/image", get(scene_image))
        .route("/api/scenes/:id/select", post(select_scene))
        .route("/api/scenes/:id/initial", post(set_initial_scene))
        .route("/api/hotspots/place", post(place_hotspot))
        .route("/api/hotspots/complete", post(complete_hotspot))
        .route("/api/hotspots/cancel", post(cancel_hotspot))
        .route(
            "/api/hotspots/:id",
            put(edit_hotspot).delete(remove_hotspot),
        )
        .route("/api/export", get(export_tour))
        .route("/api/import", post(import_bundle))
        .route("/api/publish", post(publish_tour))
        .route("/api/tours/:id", get(get_tour))
        .route("/api/tours/:id/edit", post(open_tour))
        .route("/api/tours/:id/link", get(get_link))
        .route("/api/draft/save", post(save_draft))
        .route("/api/draft/load", post(load_draft))
        .nest_service("/storage", storage)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: Config) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let addr = config.addr.clone();
    let state = Arc::new(AppState::new(config));
    let app = router(state);

    let listener = TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_editor() -> Html<&'static str> {
    Html(include_str!("./static/editor.html"))
}

async fn serve_viewer() -> Html<&'static str> {
    Html(include_str!("./static/viewer.html"))
}

fn effects(effects: Vec<Effect>) -> Json<EffectsResponse> {
    Json(EffectsResponse {
        status: "ok",
        effects,
    })
}

fn dispatch(state: &AppState, command: EditorCommand) -> Result<Json<EffectsResponse>> {
    state.session().dispatch(command).map(effects)
}

async fn blocking<T, F>(job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| TourError::Io(std::io::Error::other(e)))?
}

/// Collect multipart fields as `name -> (file name, bytes)`.
async fn read_fields(
    mut multipart: Multipart,
) -> Result<HashMap<String, (Option<String>, Vec<u8>)>> {
    let mut fields = HashMap::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| TourError::Corrupt(format!("bad upload: {}", e)))?
    {
        let name = field.name().unwrap_or("unknown").to_string();
        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| TourError::Corrupt(format!("bad upload: {}", e)))?;
        fields.insert(name, (file_name, data.to_vec()));
    }
    Ok(fields)
}

fn text_field(fields: &HashMap<String, (Option<String>, Vec<u8>)>, name: &str) -> Option<String> {
    fields
        .get(name)
        .map(|(_, data)| String::from_utf8_lossy(data).trim().to_string())
        .filter(|text| !text.is_empty())
}

async fn get_session(State(state): State<Arc<AppState>>) -> Response {
    let session = state.session();
    let graph = session.graph();

    let scenes = graph
        .scenes()
        .map(|scene| SceneView {
            id: &scene.id,
            name: &scene.name,
            image_url: match &scene.image {
                ImageRef::Remote { url } => url.clone(),
                ImageRef::Inline { .. } => {
                    format!("/api/scenes/{}/image", urlencoding::encode(&scene.id))
                }
            },
            hotspots: scene
                .hotspots
                .iter()
                .map(|h| HotspotView {
                    id: &h.id,
                    pitch: h.position.pitch,
                    yaw: h.position.yaw,
                    target: &h.target,
                    target_yaw: h.target_yaw,
                    text: &h.text,
                })
                .collect(),
        })
        .collect();

    Json(SessionView {
        state: session.state(),
        current_scene: session.current_scene(),
        initial_scene: graph.initial_scene(),
        remote_id: session.remote_id(),
        project_name: session.project_name(),
        busy: session.is_busy(),
        scenes,
    })
    .into_response()
}

async fn add_scene(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<EffectsResponse>> {
    let mut fields = read_fields(multipart).await?;
    let id = text_field(&fields, "id").ok_or_else(|| TourError::InvalidId(String::new()))?;
    let name = text_field(&fields, "name");
    let (file_name, bytes) = fields
        .remove("file")
        .ok_or_else(|| TourError::not_found("image file"))?;

    dispatch(
        &state,
        EditorCommand::AddScene {
            id,
            name,
            file_name,
            bytes,
        },
    )
}

async fn remove_scene(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EffectsResponse>> {
    dispatch(&state, EditorCommand::RemoveScene { id })
}

async fn scene_image(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response> {
    let image = state.session().graph().scene(&id)?.image.clone();
    Ok(match image {
        ImageRef::Inline { mime, data } => ([(header::CONTENT_TYPE, mime)], data).into_response(),
        ImageRef::Remote { url } => Redirect::temporary(&url).into_response(),
    })
}

async fn select_scene(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EffectsResponse>> {
    dispatch(&state, EditorCommand::SelectScene { id })
}

async fn set_initial_scene(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EffectsResponse>> {
    dispatch(&state, EditorCommand::SetInitialScene { id })
}

async fn place_hotspot(
    State(state): State<Arc<AppState>>,
    Json(position): Json<Position>,
) -> Result<Json<EffectsResponse>> {
    dispatch(&state, EditorCommand::PlaceHotspot { position })
}

async fn complete_hotspot(
    State(state): State<Arc<AppState>>,
    Json(answer): Json<CompleteHotspot>,
) -> Result<Json<EffectsResponse>> {
    dispatch(
        &state,
        EditorCommand::CompleteHotspot {
            target: answer.target,
            target_yaw: answer.target_yaw,
        },
    )
}

async fn cancel_hotspot(State(state): State<Arc<AppState>>) -> Result<Json<EffectsResponse>> {
    dispatch(&state, EditorCommand::CancelHotspot)
}

async fn edit_hotspot(
    State(state): State<Arc<AppState>>,
    Path(hotspot_id): Path<String>,
    Json(edit): Json<EditHotspot>,
) -> Result<Json<EffectsResponse>> {
    dispatch(
        &state,
        EditorCommand::EditHotspot {
            hotspot_id,
            target: edit.target,
            target_yaw: edit.target_yaw,
        },
    )
}

async fn remove_hotspot(
    State(state): State<Arc<AppState>>,
    Path(hotspot_id): Path<String>,
) -> Result<Json<EffectsResponse>> {
    dispatch(&state, EditorCommand::RemoveHotspot { hotspot_id })
}

/// Embed every scene image concurrently, then render the bundle once all are done.
async fn build_bundle(graph: TourGraph, objects: Arc<FsObjectStore>) -> Result<Bundle> {
    let mut jobs = JoinSet::new();
    for scene in graph.scenes().cloned() {
        let objects = objects.clone();
        jobs.spawn_blocking(move || {
            bundle::embed_image(&scene, objects.as_ref()).map(|uri| (scene.id, uri))
        });
    }

    let mut images = HashMap::new();
    while let Some(joined) = jobs.join_next().await {
        let (id, uri) = joined.map_err(|e| TourError::Io(std::io::Error::other(e)))??;
        images.insert(id, uri);
    }

    bundle::render_bundle(&graph, &images)
}

async fn export_tour(State(state): State<Arc<AppState>>) -> Result<Response> {
    let (_guard, graph) = OperationGuard::begin(&state)?;
    let bundle = build_bundle(graph, state.objects.clone()).await?;
    log::info!("Exported bundle with {} scene(s)", bundle.scene_count);

    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", bundle.file_name()),
            ),
        ],
        bundle.html,
    )
        .into_response())
}

async fn import_bundle(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<StatusResponse>> {
    let mut fields = read_fields(multipart).await?;
    let (_, data) = fields
        .remove("bundle")
        .ok_or_else(|| TourError::not_found("bundle file"))?;
    let html = String::from_utf8(data)
        .map_err(|_| TourError::Corrupt("bundle is not UTF-8".to_string()))?;
    let graph = bundle::import(&html)?;
    let count = graph.len();

    let mut session = state.session();
    if session.is_busy() {
        return Err(TourError::Busy);
    }
    session.replace_graph(graph);

    Ok(Json(StatusResponse {
        status: "ok",
        message: Some(format!("Imported {} scene(s)", count)),
    }))
}

async fn publish_tour(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<PublishResponse>> {
    let (_guard, graph) = OperationGuard::begin(&state)?;
    let (remote_id, current_name) = {
        let session = state.session();
        (
            session.remote_id().map(str::to_string),
            session.project_name().map(str::to_string),
        )
    };
    let project_name = request
        .project_name
        .filter(|n| !n.trim().is_empty())
        .or(current_name)
        .unwrap_or_else(|| "Untitled tour".to_string());

    let objects = state.objects.clone();
    let records = state.records.clone();
    let owner = state.config.owner.clone();
    let published = blocking(move || {
        let publisher = Publisher::new(objects.as_ref(), records.as_ref(), &owner);
        match remote_id {
            Some(id) => publisher.update(&id, &graph),
            None => publisher.persist(&graph, &project_name),
        }
    })
    .await?;

    state.session().apply_published(&published);

    Ok(Json(PublishResponse {
        status: "ok",
        link: viewer::view_link(&state.config.origin, &published.record.id),
        shareable: published.record.paid,
        id: published.record.id,
    }))
}

async fn get_tour(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<TourResponse>> {
    let records = state.records.clone();
    let tour = blocking(move || viewer::load(records.as_ref(), &id)).await?;

    Ok(Json(TourResponse {
        config: viewer::viewer_config(&tour.graph),
        id: tour.id,
        project_name: tour.project_name,
        warnings: tour.warnings,
    }))
}

async fn open_tour(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>> {
    let records = state.records.clone();
    let tour = blocking(move || viewer::load(records.as_ref(), &id)).await?;
    let message = format!("Opened '{}' for editing", tour.project_name);

    let mut session = state.session();
    if session.is_busy() {
        return Err(TourError::Busy);
    }
    *session = Session::open_published(tour);

    Ok(Json(StatusResponse {
        status: "ok",
        message: Some(message),
    }))
}

async fn get_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LinkResponse>> {
    let records = state.records.clone();
    let tour = blocking(move || viewer::load(records.as_ref(), &id)).await?;
    let link = viewer::share_link(&state.config.origin, &tour)?;
    Ok(Json(LinkResponse { link }))
}

async fn save_draft(State(state): State<Arc<AppState>>) -> Result<Response> {
    let graph = state.session().graph().clone();
    let buffer = saving::draft_to_bytes(&graph)?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/gzip")
        .header(
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"tour.bin.gz\"",
        )
        .body(Body::from(buffer))
        .map_err(|e| TourError::Serialization(e.to_string()))?)
}

async fn load_draft(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<StatusResponse>> {
    let mut fields = read_fields(multipart).await?;
    let (_, data) = fields
        .remove("draft")
        .ok_or_else(|| TourError::not_found("draft file"))?;
    let graph = saving::draft_from_bytes(&data)
        .map_err(|e| TourError::Corrupt(format!("draft: {}", e)))?;
    let count = graph.len();

    let mut session = state.session();
    if session.is_busy() {
        return Err(TourError::Busy);
    }
    session.replace_graph(graph);

    Ok(Json(StatusResponse {
        status: "ok",
        message: Some(format!("Loaded draft with {} scene(s)", count)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use tower::ServiceExt;

    const BOUNDARY: &str = "panotour-test-boundary";

    fn test_state(dir: &std::path::Path) -> Arc<AppState> {
        let config = Config {
            data_dir: dir.to_path_buf(),
            ..Config::default()
        };
        Arc::new(AppState::new(config))
    }

    fn multipart_body(fields: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, file_name, data) in fields {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match file_name {
                Some(file) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, file
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    async fn upload_scene(state: &Arc<AppState>, id: &str) -> StatusCode {
        let body = multipart_body(&[
            ("id", None, id.as_bytes()),
            ("file", Some("pano.jpg"), b"fake image bytes"),
        ]);
        let request = Request::post("/api/scenes")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        send(state, request).await.0
    }

    fn json_post(uri: &str, value: serde_json::Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn empty_session_reports_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let (status, body) = send(&state, Request::get("/api/scenes").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let view: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(view["state"], "empty");

        let (status, _) = send(&state, Request::get("/api/export").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &state,
            json_post("/api/hotspots/place", serde_json::json!({ "pitch": 0.0, "yaw": 0.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn hotspot_can_be_retargeted() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        for id in ["a", "b", "c"] {
            assert_eq!(upload_scene(&state, id).await, StatusCode::OK);
        }
        send(
            &state,
            json_post("/api/hotspots/place", serde_json::json!({ "pitch": 0.0, "yaw": 15.0 })),
        )
        .await;
        send(
            &state,
            json_post("/api/hotspots/complete", serde_json::json!({ "target": "b" })),
        )
        .await;

        let (_, body) = send(&state, Request::get("/api/scenes").body(Body::empty()).unwrap()).await;
        let view: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let hotspot = &view["scenes"][0]["hotspots"][0];
        assert_eq!(hotspot["yaw"], 15.0);
        assert_eq!(hotspot["target_yaw"], 0.0);
        let id = hotspot["id"].as_str().unwrap().to_string();

        let edit = |target: &str| {
            Request::put(format!("/api/hotspots/{}", id))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({ "target": target, "target_yaw": -60.0 }).to_string(),
                ))
                .unwrap()
        };
        let (status, _) = send(&state, edit("c")).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&state, edit("nowhere")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let session = state.session();
        let (_, hotspot) = session.graph().find_hotspot(&id).unwrap();
        assert_eq!(hotspot.target, "c");
        assert_eq!(hotspot.target_yaw, -60.0);
        assert_eq!(hotspot.text, "Go to pano");
    }

    #[tokio::test]
    async fn build_export_publish_and_view() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        assert_eq!(upload_scene(&state, "sala").await, StatusCode::OK);
        assert_eq!(upload_scene(&state, "quarto").await, StatusCode::OK);
        assert_eq!(upload_scene(&state, "sala").await, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &state,
            json_post("/api/hotspots/place", serde_json::json!({ "pitch": 2.0, "yaw": 33.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let placed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(placed["effects"][0]["effect"], "request_target");
        assert_eq!(placed["effects"][0]["owner"], "sala");

        let (status, _) = send(
            &state,
            json_post(
                "/api/hotspots/complete",
                serde_json::json!({ "target": "quarto", "target_yaw": 90.0 }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(&state, Request::get("/api/export").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        let html = String::from_utf8(body).unwrap();
        let imported = bundle::import(&html).unwrap();
        assert_eq!(imported.len(), 2);
        assert_eq!(imported.hotspot_count(), 1);

        let (status, body) = send(
            &state,
            json_post("/api/publish", serde_json::json!({ "project_name": "Casa" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let published: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let id = published["id"].as_str().unwrap().to_string();
        assert_eq!(published["shareable"], false);
        assert_eq!(state.session().remote_id(), Some(id.as_str()));
        assert!(!state.session().graph().scene("sala").unwrap().image.is_inline());

        let (status, body) = send(
            &state,
            Request::get(format!("/api/tours/{}", id)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let tour: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(tour["project_name"], "Casa");
        assert_eq!(tour["config"]["default"]["firstScene"], "sala");

        let (status, _) = send(
            &state,
            Request::get(format!("/api/tours/{}/link", id)).body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

        let (status, _) = send(
            &state,
            Request::get("/api/tours/does-not-exist").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
