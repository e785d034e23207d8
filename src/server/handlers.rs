use std::convert::Infallible;
use std::path::PathBuf;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{Html, IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use super::assets::{Assets, serve_asset};
use super::error::{ApiError, ApiJson, ApiQuery, TabPath};
use crate::export::ExportFormat;
use crate::session::{Session, SessionError};
use crate::workspace::{CursorPosition, TabId, TabSummary};

/// Run a session call that touches the disk off the async workers.
async fn blocking<T, F>(call: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, SessionError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .map_err(ApiError::from)
}

pub async fn index() -> Result<Html<Vec<u8>>, ApiError> {
    let page = Assets::get("index.html")
        .ok_or_else(|| ApiError::Internal("index.html is not embedded".to_string()))?;
    Ok(Html(page.data.into_owned()))
}

pub async fn asset(Path(path): Path<String>) -> Result<Response, ApiError> {
    serve_asset(&path)
}

pub async fn config_yaml(State(session): State<Session>) -> Result<Response, ApiError> {
    let yaml = session
        .config()
        .to_yaml()
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/yaml")], yaml).into_response())
}

pub async fn config_json(State(session): State<Session>) -> impl IntoResponse {
    Json(session.config().clone())
}

#[derive(Serialize)]
pub struct TabList {
    tabs: Vec<TabSummary>,
    active: Option<TabId>,
}

pub async fn list_tabs(State(session): State<Session>) -> Json<TabList> {
    let workspace = session.workspace();
    Json(TabList {
        tabs: workspace.summaries(),
        active: workspace.active(),
    })
}

#[derive(Deserialize)]
pub struct NewTab {
    #[serde(default)]
    content: Option<String>,
}

pub async fn create_tab(
    State(session): State<Session>,
    ApiJson(body): ApiJson<NewTab>,
) -> impl IntoResponse {
    let tab = session.new_tab(body.content);
    Json(json!({ "success": true, "tab": tab }))
}

#[derive(Deserialize)]
pub struct PathBody {
    path: String,
}

impl PathBody {
    fn path(&self) -> Result<PathBuf, ApiError> {
        let trimmed = self.path.trim();
        if trimmed.is_empty() {
            return Err(ApiError::BadRequest("No path provided".to_string()));
        }
        Ok(PathBuf::from(trimmed))
    }
}

pub async fn open_path(
    State(session): State<Session>,
    ApiJson(body): ApiJson<PathBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = body.path()?;
    let tab = blocking(move || session.open_path(&path)).await?;
    Ok(Json(json!({ "success": true, "tab": tab })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TabDetail {
    #[serde(flatten)]
    summary: TabSummary,
    content: String,
    cursor: CursorPosition,
    scroll_top: f64,
}

pub async fn get_tab(
    State(session): State<Session>,
    TabPath(id): TabPath,
) -> Result<Json<TabDetail>, ApiError> {
    let workspace = session.workspace();
    let tab = workspace.get(id)?;
    Ok(Json(TabDetail {
        summary: tab.summary(workspace.active() == Some(id)),
        content: tab.document().text().to_string(),
        cursor: tab.cursor(),
        scroll_top: tab.scroll_top(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTab {
    content: String,
    #[serde(default)]
    cursor: Option<CursorPosition>,
    #[serde(default)]
    scroll_top: Option<f64>,
}

pub async fn update_tab(
    State(session): State<Session>,
    TabPath(id): TabPath,
    ApiJson(body): ApiJson<UpdateTab>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let dirty = session.update(id, body.content, body.cursor, body.scroll_top)?;
    Ok(Json(json!({ "success": true, "dirty": dirty })))
}

pub async fn activate_tab(
    State(session): State<Session>,
    TabPath(id): TabPath,
) -> Result<Json<serde_json::Value>, ApiError> {
    session.activate(id)?;
    Ok(Json(json!({ "success": true })))
}

fn saved_response(path: &std::path::Path) -> Json<serde_json::Value> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    Json(json!({ "success": true, "path": path, "filename": filename }))
}

pub async fn save_tab(
    State(session): State<Session>,
    TabPath(id): TabPath,
) -> Result<Json<serde_json::Value>, ApiError> {
    let path = blocking(move || session.save(id)).await?;
    Ok(saved_response(&path))
}

pub async fn save_tab_as(
    State(session): State<Session>,
    TabPath(id): TabPath,
    ApiJson(body): ApiJson<PathBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let target = body.path()?;
    let path = blocking(move || session.save_as(id, &target)).await?;
    Ok(saved_response(&path))
}

#[derive(Deserialize)]
pub struct ExportRequest {
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    path: Option<String>,
}

pub async fn export_tab(
    State(session): State<Session>,
    TabPath(id): TabPath,
    ApiJson(body): ApiJson<ExportRequest>,
) -> Result<Response, ApiError> {
    let path = body
        .path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);
    let format = match (&body.format, &path) {
        (Some(name), _) => name.parse::<ExportFormat>()?,
        (None, Some(path)) => ExportFormat::from_path(path).ok_or_else(|| {
            ApiError::BadRequest(format!("cannot infer export format from {}", path.display()))
        })?,
        (None, None) => return Err(ApiError::BadRequest("No export format given".to_string())),
    };

    let exported = blocking(move || session.export_tab(id, format, path.as_deref())).await?;
    if let Some(written) = exported.written_to {
        return Ok(saved_response(&written).into_response());
    }
    let disposition = format!("attachment; filename=\"{}\"", exported.file_name.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, format.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        exported.bytes,
    )
        .into_response())
}

#[derive(Deserialize)]
pub struct CloseParams {
    #[serde(default)]
    force: Option<String>,
}

impl CloseParams {
    /// `?force`, `?force=` and `?force=1` all force; `false`, `0` and `no` do not.
    fn force(&self) -> Result<bool, ApiError> {
        match self.force.as_deref().map(str::trim) {
            None => Ok(false),
            Some("" | "true" | "1" | "yes") => Ok(true),
            Some("false" | "0" | "no") => Ok(false),
            Some(other) => Err(ApiError::BadRequest(format!(
                "invalid force value '{other}', expected true or false"
            ))),
        }
    }
}

pub async fn close_tab(
    State(session): State<Session>,
    TabPath(id): TabPath,
    ApiQuery(params): ApiQuery<CloseParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    session.close(id, params.force()?)?;
    Ok(Json(json!({ "success": true })))
}

pub async fn events(
    State(session): State<Session>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(session.subscribe()).filter_map(|received| match received {
        Ok(event) => match Event::default().json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(err) => {
                tracing::warn!(%err, "failed to encode event");
                None
            }
        },
        Err(err) => {
            tracing::warn!(%err, "event subscriber lagged");
            None
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
