use std::error::Error;

use axum::Json;
use axum::extract::FromRequest;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequestParts, Path, Query, Request};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::de::DeserializeOwned;

use crate::document::DocumentError;
use crate::export::ExportError;
use crate::lock::LockError;
use crate::session::SessionError;
use crate::workspace::{TabId, WorkspaceError};

/// Error returned by API handlers as `{ "success": false, "message": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
    /// The feature is not part of this build or session.
    #[error("{0}")]
    Unavailable(String),
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unavailable(_) => StatusCode::NOT_IMPLEMENTED,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() && !matches!(self, Self::Unavailable(_)) {
            tracing::error!(message = %self, "request failed");
        }
        let body = serde_json::json!({
            "success": false,
            "message": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// Display `err` followed by any causes it does not already mention.
fn describe(err: &(dyn Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let message = describe(&err);
        match err {
            SessionError::Workspace(err) => match err {
                WorkspaceError::UnknownTab(_) => Self::NotFound(message),
                WorkspaceError::UnsavedChanges(_) | WorkspaceError::AlreadyOpen { .. } => {
                    Self::Conflict(message)
                }
                WorkspaceError::Document(err) => match err {
                    DocumentError::NotFound(_) => Self::NotFound(message),
                    DocumentError::NotUtf8(_) => Self::BadRequest(message),
                    DocumentError::Untitled | DocumentError::Locked(_) => Self::Conflict(message),
                    DocumentError::Read { .. } | DocumentError::Write { .. } => {
                        Self::Internal(message)
                    }
                },
            },
            SessionError::Export(err) => match err {
                ExportError::UnknownFormat(_) | ExportError::NoFormatForPath(_) => {
                    Self::BadRequest(message)
                }
                ExportError::Write {
                    source: LockError::Locked | LockError::Timeout(_),
                    ..
                } => Self::Conflict(message),
                ExportError::Render { .. } | ExportError::Write { .. } => Self::Internal(message),
            },
        }
    }
}

impl From<WorkspaceError> for ApiError {
    fn from(err: WorkspaceError) -> Self {
        SessionError::from(err).into()
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        SessionError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// JSON body whose rejections use the API error shape.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

/// Query string whose rejections use the API error shape.
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// The `{id}` segment of a tab route.
pub struct TabPath(pub TabId);

impl<S> FromRequestParts<S> for TabPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<u64>::from_request_parts(parts, state).await?;
        Ok(Self(TabId::new(id)))
    }
}
