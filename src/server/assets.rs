use axum::http::header;
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;

use super::error::ApiError;

/// Frontend files compiled into the binary.
#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Assets;

/// Serve an embedded file with a MIME type guessed from its name.
pub fn serve_asset(path: &str) -> Result<Response, ApiError> {
    let file = Assets::get(path).ok_or_else(|| ApiError::NotFound(format!("no asset {path}")))?;
    let mime = file.metadata.mimetype().to_string();
    Ok(([(header::CONTENT_TYPE, mime)], file.data).into_response())
}
