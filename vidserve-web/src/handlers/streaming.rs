//! Media streaming handler

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use vidserve_core::{MediaResponse, StreamingError};

use crate::server::AppState;

/// Streams `/video/{category}/{filename}`, honoring a single `Range` header.
///
/// Responds 200 with the whole file, 206 with the requested range, or
/// 404 / 400 / 416 before any body byte is sent.
///
/// # Errors
///
/// - `StreamingError` - Rendered as the matching 4xx/5xx JSON response
pub async fn stream_video(
    State(state): State<AppState>,
    Path((category, filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<MediaResponse, StreamingError> {
    state.media.stream(&category, &filename, &headers).await
}
