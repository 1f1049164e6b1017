//! JSON API handlers for discovery and diagnostics

use std::collections::BTreeMap;
use std::path::PathBuf;

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;
use vidserve_core::StreamingError;

use crate::server::AppState;

/// Liveness endpoint.
pub async fn root() -> Json<Value> {
    Json(json!({ "message": "Video API Server is running" }))
}

/// Lists the media files available in a category.
///
/// # Errors
///
/// - `StreamingError::Resolve` - Unknown category (404), missing directory (404) or unreadable directory (500)
pub async fn list_videos(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<String>>, StreamingError> {
    let files = state.media.library().list(&category).await?;
    info!("Listing {} files for category {}", files.len(), category);
    Ok(Json(files))
}

/// Resolved directory layout reported by `/debug/paths`.
#[derive(Debug, Serialize)]
pub struct DebugPaths {
    /// Working directory of the server process
    pub current_dir: Option<PathBuf>,
    /// Base directory the default categories live under
    pub assets_dir: PathBuf,
    /// Directory for every configured category
    pub video_dirs: BTreeMap<String, PathBuf>,
    /// Whether each category directory currently exists
    pub dirs_exist: BTreeMap<String, bool>,
}

/// Reports where each category is served from.
pub async fn debug_paths(State(state): State<AppState>) -> Json<DebugPaths> {
    let mut video_dirs = BTreeMap::new();
    let mut dirs_exist = BTreeMap::new();

    for category in state.media.library().categories() {
        let exists = tokio::fs::try_exists(&category.root).await.unwrap_or(false);
        video_dirs.insert(category.name.clone(), category.root.clone());
        dirs_exist.insert(category.name.clone(), exists);
    }

    Json(DebugPaths {
        current_dir: std::env::current_dir().ok(),
        assets_dir: state.assets_dir.as_ref().clone(),
        video_dirs,
        dirs_exist,
    })
}
