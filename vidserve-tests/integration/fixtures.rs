//! Shared fixtures for router-level tests.

use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::http::{Method, Request, Response, header};
use tempfile::TempDir;
use tower::ServiceExt;
use vidserve_core::VidserveConfig;
use vidserve_core::config::{CategoryConfig, MediaConfig, RecordsConfig, StreamingConfig};

/// Deterministic, non-repeating-per-chunk byte pattern.
pub fn pattern(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i * 7 % 253) as u8).collect()
}

/// Temporary assets tree with one `housing/clip.mp4` of known content.
pub struct MediaFixture {
    pub temp_dir: TempDir,
    pub config: VidserveConfig,
    pub data: Vec<u8>,
}

impl MediaFixture {
    pub fn new(size: usize, chunk_size: usize) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let housing = temp_dir.path().join("housing");
        let shaft = temp_dir.path().join("shaft");
        std::fs::create_dir_all(&housing).unwrap();
        std::fs::create_dir_all(&shaft).unwrap();

        let data = pattern(size);
        std::fs::write(housing.join("clip.mp4"), &data).unwrap();

        let config = VidserveConfig {
            streaming: StreamingConfig {
                chunk_size,
                idle_read_timeout: None,
            },
            media: MediaConfig {
                assets_dir: temp_dir.path().to_path_buf(),
                categories: vec![
                    CategoryConfig::new("housing", housing),
                    CategoryConfig::new("shaft", shaft).with_content_type("video/webm"),
                ],
                enforce_containment: true,
            },
            records: RecordsConfig {
                data_dir: temp_dir.path().join("logs"),
                ..Default::default()
            },
            ..Default::default()
        };

        Self {
            temp_dir,
            config,
            data,
        }
    }

    pub fn router(&self) -> Router {
        vidserve_web::build_router(&self.config)
    }

    pub async fn get(&self, uri: &str, range: Option<&str>) -> Response<Body> {
        let mut request = Request::builder().uri(uri);
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }

        self.router()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }
}

/// Sends a JSON request to a fresh router over the same state on disk.
pub async fn send_json(
    fixture: &MediaFixture,
    method: Method,
    uri: &str,
    body: serde_json::Value,
) -> (axum::http::StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = fixture.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body_bytes(response).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

pub fn header_str<'a>(response: &'a Response<Body>, name: header::HeaderName) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}
