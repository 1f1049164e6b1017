//! Full request workflows over TCP, as a video player would issue them.

use std::net::SocketAddr;

use futures::future::join_all;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, RANGE};
use tempfile::TempDir;
use tokio::net::TcpListener;
use vidserve_core::VidserveConfig;
use vidserve_core::config::{CategoryConfig, MediaConfig, StreamingConfig};

struct RunningServer {
    address: SocketAddr,
    data: Vec<u8>,
    _temp_dir: TempDir,
}

impl RunningServer {
    async fn start(size: usize, chunk_size: usize) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let housing = temp_dir.path().join("housing");
        std::fs::create_dir_all(&housing).unwrap();
        let data: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
        std::fs::write(housing.join("clip.mp4"), &data).unwrap();

        let config = VidserveConfig {
            streaming: StreamingConfig {
                chunk_size,
                idle_read_timeout: None,
            },
            media: MediaConfig {
                assets_dir: temp_dir.path().to_path_buf(),
                categories: vec![CategoryConfig::new("housing", housing)],
                enforce_containment: true,
            },
            ..Default::default()
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            vidserve_web::serve_on(listener, &config, std::future::pending())
                .await
                .unwrap();
        });

        Self {
            address,
            data,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address, path)
    }
}

#[tokio::test]
async fn test_full_download_over_tcp() {
    let server = RunningServer::start(2 * 1024 * 1024 + 333, 64 * 1024).await;
    let client = reqwest::Client::new();

    let response = client
        .get(server.url("/video/housing/clip.mp4"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[ACCEPT_RANGES], "bytes");
    assert_eq!(
        response.headers()[CONTENT_LENGTH],
        server.data.len().to_string().as_str()
    );
    let body = response.bytes().await.unwrap();
    assert_eq!(body.len(), server.data.len());
    assert!(body == server.data);
}

#[tokio::test]
async fn test_concurrent_identical_ranges_return_identical_bytes() {
    let server = RunningServer::start(500_000, 4096).await;
    let client = reqwest::Client::new();
    let url = server.url("/video/housing/clip.mp4");

    let requests = (0..8).map(|_| {
        let client = client.clone();
        let url = url.clone();
        async move {
            let response = client
                .get(url)
                .header(RANGE, "bytes=10000-209999")
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
            assert_eq!(
                response.headers()[CONTENT_RANGE],
                "bytes 10000-209999/500000"
            );
            response.bytes().await.unwrap()
        }
    });

    let bodies = join_all(requests).await;
    for body in &bodies {
        assert_eq!(body.as_ref(), &server.data[10_000..=209_999]);
    }
}

#[tokio::test]
async fn test_player_style_sequential_seeks() {
    let server = RunningServer::start(100_000, 1024).await;
    let client = reqwest::Client::new();
    let url = server.url("/video/housing/clip.mp4");

    // Probe, then jump around the file the way a seeking player does.
    for (range, start, end) in [
        ("bytes=0-", 0usize, 99_999usize),
        ("bytes=50000-50999", 50_000, 50_999),
        ("bytes=99990-", 99_990, 99_999),
        ("bytes=-100", 0, 100),
    ] {
        let response = client.get(&url).header(RANGE, range).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT, "{range}");
        let body = response.bytes().await.unwrap();
        assert_eq!(body.as_ref(), &server.data[start..=end], "{range}");
    }
}

#[tokio::test]
async fn test_client_abandoning_stream_does_not_affect_others() {
    let server = RunningServer::start(4 * 1024 * 1024, 16 * 1024).await;
    let client = reqwest::Client::new();
    let url = server.url("/video/housing/clip.mp4");

    let mut abandoned = client.get(&url).send().await.unwrap();
    let first_chunk = abandoned.chunk().await.unwrap().unwrap();
    assert!(!first_chunk.is_empty());
    drop(abandoned);

    let response = client
        .get(&url)
        .header(RANGE, "bytes=1000-1999")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    let body = response.bytes().await.unwrap();
    assert_eq!(body.as_ref(), &server.data[1000..=1999]);
}

#[tokio::test]
async fn test_errors_over_tcp() {
    let server = RunningServer::start(1000, 64).await;
    let client = reqwest::Client::new();
    let url = server.url("/video/housing/clip.mp4");

    let response = client
        .get(&url)
        .header(RANGE, "bytes=1000-1050")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[CONTENT_RANGE], "bytes */1000");

    let response = client
        .get(server.url("/video/engine/clip.mp4"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["error"], "Category not found");
}
