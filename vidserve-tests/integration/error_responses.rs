//! Requests rejected before any body byte is sent.

use axum::http::{StatusCode, header};

use crate::fixtures::{MediaFixture, body_bytes, header_str};

const CLIP: &str = "/video/housing/clip.mp4";

async fn error_message(response: axum::http::Response<axum::body::Body>) -> String {
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    json["error"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_range_past_end_is_not_satisfiable() {
    let fixture = MediaFixture::new(1000, 64);
    let response = fixture.get(CLIP, Some("bytes=1000-1050")).await;

    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(header_str(&response, header::CONTENT_RANGE), Some("bytes */1000"));
    assert_eq!(error_message(response).await, "Requested Range Not Satisfiable");
}

#[tokio::test]
async fn test_off_by_one_ranges_are_rejected() {
    let fixture = MediaFixture::new(1000, 64);

    for range in [
        "bytes=0-1000",
        "bytes=1000-",
        "bytes=999-1000",
        "bytes=500-499",
        "bytes=-1001",
    ] {
        let response = fixture.get(CLIP, Some(range)).await;
        assert_eq!(
            response.status(),
            StatusCode::RANGE_NOT_SATISFIABLE,
            "{range}"
        );
        assert!(body_bytes(response).await.len() < 100, "{range} leaked a body");
    }
}

#[tokio::test]
async fn test_non_numeric_range_is_bad_request() {
    let fixture = MediaFixture::new(1000, 64);
    let response = fixture.get(CLIP, Some("bytes=abc-xyz")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_message(response).await, "Invalid Range header");
}

#[tokio::test]
async fn test_multi_range_is_bad_request() {
    let fixture = MediaFixture::new(1000, 64);

    for range in ["bytes=0-10,20-30", "bytes=5", "pages=0-10", "bytes=-"] {
        let response = fixture.get(CLIP, Some(range)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{range}");
    }
}

#[tokio::test]
async fn test_unknown_category_is_not_found_regardless_of_range() {
    let fixture = MediaFixture::new(1000, 64);

    for range in [None, Some("bytes=0-10"), Some("bytes=abc-xyz"), Some("bytes=5000-")] {
        let response = fixture.get("/video/engine/clip.mp4", range).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{range:?}");
        assert_eq!(error_message(response).await, "Category not found");
    }
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let fixture = MediaFixture::new(1000, 64);
    let response = fixture.get("/video/housing/missing.mp4", Some("bytes=0-1")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_message(response).await, "File not found");
}

#[tokio::test]
async fn test_encoded_traversal_is_not_found() {
    let fixture = MediaFixture::new(1000, 64);
    std::fs::write(fixture.temp_dir.path().join("secret.txt"), b"top secret").unwrap();

    let response = fixture.get("/video/housing/..%2Fsecret.txt", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
