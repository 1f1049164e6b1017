//! Successful full-content and partial-content responses.

use axum::http::{StatusCode, header};

use crate::fixtures::{MediaFixture, body_bytes, header_str};

const CLIP: &str = "/video/housing/clip.mp4";

#[tokio::test]
async fn test_full_file_without_range_header() {
    let fixture = MediaFixture::new(1000, 64);
    let response = fixture.get(CLIP, None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), Some("1000"));
    assert_eq!(header_str(&response, header::ACCEPT_RANGES), Some("bytes"));
    assert_eq!(header_str(&response, header::CONTENT_TYPE), Some("video/mp4"));
    assert!(response.headers().get(header::CONTENT_RANGE).is_none());

    assert_eq!(body_bytes(response).await, fixture.data);
}

#[tokio::test]
async fn test_middle_range_of_thousand_byte_file() {
    let fixture = MediaFixture::new(1000, 64);
    let response = fixture.get(CLIP, Some("bytes=100-199")).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        Some("bytes 100-199/1000")
    );
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), Some("100"));
    assert_eq!(header_str(&response, header::ACCEPT_RANGES), Some("bytes"));

    assert_eq!(body_bytes(response).await, &fixture.data[100..=199]);
}

#[tokio::test]
async fn test_first_byte_only() {
    let fixture = MediaFixture::new(1000, 64);
    let response = fixture.get(CLIP, Some("bytes=0-0")).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), Some("1"));
    assert_eq!(header_str(&response, header::CONTENT_RANGE), Some("bytes 0-0/1000"));
    assert_eq!(body_bytes(response).await, &fixture.data[..1]);
}

#[tokio::test]
async fn test_open_ended_last_byte() {
    let fixture = MediaFixture::new(1000, 64);
    let response = fixture.get(CLIP, Some("bytes=999-")).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), Some("1"));
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        Some("bytes 999-999/1000")
    );
    assert_eq!(body_bytes(response).await, &fixture.data[999..]);
}

#[tokio::test]
async fn test_omitted_start_covering_whole_file() {
    let fixture = MediaFixture::new(1000, 64);
    let response = fixture.get(CLIP, Some("bytes=-1000")).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header_str(&response, header::CONTENT_LENGTH), Some("1000"));
    assert_eq!(
        header_str(&response, header::CONTENT_RANGE),
        Some("bytes 0-999/1000")
    );
    assert_eq!(body_bytes(response).await, fixture.data);
}

#[tokio::test]
async fn test_ranges_across_chunk_boundaries() {
    let fixture = MediaFixture::new(4096, 100);

    for (start, end) in [(0, 99), (0, 100), (99, 100), (150, 3999), (4000, 4095), (1, 4094)] {
        let header = format!("bytes={start}-{end}");
        let response = fixture.get(CLIP, Some(&header)).await;

        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT, "{header}");
        let expected_len = (end - start + 1).to_string();
        assert_eq!(
            header_str(&response, header::CONTENT_LENGTH),
            Some(expected_len.as_str())
        );
        assert_eq!(body_bytes(response).await, &fixture.data[start..=end], "{header}");
    }
}

#[tokio::test]
async fn test_large_file_with_default_chunk_size() {
    let fixture = MediaFixture::new(3 * 1024 * 1024 + 17, 1024 * 1024);
    let response = fixture.get(CLIP, Some("bytes=1048570-2097160")).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_bytes(response).await, &fixture.data[1_048_570..=2_097_160]);
}

#[tokio::test]
async fn test_category_content_type_is_used() {
    let fixture = MediaFixture::new(10, 64);
    std::fs::write(fixture.temp_dir.path().join("shaft").join("clip.webm"), b"webm").unwrap();

    let response = fixture.get("/video/shaft/clip.webm", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, header::CONTENT_TYPE), Some("video/webm"));
    assert_eq!(body_bytes(response).await.as_ref(), b"webm");
}

#[tokio::test]
async fn test_file_growth_is_seen_by_next_request() {
    let fixture = MediaFixture::new(100, 64);
    let path = fixture.temp_dir.path().join("housing").join("clip.mp4");

    let first = fixture.get(CLIP, None).await;
    assert_eq!(header_str(&first, header::CONTENT_LENGTH), Some("100"));

    std::fs::write(&path, vec![9u8; 250]).unwrap();
    let second = fixture.get(CLIP, Some("bytes=200-")).await;
    assert_eq!(second.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(
        header_str(&second, header::CONTENT_RANGE),
        Some("bytes 200-249/250")
    );
}

#[tokio::test]
async fn test_listing_contains_served_file() {
    let fixture = MediaFixture::new(10, 64);
    let response = fixture.get("/video/list/housing", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let files: Vec<String> = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(files, vec!["clip.mp4".to_string()]);
}
