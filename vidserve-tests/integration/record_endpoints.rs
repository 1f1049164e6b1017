//! User entry and measurement endpoints backed by CSV files.

use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::fixtures::{MediaFixture, body_bytes, send_json};

#[tokio::test]
async fn test_user_check_in_flow() {
    let fixture = MediaFixture::new(10, 64);

    let (status, json) = send_json(&fixture, Method::GET, "/user_entry", json!(null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "no records found", "data": []}));

    let user = json!({"roll_number": "R7", "name": "Ada"});
    let (status, json) = send_json(&fixture, Method::POST, "/user_entry", user.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "entry added", "should_calibrate": true}));

    let (_, json) = send_json(&fixture, Method::POST, "/user_entry", user).await;
    assert_eq!(json, json!({"status": "welcome_back", "should_calibrate": false}));

    let (_, json) = send_json(&fixture, Method::GET, "/user_entry", json!(null)).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["name"], "Ada");
    assert!(json["data"][0]["last_login"].as_str().unwrap().contains('T'));

    assert!(fixture.temp_dir.path().join("logs").join("user_entry.csv").exists());
}

#[tokio::test]
async fn test_should_calibrate_query() {
    let fixture = MediaFixture::new(10, 64);

    let uri = "/user_entry/should_calibrate?roll_number=R7";
    let (status, json) = send_json(&fixture, Method::GET, uri, json!(null)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"should_calibrate": true}));

    send_json(
        &fixture,
        Method::POST,
        "/user_entry",
        json!({"roll_number": "R7", "name": "Ada"}),
    )
    .await;
    let (_, json) = send_json(&fixture, Method::GET, uri, json!(null)).await;
    assert_eq!(json, json!({"should_calibrate": false}));
}

#[tokio::test]
async fn test_should_calibrate_requires_roll_number() {
    let fixture = MediaFixture::new(10, 64);
    let response = fixture.get("/user_entry/should_calibrate", None).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    body_bytes(response).await;
}

#[tokio::test]
async fn test_user_validation_and_update() {
    let fixture = MediaFixture::new(10, 64);

    let (status, json) =
        send_json(&fixture, Method::POST, "/user_entry", json!({"roll_number": "R1"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing field: name");

    let (status, _) = send_json(
        &fixture,
        Method::PUT,
        "/user_entry",
        json!({"roll_number": "R1", "name": "Grace"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    send_json(
        &fixture,
        Method::POST,
        "/user_entry",
        json!({"roll_number": "R1", "name": "Ada", "date": "2024-12-01"}),
    )
    .await;
    let (status, json) = send_json(
        &fixture,
        Method::PUT,
        "/user_entry",
        json!({"roll_number": "R1", "name": "Grace"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "entry updated"}));

    let (_, json) = send_json(&fixture, Method::GET, "/user_entry", json!(null)).await;
    assert_eq!(json["data"][0]["name"], "Grace");
    assert_eq!(json["data"][0]["date"], "2024-12-01");

    let (_, json) = send_json(&fixture, Method::DELETE, "/user_entry", json!(null)).await;
    assert_eq!(json, json!({"status": "user_entry CSV deleted"}));
    let (_, json) = send_json(&fixture, Method::GET, "/user_entry", json!(null)).await;
    assert_eq!(json["data"], json!([]));
}

#[tokio::test]
async fn test_shaft_measurement_endpoints() {
    let fixture = MediaFixture::new(10, 64);

    let (status, json) = send_json(
        &fixture,
        Method::POST,
        "/shaft_measurement",
        json!({"product_id": "S-1", "roll_number": "R1", "shaft_height": 40.5}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Missing field: shaft_radius");

    let (status, json) = send_json(
        &fixture,
        Method::POST,
        "/shaft_measurement",
        json!({"product_id": "S-1", "roll_number": "R1", "shaft_height": 40.5, "shaft_radius": 6}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "shaft measurement added"}));

    let (status, json) = send_json(
        &fixture,
        Method::PUT,
        "/shaft_measurement",
        json!({"product_id": "S-1", "shaft_radius": 6.25}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "shaft measurement updated"}));

    let (_, json) = send_json(&fixture, Method::GET, "/shaft_measurement", json!(null)).await;
    assert_eq!(
        json["data"],
        json!([{"product_id": "S-1", "roll_number": "R1", "shaft_height": "40.5", "shaft_radius": "6.25"}])
    );

    let (_, json) =
        send_json(&fixture, Method::DELETE, "/clear_measured_shafts", json!(null)).await;
    assert_eq!(json, json!({"status": "measured_shafts CSV deleted"}));
    let (_, json) = send_json(&fixture, Method::GET, "/shaft_measurement", json!(null)).await;
    assert_eq!(json["status"], "no records found");
}

#[tokio::test]
async fn test_housing_measurement_endpoint() {
    let fixture = MediaFixture::new(10, 64);

    let (status, json) = send_json(
        &fixture,
        Method::POST,
        "/housing_measurement",
        json!({
            "product_id": "H-1",
            "roll_number": "R1",
            "housing_height": 12,
            "housing_radius": 4,
            "housing_depth": 9,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"status": "housing measurement added"}));

    let csv = std::fs::read_to_string(
        fixture.temp_dir.path().join("logs").join("measured_housings.csv"),
    )
    .unwrap();
    assert_eq!(
        csv,
        "product_id,roll_number,housing_height,housing_radius,housing_depth\nH-1,R1,12,4,9\n"
    );
}
