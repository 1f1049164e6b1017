//! User entry and measurement record endpoints

use axum::Json;
use axum::extract::{Query, State};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vidserve_core::RecordError;
use vidserve_core::records::{RecordList, Registration};

use crate::server::AppState;

/// `{"status": ...}` acknowledgement body.
#[derive(Debug, Serialize)]
pub struct StatusMessage {
    /// Human-readable outcome
    pub status: &'static str,
}

impl StatusMessage {
    fn new(status: &'static str) -> Json<Self> {
        Json(Self { status })
    }
}

/// Query of `/user_entry/should_calibrate`.
#[derive(Debug, Deserialize)]
pub struct CalibrationQuery {
    /// User to check
    pub roll_number: String,
}

/// `{"should_calibrate": bool}` body.
#[derive(Debug, Serialize)]
pub struct CalibrationFlag {
    /// Whether the user must calibrate before measuring
    pub should_calibrate: bool,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Lists every user entry.
///
/// # Errors
///
/// - `RecordError::Io` / `RecordError::Csv` - Store unreadable (500)
pub async fn list_user_entries(State(state): State<AppState>) -> Result<Json<RecordList>, RecordError> {
    Ok(Json(state.records.users().await?))
}

/// Checks a user in, adding unknown users.
///
/// # Errors
///
/// - `RecordError::MissingField` - `roll_number` or `name` absent (400)
pub async fn add_user_entry(
    State(state): State<AppState>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Registration>, RecordError> {
    Ok(Json(state.records.register_user(&body, now()).await?))
}

/// Updates the given fields of one user entry.
///
/// # Errors
///
/// - `RecordError::MissingField` - `roll_number` absent (400)
/// - `RecordError::NotFound` - Unknown roll number (404)
pub async fn update_user_entry(
    State(state): State<AppState>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<StatusMessage>, RecordError> {
    state.records.update_user(&body).await?;
    Ok(StatusMessage::new("entry updated"))
}

/// Deletes every user entry.
///
/// # Errors
///
/// - `RecordError::Io` - Record file could not be removed (500)
pub async fn delete_user_entries(
    State(state): State<AppState>,
) -> Result<Json<StatusMessage>, RecordError> {
    state.records.clear_users().await?;
    Ok(StatusMessage::new("user_entry CSV deleted"))
}

/// Reports whether a user's calibration has gone stale.
///
/// # Errors
///
/// - `RecordError::Io` / `RecordError::Csv` - Store unreadable (500)
pub async fn should_calibrate(
    State(state): State<AppState>,
    Query(query): Query<CalibrationQuery>,
) -> Result<Json<CalibrationFlag>, RecordError> {
    let should_calibrate = state
        .records
        .should_calibrate(&query.roll_number, now())
        .await?;
    Ok(Json(CalibrationFlag { should_calibrate }))
}

/// Records one shaft measurement.
///
/// # Errors
///
/// - `RecordError::MissingField` - Any measurement column absent (400)
pub async fn add_shaft_measurement(
    State(state): State<AppState>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<StatusMessage>, RecordError> {
    state.records.add_shaft_measurement(&body).await?;
    Ok(StatusMessage::new("shaft measurement added"))
}

/// Lists every shaft measurement.
///
/// # Errors
///
/// - `RecordError::Io` / `RecordError::Csv` - Store unreadable (500)
pub async fn list_shaft_measurements(
    State(state): State<AppState>,
) -> Result<Json<RecordList>, RecordError> {
    Ok(Json(state.records.shaft_measurements().await?))
}

/// Updates the given fields of the measurement with a `product_id`.
///
/// # Errors
///
/// - `RecordError::MissingField` - `product_id` absent (400)
/// - `RecordError::NotFound` - Unknown product id (404)
pub async fn update_shaft_measurement(
    State(state): State<AppState>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<StatusMessage>, RecordError> {
    state.records.update_shaft_measurement(&body).await?;
    Ok(StatusMessage::new("shaft measurement updated"))
}

/// Deletes every shaft measurement.
///
/// # Errors
///
/// - `RecordError::Io` - Record file could not be removed (500)
pub async fn delete_shaft_measurements(
    State(state): State<AppState>,
) -> Result<Json<StatusMessage>, RecordError> {
    state.records.clear_shaft_measurements().await?;
    Ok(StatusMessage::new("measured_shafts CSV deleted"))
}

/// Records one housing measurement.
///
/// # Errors
///
/// - `RecordError::MissingField` - Any measurement column absent (400)
pub async fn add_housing_measurement(
    State(state): State<AppState>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<StatusMessage>, RecordError> {
    state.records.add_housing_measurement(&body).await?;
    Ok(StatusMessage::new("housing measurement added"))
}
