//! Flat-file record storage for user entries and part measurements.
//!
//! Each record kind lives in its own CSV file with a fixed column set and
//! one key column. Records are kept as string maps; JSON scalars are
//! stringified on the way in, unknown fields are dropped.

pub mod calibration;
pub mod csv_store;

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub use calibration::needs_calibration;
pub use csv_store::CsvRecordStore;

use crate::config::RecordsConfig;

/// One row, column name to value.
pub type Record = BTreeMap<String, String>;

/// Column layout of one record file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSchema {
    /// Logical name, used in log lines and status messages
    pub name: &'static str,
    pub file_name: &'static str,
    /// Columns in file order
    pub fields: &'static [&'static str],
    /// Column identifying a record for updates
    pub key: &'static str,
    /// Columns a new record must carry
    pub required: &'static [&'static str],
}

pub const USER_ENTRIES: RecordSchema = RecordSchema {
    name: "user_entry",
    file_name: "user_entry.csv",
    fields: &["roll_number", "name", "date", "time", "last_login"],
    key: "roll_number",
    required: &["roll_number", "name"],
};

pub const SHAFT_MEASUREMENTS: RecordSchema = RecordSchema {
    name: "measured_shafts",
    file_name: "measured_shafts.csv",
    fields: &["product_id", "roll_number", "shaft_height", "shaft_radius"],
    key: "product_id",
    required: &["product_id", "roll_number", "shaft_height", "shaft_radius"],
};

pub const HOUSING_MEASUREMENTS: RecordSchema = RecordSchema {
    name: "measured_housings",
    file_name: "measured_housings.csv",
    fields: &[
        "product_id",
        "roll_number",
        "housing_height",
        "housing_radius",
        "housing_depth",
    ],
    key: "product_id",
    required: &[
        "product_id",
        "roll_number",
        "housing_height",
        "housing_radius",
        "housing_depth",
    ],
};

impl RecordSchema {
    /// Keeps the schema's columns from a JSON object body.
    ///
    /// # Errors
    ///
    /// - `RecordError::InvalidValue` - A schema column holds an array or object
    pub fn record_from_json(&self, body: &Map<String, Value>) -> Result<Record, RecordError> {
        let mut record = Record::new();
        for field in self.fields {
            let value = match body.get(*field) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) => s.clone(),
                Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
                Some(_) => {
                    return Err(RecordError::InvalidValue {
                        field: field.to_string(),
                    });
                }
            };
            record.insert(field.to_string(), value);
        }
        Ok(record)
    }

    /// # Errors
    ///
    /// - `RecordError::MissingField` - First required column absent from `record`
    pub fn check_required(&self, record: &Record) -> Result<(), RecordError> {
        match self.required.iter().find(|f| !record.contains_key(**f)) {
            Some(field) => Err(RecordError::MissingField {
                field: field.to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Whole-file record operations keyed by the schema's key column.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn schema(&self) -> &RecordSchema;

    /// Every stored record in file order; empty if the file does not exist.
    async fn all(&self) -> Result<Vec<Record>, RecordError>;

    /// Adds one record at the end.
    async fn append(&self, record: Record) -> Result<(), RecordError>;

    /// Overwrites the columns present in `changes` on the first record whose
    /// key column equals `key`. Returns the record as it was before.
    ///
    /// # Errors
    ///
    /// - `RecordError::NotFound` - No record carries `key`
    async fn update(&self, key: &str, changes: &Record) -> Result<Record, RecordError>;

    /// Removes every record.
    async fn clear(&self) -> Result<(), RecordError>;
}

/// Body of the list endpoints.
#[derive(Debug, Serialize)]
pub struct RecordList {
    pub status: &'static str,
    pub data: Vec<Record>,
}

impl From<Vec<Record>> for RecordList {
    fn from(data: Vec<Record>) -> Self {
        let status = if data.is_empty() {
            "no records found"
        } else {
            "success"
        };
        Self { status, data }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegistrationStatus {
    #[serde(rename = "entry added")]
    Added,
    #[serde(rename = "welcome_back")]
    WelcomeBack,
}

/// Outcome of a user check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub status: RegistrationStatus,
    pub should_calibrate: bool,
}

/// User and measurement bookkeeping over three record stores.
#[derive(Clone)]
pub struct RecordService {
    users: Arc<dyn RecordStore>,
    shafts: Arc<dyn RecordStore>,
    housings: Arc<dyn RecordStore>,
    calibration_window: Duration,
    registration: Arc<Mutex<()>>,
}

impl std::fmt::Debug for RecordService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordService")
            .field("calibration_window", &self.calibration_window)
            .finish_non_exhaustive()
    }
}

impl RecordService {
    /// CSV-backed stores under the configured data directory.
    pub fn new(config: &RecordsConfig) -> Self {
        Self::with_stores(
            Arc::new(CsvRecordStore::new(USER_ENTRIES, &config.data_dir)),
            Arc::new(CsvRecordStore::new(SHAFT_MEASUREMENTS, &config.data_dir)),
            Arc::new(CsvRecordStore::new(HOUSING_MEASUREMENTS, &config.data_dir)),
            config.calibration_window,
        )
    }

    pub fn with_stores(
        users: Arc<dyn RecordStore>,
        shafts: Arc<dyn RecordStore>,
        housings: Arc<dyn RecordStore>,
        calibration_window: Duration,
    ) -> Self {
        Self {
            users,
            shafts,
            housings,
            calibration_window,
            registration: Arc::new(Mutex::new(())),
        }
    }

    pub async fn users(&self) -> Result<RecordList, RecordError> {
        Ok(self.users.all().await?.into())
    }

    /// Checks a user in: known users get `last_login` refreshed, new users
    /// are appended with `date`/`time` defaulting to `now`.
    ///
    /// The calibration flag is computed from the login stored before this
    /// check-in, so a returning user inside the window is not asked again.
    ///
    /// # Errors
    ///
    /// - `RecordError::MissingField` - `roll_number` or `name` absent
    /// - `RecordError::Io` / `RecordError::Csv` - Store unreadable or unwritable
    pub async fn register_user(
        &self,
        body: &Map<String, Value>,
        now: NaiveDateTime,
    ) -> Result<Registration, RecordError> {
        let mut entry = USER_ENTRIES.record_from_json(body)?;
        USER_ENTRIES.check_required(&entry)?;
        let roll_number = entry[USER_ENTRIES.key].clone();
        let stamp = login_stamp(now);

        let _guard = self.registration.lock().await;
        let changes = Record::from([("last_login".to_string(), stamp.clone())]);
        match self.users.update(&roll_number, &changes).await {
            Ok(previous) => {
                let should_calibrate = needs_calibration(
                    previous.get("last_login").map(String::as_str),
                    now,
                    self.calibration_window,
                );
                info!("User {} checked in again", roll_number);
                Ok(Registration {
                    status: RegistrationStatus::WelcomeBack,
                    should_calibrate,
                })
            }
            Err(RecordError::NotFound { .. }) => {
                entry
                    .entry("date".to_string())
                    .or_insert_with(|| now.format("%Y-%m-%d").to_string());
                entry
                    .entry("time".to_string())
                    .or_insert_with(|| now.format("%H:%M:%S").to_string());
                entry.insert("last_login".to_string(), stamp);
                self.users.append(entry).await?;
                info!("User {} added", roll_number);
                Ok(Registration {
                    status: RegistrationStatus::Added,
                    should_calibrate: true,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// True for unknown users and users whose last login is missing,
    /// unparseable or older than the calibration window.
    pub async fn should_calibrate(
        &self,
        roll_number: &str,
        now: NaiveDateTime,
    ) -> Result<bool, RecordError> {
        let users = self.users.all().await?;
        let last_login = users
            .iter()
            .find(|u| u.get(USER_ENTRIES.key).map(String::as_str) == Some(roll_number))
            .map(|u| u.get("last_login").map(String::as_str));

        let flag = match last_login {
            Some(last_login) => needs_calibration(last_login, now, self.calibration_window),
            None => true,
        };
        debug!("should_calibrate({}) = {}", roll_number, flag);
        Ok(flag)
    }

    /// # Errors
    ///
    /// - `RecordError::MissingField` - `roll_number` absent
    /// - `RecordError::NotFound` - No user with that roll number
    pub async fn update_user(&self, body: &Map<String, Value>) -> Result<(), RecordError> {
        update_by_key(self.users.as_ref(), body).await
    }

    pub async fn clear_users(&self) -> Result<(), RecordError> {
        self.users.clear().await
    }

    /// # Errors
    ///
    /// - `RecordError::MissingField` - Any measurement column absent
    pub async fn add_shaft_measurement(&self, body: &Map<String, Value>) -> Result<(), RecordError> {
        append_checked(self.shafts.as_ref(), body).await
    }

    pub async fn shaft_measurements(&self) -> Result<RecordList, RecordError> {
        Ok(self.shafts.all().await?.into())
    }

    /// # Errors
    ///
    /// - `RecordError::MissingField` - `product_id` absent
    /// - `RecordError::NotFound` - No measurement with that product id
    pub async fn update_shaft_measurement(
        &self,
        body: &Map<String, Value>,
    ) -> Result<(), RecordError> {
        update_by_key(self.shafts.as_ref(), body).await
    }

    pub async fn clear_shaft_measurements(&self) -> Result<(), RecordError> {
        self.shafts.clear().await
    }

    /// # Errors
    ///
    /// - `RecordError::MissingField` - Any measurement column absent
    pub async fn add_housing_measurement(
        &self,
        body: &Map<String, Value>,
    ) -> Result<(), RecordError> {
        append_checked(self.housings.as_ref(), body).await
    }
}

/// Timestamp format of `last_login`, microsecond ISO 8601 without zone.
fn login_stamp(now: NaiveDateTime) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

async fn append_checked(store: &dyn RecordStore, body: &Map<String, Value>) -> Result<(), RecordError> {
    let schema = store.schema();
    let record = schema.record_from_json(body)?;
    schema.check_required(&record)?;
    store.append(record).await?;
    info!("Added {} record", schema.name);
    Ok(())
}

async fn update_by_key(store: &dyn RecordStore, body: &Map<String, Value>) -> Result<(), RecordError> {
    let schema = store.schema();
    let mut changes = schema.record_from_json(body)?;
    let key = changes
        .remove(schema.key)
        .ok_or_else(|| RecordError::MissingField {
            field: schema.key.to_string(),
        })?;

    store.update(&key, &changes).await?;
    info!("Updated {} record {}", schema.name, key);
    Ok(())
}

/// Errors raised by record stores and the bookkeeping built on them.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Missing field: {field}")]
    MissingField { field: String },

    #[error("Field {field} must be a string, number or boolean")]
    InvalidValue { field: String },

    #[error("Entry with given {key} not found")]
    NotFound { key: String, value: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RecordError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RecordError::MissingField { .. } | RecordError::InvalidValue { .. } => {
                StatusCode::BAD_REQUEST
            }
            RecordError::NotFound { .. } => StatusCode::NOT_FOUND,
            RecordError::Csv(_) | RecordError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RecordError {
    fn into_response(self) -> Response {
        let message = match &self {
            RecordError::Csv(_) | RecordError::Io(_) => {
                tracing::error!("Record store failure: {}", self);
                "Error accessing records".to_string()
            }
            other => other.to_string(),
        };
        (self.status_code(), Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeDelta};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn service(dir: &TempDir) -> RecordService {
        RecordService::new(&RecordsConfig {
            data_dir: dir.path().to_path_buf(),
            calibration_window: Duration::from_secs(24 * 3600),
        })
    }

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_micro_opt(12, 0, 0, 250)
            .unwrap()
    }

    #[test]
    fn test_record_from_json_stringifies_scalars() {
        let record = SHAFT_MEASUREMENTS
            .record_from_json(&body(json!({
                "product_id": "P-1",
                "roll_number": 42,
                "shaft_height": 12.5,
                "shaft_radius": null,
                "operator": "ignored",
            })))
            .unwrap();

        assert_eq!(record["roll_number"], "42");
        assert_eq!(record["shaft_height"], "12.5");
        assert!(!record.contains_key("shaft_radius"));
        assert!(!record.contains_key("operator"));

        let err = SHAFT_MEASUREMENTS.check_required(&record).unwrap_err();
        assert!(matches!(err, RecordError::MissingField { field } if field == "shaft_radius"));

        let err = USER_ENTRIES
            .record_from_json(&body(json!({"roll_number": [1, 2]})))
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_new_user_is_added_and_must_calibrate() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let registration = service
            .register_user(&body(json!({"roll_number": "R1", "name": "Ada"})), noon())
            .await
            .unwrap();
        assert_eq!(registration.status, RegistrationStatus::Added);
        assert!(registration.should_calibrate);

        let users = service.users().await.unwrap();
        assert_eq!(users.status, "success");
        assert_eq!(users.data[0]["date"], "2025-03-14");
        assert_eq!(users.data[0]["time"], "12:00:00");
        assert_eq!(users.data[0]["last_login"], "2025-03-14T12:00:00.000250");
    }

    #[tokio::test]
    async fn test_returning_user_within_window() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let user = body(json!({"roll_number": "R1", "name": "Ada"}));

        service.register_user(&user, noon()).await.unwrap();
        let again = service
            .register_user(&user, noon() + TimeDelta::hours(3))
            .await
            .unwrap();

        assert_eq!(again.status, RegistrationStatus::WelcomeBack);
        assert!(!again.should_calibrate);
        assert_eq!(service.users().await.unwrap().data.len(), 1);
    }

    #[tokio::test]
    async fn test_returning_user_after_window_must_recalibrate() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let user = body(json!({"roll_number": "R1", "name": "Ada"}));

        service.register_user(&user, noon()).await.unwrap();
        let later = noon() + TimeDelta::hours(25);
        let again = service.register_user(&user, later).await.unwrap();
        assert!(again.should_calibrate);

        // The check-in refreshed last_login.
        assert!(!service.should_calibrate("R1", later).await.unwrap());
    }

    #[tokio::test]
    async fn test_should_calibrate() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        assert!(service.should_calibrate("R1", noon()).await.unwrap());

        service
            .register_user(&body(json!({"roll_number": "R1", "name": "Ada"})), noon())
            .await
            .unwrap();
        assert!(!service.should_calibrate("R1", noon() + TimeDelta::hours(24)).await.unwrap());
        assert!(
            service
                .should_calibrate("R1", noon() + TimeDelta::hours(24) + TimeDelta::seconds(1))
                .await
                .unwrap()
        );
        assert!(service.should_calibrate("R2", noon()).await.unwrap());
    }

    #[tokio::test]
    async fn test_user_registration_requires_name() {
        let dir = TempDir::new().unwrap();
        let err = service(&dir)
            .register_user(&body(json!({"roll_number": "R1"})), noon())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Missing field: name");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_update_user() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        service
            .register_user(&body(json!({"roll_number": "R1", "name": "Ada"})), noon())
            .await
            .unwrap();

        service
            .update_user(&body(json!({"roll_number": "R1", "name": "Grace"})))
            .await
            .unwrap();
        assert_eq!(service.users().await.unwrap().data[0]["name"], "Grace");

        let err = service
            .update_user(&body(json!({"roll_number": "R9", "name": "Nobody"})))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Entry with given roll_number not found");

        let err = service
            .update_user(&body(json!({"name": "Nobody"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing field: roll_number");
    }

    #[tokio::test]
    async fn test_shaft_measurements_lifecycle() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        assert_eq!(service.shaft_measurements().await.unwrap().status, "no records found");

        let shaft = body(json!({
            "product_id": "P-1",
            "roll_number": "R1",
            "shaft_height": 10,
            "shaft_radius": 2.5,
        }));
        service.add_shaft_measurement(&shaft).await.unwrap();
        service
            .update_shaft_measurement(&body(json!({"product_id": "P-1", "shaft_height": 11})))
            .await
            .unwrap();

        let list = service.shaft_measurements().await.unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0]["shaft_height"], "11");
        assert_eq!(list.data[0]["shaft_radius"], "2.5");

        service.clear_shaft_measurements().await.unwrap();
        assert!(service.shaft_measurements().await.unwrap().data.is_empty());
    }

    #[tokio::test]
    async fn test_housing_measurement_requires_every_column() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let err = service
            .add_housing_measurement(&body(json!({
                "product_id": "H-1",
                "roll_number": "R1",
                "housing_height": 4,
                "housing_radius": 1,
            })))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing field: housing_depth");

        service
            .add_housing_measurement(&body(json!({
                "product_id": "H-1",
                "roll_number": "R1",
                "housing_height": 4,
                "housing_radius": 1,
                "housing_depth": 3,
            })))
            .await
            .unwrap();
        assert!(dir.path().join(HOUSING_MEASUREMENTS.file_name).exists());
    }
}
