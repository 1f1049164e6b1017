//! CSV file implementation of [`RecordStore`].

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{Record, RecordError, RecordSchema, RecordStore};

/// One CSV file with a header row of the schema's columns.
///
/// Every operation reads or rewrites the whole file under a per-store
/// lock. Rewrites go through a temporary file and a rename.
#[derive(Debug)]
pub struct CsvRecordStore {
    schema: RecordSchema,
    path: PathBuf,
    lock: Mutex<()>,
}

impl CsvRecordStore {
    pub fn new(schema: RecordSchema, data_dir: &Path) -> Self {
        Self {
            schema,
            path: data_dir.join(schema.file_name),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_records(&self) -> Result<Vec<Record>, RecordError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(data.as_slice());
        let headers = reader.headers()?.clone();

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            records.push(
                headers
                    .iter()
                    .zip(row.iter())
                    .map(|(column, value)| (column.to_string(), value.to_string()))
                    .collect(),
            );
        }
        Ok(records)
    }

    async fn write_records(&self, records: &[Record]) -> Result<(), RecordError> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.schema.fields)?;
        for record in records {
            writer.write_record(
                self.schema
                    .fields
                    .iter()
                    .map(|field| record.get(*field).map(String::as_str).unwrap_or("")),
            )?;
        }
        let data = writer.into_inner().map_err(|e| e.into_error())?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = self.path.with_extension("csv.tmp");
        tokio::fs::write(&staging, data).await?;
        tokio::fs::rename(&staging, &self.path).await?;

        debug!("Wrote {} {} records", records.len(), self.schema.name);
        Ok(())
    }
}

#[async_trait]
impl RecordStore for CsvRecordStore {
    fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    async fn all(&self) -> Result<Vec<Record>, RecordError> {
        let _guard = self.lock.lock().await;
        self.read_records().await
    }

    async fn append(&self, record: Record) -> Result<(), RecordError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_records().await?;
        records.push(record);
        self.write_records(&records).await
    }

    async fn update(&self, key: &str, changes: &Record) -> Result<Record, RecordError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_records().await?;

        let key_column = self.schema.key;
        let record = records
            .iter_mut()
            .find(|r| r.get(key_column).map(String::as_str) == Some(key))
            .ok_or_else(|| RecordError::NotFound {
                key: key_column.to_string(),
                value: key.to_string(),
            })?;

        let previous = record.clone();
        for (column, value) in changes {
            if column != key_column && self.schema.fields.contains(&column.as_str()) {
                record.insert(column.clone(), value.clone());
            }
        }

        self.write_records(&records).await?;
        Ok(previous)
    }

    async fn clear(&self) -> Result<(), RecordError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::records::{SHAFT_MEASUREMENTS, USER_ENTRIES};

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = CsvRecordStore::new(USER_ENTRIES, &dir.path().join("nested"));

        assert!(store.all().await.unwrap().is_empty());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_append_writes_header_and_quotes() {
        let dir = TempDir::new().unwrap();
        let store = CsvRecordStore::new(USER_ENTRIES, &dir.path().join("nested"));

        store
            .append(record(&[("roll_number", "R1"), ("name", "Lovelace, Ada")]))
            .await
            .unwrap();

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(
            text,
            "roll_number,name,date,time,last_login\nR1,\"Lovelace, Ada\",,,\n"
        );

        let all = store.all().await.unwrap();
        assert_eq!(all[0]["name"], "Lovelace, Ada");
        assert_eq!(all[0]["date"], "");
    }

    #[tokio::test]
    async fn test_update_returns_previous_and_keeps_key() {
        let dir = TempDir::new().unwrap();
        let store = CsvRecordStore::new(SHAFT_MEASUREMENTS, dir.path());
        store
            .append(record(&[("product_id", "P-1"), ("shaft_height", "10")]))
            .await
            .unwrap();
        store
            .append(record(&[("product_id", "P-2"), ("shaft_height", "20")]))
            .await
            .unwrap();

        let previous = store
            .update(
                "P-2",
                &record(&[("product_id", "P-9"), ("shaft_height", "21"), ("bogus", "x")]),
            )
            .await
            .unwrap();
        assert_eq!(previous["shaft_height"], "20");

        let all = store.all().await.unwrap();
        assert_eq!(all[1]["product_id"], "P-2");
        assert_eq!(all[1]["shaft_height"], "21");
        assert!(!all[1].contains_key("bogus"));
        assert_eq!(all[0]["shaft_height"], "10");

        let err = store.update("P-404", &Record::new()).await.unwrap_err();
        assert!(matches!(err, RecordError::NotFound { value, .. } if value == "P-404"));
    }

    #[tokio::test]
    async fn test_reads_files_with_fewer_columns() {
        let dir = TempDir::new().unwrap();
        let store = CsvRecordStore::new(USER_ENTRIES, dir.path());
        std::fs::write(
            store.path(),
            "roll_number,name,date,time\nR1,Ada,2025-01-01,10:00:00\n",
        )
        .unwrap();

        let all = store.all().await.unwrap();
        assert_eq!(all[0]["time"], "10:00:00");
        assert!(!all[0].contains_key("last_login"));
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_all_kept() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(CsvRecordStore::new(SHAFT_MEASUREMENTS, dir.path()));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .append(record(&[("product_id", format!("P-{i}").as_str())]))
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.all().await.unwrap().len(), 16);
    }
}
