//! Durable storage for the form data store.
//!
//! The whole store (every schema's tree) is written as one JSON document, the
//! on-disk analogue of a browser storage key. Callers treat persistence as a
//! convenience: the data store logs storage errors and carries on.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::serde::ts_seconds;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use schemaform_types::FormValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors surfaced by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O failure while reading or writing the storage file.
    #[error("form storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization or deserialization failure.
    #[error("form storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Snapshot of every schema's form data tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredForms {
    /// Trees keyed by schema name.
    pub forms: IndexMap<String, FormValue>,
    /// Last time the snapshot was written.
    #[serde(with = "ts_seconds", default = "Utc::now")]
    pub saved_at: DateTime<Utc>,
}

impl StoredForms {
    pub fn new(forms: IndexMap<String, FormValue>) -> Self {
        Self {
            forms,
            saved_at: Utc::now(),
        }
    }
}

/// Shared trait implemented by form storage backends.
pub trait FormStorage: Send + Sync {
    /// Read the last saved snapshot, if any.
    fn load(&self) -> Result<Option<StoredForms>, StorageError>;

    /// Replace the saved snapshot.
    fn save(&self, forms: &IndexMap<String, FormValue>) -> Result<(), StorageError>;

    /// Forget the saved snapshot.
    fn clear(&self) -> Result<(), StorageError>;
}

/// JSON-file storage backend.
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FormStorage for JsonFileStorage {
    fn load(&self) -> Result<Option<StoredForms>, StorageError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<StoredForms>(&content) {
                Ok(stored) => Ok(Some(stored)),
                Err(error) => {
                    warn!(path = %self.path.display(), error = %error, "Failed to parse saved form data; ignoring it");
                    Ok(None)
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(error) => Err(StorageError::Io(error)),
        }
    }

    fn save(&self, forms: &IndexMap<String, FormValue>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&StoredForms::new(forms.clone()))?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(StorageError::Io(error)),
        }
    }
}

/// In-memory storage backend primarily used for unit testing.
#[derive(Default)]
pub struct InMemoryStorage {
    snapshot: Mutex<Option<StoredForms>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FormStorage for InMemoryStorage {
    fn load(&self) -> Result<Option<StoredForms>, StorageError> {
        Ok(self.snapshot.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn save(&self, forms: &IndexMap<String, FormValue>) -> Result<(), StorageError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = Some(StoredForms::new(forms.clone()));
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn sample_forms() -> IndexMap<String, FormValue> {
        IndexMap::from([(
            "bike_shop".to_string(),
            FormValue::from_json(&json!({ "stores": [{ "name": "North" }] })),
        )])
    }

    #[test]
    fn in_memory_storage_round_trip() {
        let storage = InMemoryStorage::new();
        assert!(storage.load().unwrap().is_none());

        storage.save(&sample_forms()).unwrap();
        assert_eq!(storage.load().unwrap().unwrap().forms, sample_forms());

        storage.clear().unwrap();
        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn json_storage_persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("form_data.json");
        JsonFileStorage::new(&path).save(&sample_forms()).unwrap();

        let reloaded = JsonFileStorage::new(&path).load().unwrap().unwrap();
        assert_eq!(reloaded.forms, sample_forms());
    }

    #[test]
    fn invalid_json_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("form_data.json");
        fs::write(&path, "not json").unwrap();
        assert!(JsonFileStorage::new(&path).load().unwrap().is_none());
    }

    #[test]
    fn clearing_missing_file_is_not_an_error() {
        let dir = tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("form_data.json"));
        storage.clear().unwrap();
        storage.save(&sample_forms()).unwrap();
        storage.clear().unwrap();
        assert!(!storage.path().exists());
    }

    #[test]
    fn unwritable_location_reports_io_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let storage = JsonFileStorage::new(blocker.join("form_data.json"));
        assert!(matches!(storage.save(&sample_forms()), Err(StorageError::Io(_))));
    }
}
