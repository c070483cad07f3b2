//! On-disk record store: one JSON object per pathology, keyed by patient id.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{AdmissionRecord, RecordError};
use crate::evaluators::Pathology;

/// All admission records for one pathology label, in file order.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    ids: Vec<String>,
    records: HashMap<String, AdmissionRecord>,
}

impl RecordStore {
    /// Location of a pathology's record store inside `records_dir`.
    pub fn path_for(records_dir: impl AsRef<Path>, pathology: Pathology) -> PathBuf {
        records_dir
            .as_ref()
            .join(format!("{}_hadm_info_first_diag.json", pathology.as_str()))
    }

    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        let value: Value = serde_json::from_str(json)?;
        let Value::Object(entries) = value else {
            return Err(RecordError::NotAnObject("record store".to_string()));
        };

        let mut store = Self::default();
        for (id, record) in entries {
            let record = AdmissionRecord::from_value(record, &format!("patient {}", id))?;
            store.insert(id, record);
        }
        Ok(store)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| RecordError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let store = Self::from_json(&contents)?;
        tracing::debug!(path = %path.display(), records = store.len(), "Loaded record store");
        Ok(store)
    }

    /// Insert or replace a record. New ids go to the end of the order.
    pub fn insert(&mut self, id: impl Into<String>, record: AdmissionRecord) {
        let id = id.into();
        if self.records.insert(id.clone(), record).is_none() {
            self.ids.push(id);
        }
    }

    /// Patient ids in natural (file) order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn get(&self, id: &str) -> Option<&AdmissionRecord> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
