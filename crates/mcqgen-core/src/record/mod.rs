//! Admission records and their lookup tables.
//!
//! Records are kept as ordered JSON objects: composition adds text fields,
//! and the merged record is serialized verbatim into the prompt, so field
//! order must survive a load/merge/serialize cycle.

mod identifier;
mod lab_mapping;
mod store;

pub use identifier::{load_patient_list, PatientId};
pub use lab_mapping::{LabTestInfo, LabTestMapping};
pub use store::RecordStore;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::values::ReferenceRange;

/// Field holding the lab-results mapping (test name -> value).
pub const LABORATORY_TESTS: &str = "Laboratory Tests";

/// Per-test lower reference bounds.
pub const REFERENCE_RANGE_LOWER: &str = "Reference Range Lower";

/// Per-test upper reference bounds.
pub const REFERENCE_RANGE_UPPER: &str = "Reference Range Upper";

/// List of radiology reports.
pub const RADIOLOGY: &str = "Radiology";

/// Errors from loading records and lookup tables.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Expected a JSON object for {0}")]
    NotAnObject(String),
}

/// One patient's admission data.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdmissionRecord {
    fields: Map<String, Value>,
}

impl AdmissionRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build a record from a JSON value, which must be an object.
    pub fn from_value(value: Value, context: &str) -> Result<Self, RecordError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            _ => Err(RecordError::NotAnObject(context.to_string())),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Field names in record order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// The lab-results mapping, if the record has one.
    pub fn lab_results(&self) -> Option<&Map<String, Value>> {
        self.fields.get(LABORATORY_TESTS).and_then(Value::as_object)
    }

    /// Recorded value for one test.
    pub fn lab_value(&self, test: &str) -> Option<&Value> {
        self.lab_results().and_then(|labs| labs.get(test))
    }

    /// Record-specific reference bounds for one test. Missing or
    /// non-numeric bounds are `None`.
    pub fn reference_range(&self, test: &str) -> ReferenceRange {
        let bound = |field: &str| {
            self.fields
                .get(field)
                .and_then(Value::as_object)
                .and_then(|ranges| ranges.get(test))
                .and_then(crate::values::numeric_value)
        };

        ReferenceRange {
            lower: bound(REFERENCE_RANGE_LOWER),
            upper: bound(REFERENCE_RANGE_UPPER),
        }
    }

    /// Set a text field. Existing fields keep their position.
    pub fn set_text(&mut self, field: impl Into<String>, text: impl Into<String>) {
        self.fields.insert(field.into(), Value::String(text.into()));
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        // shift_remove keeps the remaining fields in order
        self.fields.shift_remove(field)
    }

    /// Compact JSON rendering used as the prompt payload.
    pub fn to_prompt_text(&self) -> String {
        Value::Object(self.fields.clone()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> AdmissionRecord {
        AdmissionRecord::from_value(
            json!({
                "Patient History": "RLQ pain",
                "Laboratory Tests": { "White Blood Cells": 17.1, "Lipase": "NEG." },
                "Reference Range Lower": { "White Blood Cells": 4.0, "Lipase": null },
                "Reference Range Upper": { "White Blood Cells": 10.0 },
                "Discharge Diagnosis": "Appendicitis"
            }),
            "test",
        )
        .unwrap()
    }

    #[test]
    fn test_non_object_rejected() {
        let result = AdmissionRecord::from_value(json!([1, 2]), "patient 1");
        assert!(matches!(result, Err(RecordError::NotAnObject(ctx)) if ctx == "patient 1"));
    }

    #[test]
    fn test_lab_lookup() {
        let record = record();
        assert_eq!(record.lab_value("White Blood Cells"), Some(&json!(17.1)));
        assert!(record.lab_value("Amylase").is_none());
    }

    #[test]
    fn test_reference_range_parsing() {
        let record = record();
        let wbc = record.reference_range("White Blood Cells");
        assert_eq!(wbc.lower, Some(4.0));
        assert_eq!(wbc.upper, Some(10.0));

        let lipase = record.reference_range("Lipase");
        assert_eq!(lipase.lower, None);
        assert_eq!(lipase.upper, None);
    }

    #[test]
    fn test_field_order_preserved() {
        let mut record = record();
        record.set_text("Laboratory Tests", "text");
        record.remove("Reference Range Lower");
        let names: Vec<&str> = record.field_names().collect();
        assert_eq!(
            names,
            vec![
                "Patient History",
                "Laboratory Tests",
                "Reference Range Upper",
                "Discharge Diagnosis"
            ]
        );
    }

    #[test]
    fn test_prompt_text_is_json() {
        let text = record().to_prompt_text();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["Discharge Diagnosis"], "Appendicitis");
    }
}
