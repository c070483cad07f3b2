//! Laboratory test metadata lookup.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::RecordError;
use crate::values::ReferenceRange;

/// Metadata for one laboratory test.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LabTestInfo {
    /// Display label; defaults to the lookup key
    #[serde(default)]
    pub label: Option<String>,

    /// Specimen fluid (e.g. "Blood", "Urine")
    pub fluid: String,

    /// Units appended to numeric results
    #[serde(default)]
    pub units: Option<String>,

    /// Default lower reference bound
    #[serde(default)]
    pub ref_range_lower: Option<f64>,

    /// Default upper reference bound
    #[serde(default)]
    pub ref_range_upper: Option<f64>,
}

impl LabTestInfo {
    pub fn new(fluid: impl Into<String>) -> Self {
        Self {
            fluid: fluid.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_units(mut self, units: impl Into<String>) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_range(mut self, lower: f64, upper: f64) -> Self {
        self.ref_range_lower = Some(lower);
        self.ref_range_upper = Some(upper);
        self
    }

    pub fn default_range(&self) -> ReferenceRange {
        ReferenceRange {
            lower: self.ref_range_lower,
            upper: self.ref_range_upper,
        }
    }
}

/// Lookup table keyed by test name. Read-only and shared for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabTestMapping {
    entries: HashMap<String, LabTestInfo>,
}

impl LabTestMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RecordError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| RecordError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents)
    }

    pub fn insert(&mut self, test: impl Into<String>, info: LabTestInfo) {
        self.entries.insert(test.into(), info);
    }

    pub fn with(mut self, test: impl Into<String>, info: LabTestInfo) -> Self {
        self.insert(test, info);
        self
    }

    pub fn get(&self, test: &str) -> Option<&LabTestInfo> {
        self.entries.get(test)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mapping() {
        let mapping = LabTestMapping::from_json(
            r#"{
                "White Blood Cells": {"fluid": "Blood", "units": "K/uL", "ref_range_lower": 4.0, "ref_range_upper": 11.0},
                "Urine Glucose": {"label": "Glucose", "fluid": "Urine"}
            }"#,
        )
        .unwrap();

        assert_eq!(mapping.len(), 2);
        let wbc = mapping.get("White Blood Cells").unwrap();
        assert_eq!(wbc.units.as_deref(), Some("K/uL"));
        assert_eq!(wbc.default_range().upper, Some(11.0));

        let glucose = mapping.get("Urine Glucose").unwrap();
        assert_eq!(glucose.label.as_deref(), Some("Glucose"));
        assert_eq!(glucose.units, None);
    }

    #[test]
    fn test_fluid_required() {
        assert!(LabTestMapping::from_json(r#"{"Lipase": {"units": "IU/L"}}"#).is_err());
    }
}
