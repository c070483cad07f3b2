//! Patient identifiers.
//!
//! Admission identifiers are numeric in the source data but are keys of a
//! JSON object in the record store, so they are normalised to strings
//! wherever they enter the system (patient lists, resume points).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer};

use super::RecordError;

/// Identifier as written in a config file or patient list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawIdentifier {
    Text(String),
    Number(serde_json::Number),
}

impl From<RawIdentifier> for String {
    fn from(raw: RawIdentifier) -> Self {
        match raw {
            RawIdentifier::Text(text) => text,
            RawIdentifier::Number(number) => number.to_string(),
        }
    }
}

/// A patient identifier, accepting either a string or a number on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct PatientId(pub String);

impl<'de> Deserialize<'de> for PatientId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawIdentifier::deserialize(deserializer).map(|raw| PatientId(raw.into()))
    }
}

impl PatientId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PatientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Load an explicit patient list (a JSON array of identifiers).
pub fn load_patient_list(path: impl AsRef<Path>) -> Result<Vec<String>, RecordError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| RecordError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_patient_list(&contents)
}

pub(crate) fn parse_patient_list(json: &str) -> Result<Vec<String>, RecordError> {
    let ids: Vec<PatientId> = serde_json::from_str(json)?;
    Ok(ids.into_iter().map(|id| id.0).collect())
}
