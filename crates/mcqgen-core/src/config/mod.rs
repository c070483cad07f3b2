//! Run configuration.
//!
//! A run is described by one YAML document (see `configs/config.yaml`).
//! Loading goes YAML -> overrides -> schema check -> typed config ->
//! normalisation, so every override is validated exactly like a value
//! written in the file.

mod overrides;
mod schema;

pub use overrides::{apply_overrides, Override};
pub use schema::validate_run_config;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compose::{FieldComposer, LabFormatOptions};
use crate::evaluators::Pathology;
use crate::record::PatientId;

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 2023;

/// Errors from loading a run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to convert config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config does not match schema:\n  {}", .0.join("\n  "))]
    Schema(Vec<String>),

    #[error("Invalid override: {0}")]
    InvalidOverride(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Layout of the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One `{"id", "pathology", "reply"}` object per line
    #[default]
    JsonLines,

    /// Comma-terminated JSON array fragments
    LegacyFragments,
}

/// LLM connection settings.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub base_url: Option<String>,

    /// Falls back to `OPENAI_API_KEY` when unset
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Humantime duration such as `"60s"`; unset means the client default
    pub request_timeout: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 1.0,
            base_url: None,
            api_key: None,
            request_timeout: None,
        }
    }
}

impl LlmSettings {
    pub fn request_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        self.request_timeout
            .as_deref()
            .map(|raw| {
                humantime::parse_duration(raw).map_err(|e| {
                    ConfigError::Invalid(format!("llm.request_timeout '{}': {}", raw, e))
                })
            })
            .transpose()
    }
}

impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Everything a batch run needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Evaluator pathology, used for every batch label
    pub pathology: Pathology,

    /// Batch labels, processed in order
    pub pathologies: Vec<Pathology>,

    pub records_dir: PathBuf,
    pub lab_test_mapping_path: PathBuf,
    pub patient_list_path: Option<PathBuf>,

    /// Resume point; patients before it are skipped
    pub first_patient: Option<PatientId>,

    /// Composition operation codes
    pub order: String,

    pub include_ref_range: bool,
    pub bin_lab_results: bool,
    pub bin_lab_results_abnormal: bool,
    pub only_abnormal_labs: bool,

    pub self_consistency: bool,
    pub save_probabilities: bool,
    pub seed: u64,

    pub output_path: PathBuf,
    pub output_format: OutputFormat,

    pub llm: LlmSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            pathology: Pathology::Appendicitis,
            pathologies: Pathology::ALL.to_vec(),
            records_dir: PathBuf::from("data"),
            lab_test_mapping_path: PathBuf::from("data/lab_test_mapping.json"),
            patient_list_path: None,
            first_patient: None,
            order: "l".to_string(),
            include_ref_range: false,
            bin_lab_results: false,
            bin_lab_results_abnormal: false,
            only_abnormal_labs: false,
            self_consistency: false,
            save_probabilities: false,
            seed: DEFAULT_SEED,
            output_path: PathBuf::from("output.jsonl"),
            output_format: OutputFormat::default(),
            llm: LlmSettings::default(),
        }
    }
}

impl RunConfig {
    /// Load a YAML file and apply overrides.
    pub fn load<S: AsRef<str>>(path: impl AsRef<Path>, overrides: &[S]) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "Loading run config");
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents, overrides)
    }

    /// Parse a YAML document and apply overrides.
    pub fn from_yaml_str<S: AsRef<str>>(yaml: &str, overrides: &[S]) -> Result<Self, ConfigError> {
        let mut document: serde_json::Value = if yaml.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_yaml::from_str(yaml)?
        };
        if document.is_null() {
            document = serde_json::Value::Object(serde_json::Map::new());
        }

        apply_overrides(&mut document, overrides)?;
        validate_run_config(&document).map_err(ConfigError::Schema)?;

        let mut config: RunConfig = serde_json::from_value(document)?;
        config.normalize()?;
        Ok(config)
    }

    /// Resolve dependent flags and reject inconsistent settings.
    pub fn normalize(&mut self) -> Result<(), ConfigError> {
        if self.self_consistency {
            self.save_probabilities = true;
        }

        FieldComposer::from_order(&self.order).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.llm.request_timeout()?;

        if self.pathologies.is_empty() {
            return Err(ConfigError::Invalid("pathologies must not be empty".to_string()));
        }
        if self.bin_lab_results_abnormal && !self.bin_lab_results {
            tracing::warn!("bin_lab_results_abnormal has no effect without bin_lab_results");
        }

        Ok(())
    }

    /// Seed forwarded to the provider. Self-consistency runs sample freely.
    pub fn sampling_seed(&self) -> Option<u64> {
        if self.self_consistency {
            None
        } else {
            Some(self.seed)
        }
    }

    pub fn lab_format_options(&self) -> LabFormatOptions {
        LabFormatOptions {
            include_ref_range: self.include_ref_range,
            bin_lab_results: self.bin_lab_results,
            bin_lab_results_abnormal: self.bin_lab_results_abnormal,
            only_abnormal_labs: self.only_abnormal_labs,
        }
    }

    pub fn composer(&self) -> Result<FieldComposer, ConfigError> {
        FieldComposer::from_order(&self.order).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
