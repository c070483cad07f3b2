//! # mcqgen-core
//!
//! Deterministic, LLM-free half of the question generator: turns a
//! patient's admission record into prompt-ready text.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: the same record, evaluator and options always
//!    compose to byte-identical text
//! 2. **No LLM calls**: nothing in this crate touches the network
//! 3. **Fresh evaluators**: every patient gets its own evaluator instance
//!
//! ## Example
//!
//! ```rust,ignore
//! use mcqgen_core::{load_evaluator, FieldComposer, LabTestMapping, RecordStore};
//!
//! let store = RecordStore::from_json_file("data/appendicitis_hadm_info_first_diag.json")?;
//! let mapping = LabTestMapping::from_json_file("data/lab_test_mapping.json")?;
//! let composer = FieldComposer::from_order("l")?;
//!
//! for id in store.ids() {
//!     let Some(record) = store.get(id) else { continue };
//!     let evaluator = load_evaluator("appendicitis")?;
//!     let composed = composer.compose(record, &*evaluator, &mapping, &Default::default())?;
//!     println!("{}", composed.record.to_prompt_text());
//! }
//! ```

pub mod compose;
pub mod config;
pub mod evaluators;
pub mod record;
pub mod values;

// Re-export main types at crate root
pub use compose::{
    Artifact, ComposedInput, Composition, CompositionError, FieldComposer, LabFormatOptions,
    Operation, RadiologyReport,
};
pub use config::{ConfigError, LlmSettings, OutputFormat, RunConfig};
pub use evaluators::{load_evaluator, Evaluator, EvaluatorError, LabCategory, Pathology};
pub use record::{
    load_patient_list, AdmissionRecord, LabTestInfo, LabTestMapping, PatientId, RecordError,
    RecordStore,
};
pub use values::{Abnormality, ReferenceRange};
