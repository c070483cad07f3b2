//! JSON Schema validation for run configurations.
//!
//! The schema ships with the repository at `schema/run_config.schema.json`
//! and is embedded at compile time.

use std::sync::OnceLock;

/// Embedded run configuration schema.
const RUN_CONFIG_SCHEMA_JSON: &str = include_str!("../../../../schema/run_config.schema.json");

/// Compiled validator, built on first use.
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

fn validator() -> Result<&'static jsonschema::Validator, String> {
    COMPILED_SCHEMA
        .get_or_init(|| {
            let schema: serde_json::Value = serde_json::from_str(RUN_CONFIG_SCHEMA_JSON)
                .map_err(|e| format!("Invalid schema JSON: {}", e))?;
            jsonschema::options()
                .build(&schema)
                .map_err(|e| format!("Failed to compile schema: {}", e))
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// Validate a configuration document.
///
/// Returns every violation, each suffixed with its instance path.
pub fn validate_run_config(document: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = validator().map_err(|e| vec![e])?;

    let errors: Vec<String> = validator
        .iter_errors(document)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_compiles() {
        assert!(validator().is_ok());
    }

    #[test]
    fn test_empty_document_is_valid() {
        assert!(validate_run_config(&json!({})).is_ok());
    }

    #[test]
    fn test_full_document_is_valid() {
        let doc = json!({
            "pathology": "appendicitis",
            "pathologies": ["appendicitis", "pancreatitis"],
            "records_dir": "data",
            "lab_test_mapping_path": "data/lab_test_mapping.json",
            "patient_list_path": null,
            "first_patient": 20043,
            "order": "li",
            "include_ref_range": true,
            "bin_lab_results": false,
            "bin_lab_results_abnormal": false,
            "only_abnormal_labs": false,
            "self_consistency": false,
            "save_probabilities": false,
            "seed": 2023,
            "output_path": "out.jsonl",
            "output_format": "legacy_fragments",
            "llm": { "model": "gpt-3.5-turbo", "temperature": 1.0, "request_timeout": "60s" }
        });
        assert_eq!(validate_run_config(&doc), Ok(()));
    }

    #[test]
    fn test_violations_reported_with_paths() {
        let doc = json!({
            "pathology": "gastritis",
            "order": "lx",
            "llm": { "temperature": 5 }
        });
        let errors = validate_run_config(&doc).unwrap_err();
        assert!(errors.iter().any(|e| e.ends_with("at /pathology")));
        assert!(errors.iter().any(|e| e.ends_with("at /order")));
        assert!(errors.iter().any(|e| e.ends_with("at /llm/temperature")));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(validate_run_config(&json!({ "ordr": "l" })).is_err());
    }
}
