//! Batch runner: every configured pathology label, every patient, in order.

use std::path::PathBuf;
use std::sync::Arc;

use mcqgen_core::{
    load_evaluator, load_patient_list, FieldComposer, LabFormatOptions, LabTestMapping, Pathology,
    RecordStore, RunConfig,
};
use tracing::{debug, info, warn};

use crate::generation::{GenerationClient, GenerationOutcome};
use crate::providers::{provider_config, CompletionConfig, LlmProvider, ProviderRegistry};
use crate::sink::OutputSink;
use crate::summary::RunSummary;
use crate::RuntimeError;

/// Patients to process for one label, honouring an override list and a
/// resume point.
///
/// `first_patient` is inclusive. When it never occurs, nothing is left to
/// process.
pub fn patient_order(
    store_ids: &[String],
    patient_list: Option<&[String]>,
    first_patient: Option<&str>,
) -> Vec<String> {
    let ids = patient_list.unwrap_or(store_ids);
    match first_patient {
        Some(first) => ids
            .iter()
            .skip_while(|id| id.as_str() != first)
            .cloned()
            .collect(),
        None => ids.to_vec(),
    }
}

/// Drives the whole run.
pub struct BatchRunner {
    config: RunConfig,
    composer: FieldComposer,
    options: LabFormatOptions,
    mapping: LabTestMapping,
    patient_list: Option<Vec<String>>,
    client: GenerationClient,
}

impl BatchRunner {
    /// Build everything a run needs from its configuration.
    pub fn new(config: RunConfig, registry: &ProviderRegistry) -> Result<Self, RuntimeError> {
        let provider = registry.create(&config.llm.provider, &provider_config(&config.llm))?;
        let mapping = LabTestMapping::from_json_file(&config.lab_test_mapping_path)?;
        let sink = OutputSink::open(&config.output_path, config.output_format)?;
        Self::from_parts(config, provider, mapping, Arc::new(sink))
    }

    /// Assemble a runner from already-built parts.
    pub fn from_parts(
        config: RunConfig,
        provider: Arc<dyn LlmProvider>,
        mapping: LabTestMapping,
        sink: Arc<OutputSink>,
    ) -> Result<Self, RuntimeError> {
        let composer = config.composer()?;
        let options = config.lab_format_options();
        let patient_list = config
            .patient_list_path
            .as_deref()
            .map(load_patient_list)
            .transpose()?;
        let completion = CompletionConfig::from_run_config(&config)?;

        // Fail before any call when the evaluator pathology is unusable.
        load_evaluator(config.pathology.as_str())?;

        Ok(Self {
            config,
            composer,
            options,
            mapping,
            patient_list,
            client: GenerationClient::new(provider, completion, sink),
        })
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// Process every label. Only a missing store or a sink failure aborts.
    pub async fn run(&mut self) -> Result<RunSummary, RuntimeError> {
        let mut summary = RunSummary::start();
        info!(
            pathologies = ?self.config.pathologies,
            evaluator = %self.config.pathology,
            order = %self.config.order,
            provider = self.client.provider_name(),
            model = %self.client.config().model,
            "Starting run"
        );

        let labels = self.config.pathologies.clone();
        for label in labels {
            let store = RecordStore::from_json_file(RecordStore::path_for(
                &self.config.records_dir,
                label,
            ))?;
            self.run_label(label, &store, &mut summary).await?;
        }

        summary.finish();
        summary.log();
        Ok(summary)
    }

    async fn run_label(
        &mut self,
        label: Pathology,
        store: &RecordStore,
        summary: &mut RunSummary,
    ) -> Result<(), RuntimeError> {
        let ids = patient_order(
            store.ids(),
            self.patient_list.as_deref(),
            self.config.first_patient.as_ref().map(|id| id.as_str()),
        );
        let skipped = self.patient_list.as_ref().map_or(store.len(), Vec::len) - ids.len();
        if skipped > 0 {
            debug!(pathology = %label, skipped, "Resuming after skipped patients");
        }

        info!(pathology = %label, patients = ids.len(), "Starting batch");
        let before = summary.clone();

        for id in &ids {
            let Some(record) = store.get(id) else {
                warn!(pathology = %label, patient_id = %id, "Patient not in record store, skipping");
                summary.missing_records += 1;
                continue;
            };

            let composed = {
                let evaluator = load_evaluator(self.config.pathology.as_str())?;
                self.composer
                    .compose(record, &*evaluator, &self.mapping, &self.options)
            };
            let composition = match composed {
                Ok(composition) => composition,
                Err(e) => {
                    warn!(pathology = %label, patient_id = %id, error = %e, "Composition failed, skipping");
                    summary.composition_failures += 1;
                    continue;
                }
            };

            debug!(pathology = %label, patient_id = %id, "Processing patient");
            match self.client.generate(id, label, &composition.record).await? {
                GenerationOutcome::Generated { usage, model, .. } => {
                    summary.record_success(&usage, &model)
                }
                GenerationOutcome::Failed { index, kind, .. } => summary.record_failure(index, kind),
            }
        }

        info!(
            pathology = %label,
            succeeded = summary.succeeded - before.succeeded,
            failed = summary.failed - before.failed,
            "Finished batch"
        );
        Ok(())
    }
}

impl std::fmt::Debug for BatchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchRunner")
            .field("pathologies", &self.config.pathologies)
            .field("composer", &self.composer)
            .field("client", &self.client)
            .finish()
    }
}

/// Check that every record store a run would read exists.
pub fn missing_record_stores(config: &RunConfig) -> Vec<PathBuf> {
    config
        .pathologies
        .iter()
        .map(|label| RecordStore::path_for(&config.records_dir, *label))
        .filter(|path| !path.exists())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionResponse, ProviderError, TokenUsage};
    use crate::sink::read_json_lines;
    use async_trait::async_trait;
    use mcqgen_core::OutputFormat;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::fs;
    use std::path::Path;

    /// Fails for any prompt containing `fail_marker`, echoes otherwise.
    struct EchoProvider {
        fail_marker: &'static str,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            let prompt = messages[1].content.clone();
            self.prompts.lock().push(prompt.clone());
            if prompt.contains(self.fail_marker) {
                return Err(ProviderError::ServiceUnavailable {
                    status: 503,
                    message: "overloaded".to_string(),
                });
            }
            Ok(CompletionResponse {
                content: format!("reply-{}", self.prompts.lock().len()),
                usage: TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 20,
                },
                model: "echo".to_string(),
                finish_reason: None,
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    fn write_store(dir: &Path, label: Pathology, records: serde_json::Value) {
        fs::write(
            RecordStore::path_for(dir, label),
            serde_json::to_string(&records).unwrap(),
        )
        .unwrap();
    }

    fn patient(history: &str) -> serde_json::Value {
        json!({
            "Patient History": history,
            "Laboratory Tests": { "White Blood Cells": 15.2 },
            "Reference Range Lower": { "White Blood Cells": 4.0 },
            "Reference Range Upper": { "White Blood Cells": 11.0 }
        })
    }

    struct Fixture {
        dir: tempfile::TempDir,
        provider: Arc<EchoProvider>,
    }

    impl Fixture {
        fn new(fail_marker: &'static str) -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
                provider: Arc::new(EchoProvider {
                    fail_marker,
                    prompts: Mutex::new(Vec::new()),
                }),
            }
        }

        fn output(&self) -> PathBuf {
            self.dir.path().join("output.jsonl")
        }

        fn runner(&self, yaml: &str) -> BatchRunner {
            let mut config = RunConfig::from_yaml_str(yaml, &[] as &[&str]).unwrap();
            config.records_dir = self.dir.path().to_path_buf();
            config.output_path = self.output();
            let sink = OutputSink::open(&config.output_path, OutputFormat::JsonLines).unwrap();
            BatchRunner::from_parts(
                config,
                self.provider.clone(),
                LabTestMapping::new(),
                Arc::new(sink),
            )
            .unwrap()
        }
    }

    #[test]
    fn test_patient_order() {
        let store = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        assert_eq!(patient_order(&store, None, None), store);
        assert_eq!(patient_order(&store, None, Some("2")), vec!["2", "3"]);
        assert!(patient_order(&store, None, Some("9")).is_empty());

        let list = vec!["3".to_string(), "1".to_string()];
        assert_eq!(patient_order(&store, Some(&list), None), vec!["3", "1"]);
        assert_eq!(patient_order(&store, Some(&list), Some("1")), vec!["1"]);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_batch() {
        let fixture = Fixture::new("marker-fail");
        write_store(
            fixture.dir.path(),
            Pathology::Appendicitis,
            json!({
                "10": patient("first"),
                "20": patient("marker-fail"),
                "30": patient("third")
            }),
        );
        let mut runner = fixture.runner("pathologies: [appendicitis]\n");

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.attempted, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.invalid_indices, vec![1]);
        assert_eq!(summary.usage.total_tokens, 240);
        assert!(summary.finished_at.is_some());

        let replies = read_json_lines(&fs::read_to_string(fixture.output()).unwrap()).unwrap();
        let ids: Vec<_> = replies.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "30"]);
    }

    #[tokio::test]
    async fn test_labels_drive_answer_and_store() {
        let fixture = Fixture::new("no-such-marker");
        write_store(fixture.dir.path(), Pathology::Cholecystitis, json!({ "1": patient("a") }));
        write_store(fixture.dir.path(), Pathology::Pancreatitis, json!({ "2": patient("b") }));
        let mut runner =
            fixture.runner("pathology: appendicitis\npathologies: [cholecystitis, pancreatitis]\n");

        runner.run().await.unwrap();

        let prompts = fixture.provider.prompts.lock();
        assert!(prompts[0].contains(r#""correct_answer": "Cholecystitis""#));
        assert!(prompts[1].contains(r#""correct_answer": "Pancreatitis""#));

        let replies = read_json_lines(&fs::read_to_string(fixture.output()).unwrap()).unwrap();
        assert_eq!(replies[0].pathology, Pathology::Cholecystitis);
        assert_eq!(replies[1].pathology, Pathology::Pancreatitis);
    }

    #[tokio::test]
    async fn test_prompt_carries_composed_record() {
        let fixture = Fixture::new("no-such-marker");
        write_store(fixture.dir.path(), Pathology::Appendicitis, json!({ "1": patient("a") }));
        let mut runner = fixture.runner("pathologies: [appendicitis]\ninclude_ref_range: true\n");

        runner.run().await.unwrap();

        let prompts = fixture.provider.prompts.lock();
        assert!(prompts[0].contains("White Blood Cells: 15.2 | RR: [4.0 - 11.0]"));
        assert!(!prompts[0].contains("Reference Range Lower"));
    }

    #[tokio::test]
    async fn test_missing_and_resumed_patients() {
        let fixture = Fixture::new("no-such-marker");
        write_store(
            fixture.dir.path(),
            Pathology::Diverticulitis,
            json!({ "1": patient("a"), "2": patient("b"), "3": patient("c") }),
        );
        let list_path = fixture.dir.path().join("patients.json");
        fs::write(&list_path, "[3, 99, 1]").unwrap();

        let yaml = format!(
            "pathologies: [diverticulitis]\npatient_list_path: {}\nfirst_patient: 99\n",
            list_path.display()
        );
        let mut runner = fixture.runner(&yaml);

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.missing_records, 1);
        assert_eq!(summary.attempted, 1);

        let prompts = fixture.provider.prompts.lock();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(r#""id": 1,"#));
    }

    #[tokio::test]
    async fn test_composition_failure_skips_patient() {
        let fixture = Fixture::new("no-such-marker");
        write_store(
            fixture.dir.path(),
            Pathology::Appendicitis,
            json!({ "1": { "Patient History": "no labs" }, "2": patient("b") }),
        );
        let mut runner = fixture.runner("pathologies: [appendicitis]\n");

        let summary = runner.run().await.unwrap();
        assert_eq!(summary.composition_failures, 1);
        assert_eq!(summary.attempted, 1);
        assert_eq!(runner.client().call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_store_is_fatal() {
        let fixture = Fixture::new("no-such-marker");
        let mut runner = fixture.runner("pathologies: [pancreatitis]\n");

        let err = runner.run().await.unwrap_err();
        assert!(matches!(err, RuntimeError::Record(_)));
    }

    #[test]
    fn test_missing_record_stores() {
        let dir = tempfile::tempdir().unwrap();
        write_store(dir.path(), Pathology::Appendicitis, json!({}));
        let mut config = RunConfig::default();
        config.records_dir = dir.path().to_path_buf();

        let missing = missing_record_stores(&config);
        assert_eq!(missing.len(), 3);
        assert!(!missing.contains(&RecordStore::path_for(dir.path(), Pathology::Appendicitis)));
    }
}
