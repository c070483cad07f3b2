//! One LLM call per patient, with failure classification and flushing.
//!
//! The client owns the batch buffer. Successful replies wait there until
//! the next flush; every call ends with at least one flush, and a failed
//! call flushes once more before that. Replies already obtained therefore
//! reach the sink before the next patient is attempted.

use std::sync::Arc;

use mcqgen_core::{AdmissionRecord, Pathology};
use tracing::{debug, warn};

use crate::conversation::Conversation;
use crate::prompts::{user_prompt, SYSTEM_PROMPT};
use crate::providers::{CompletionConfig, FailureKind, LlmProvider, ProviderError, TokenUsage};
use crate::sink::{GeneratedReply, OutputSink, SinkError};

/// Result of one patient's call.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Generated {
        index: usize,
        usage: TokenUsage,
        model: String,
    },
    Failed {
        index: usize,
        kind: FailureKind,
        error: ProviderError,
    },
}

impl GenerationOutcome {
    /// Zero-based call index.
    pub fn index(&self) -> usize {
        match self {
            GenerationOutcome::Generated { index, .. } | GenerationOutcome::Failed { index, .. } => {
                *index
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Generated { .. })
    }
}

/// Sends prompts and hands replies to the output sink.
pub struct GenerationClient {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
    conversation: Conversation,
    sink: Arc<OutputSink>,
    buffer: Vec<GeneratedReply>,
    call_count: usize,
    invalid: Vec<usize>,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig, sink: Arc<OutputSink>) -> Self {
        Self {
            provider,
            config,
            conversation: Conversation::new(SYSTEM_PROMPT),
            sink,
            buffer: Vec::new(),
            call_count: 0,
            invalid: Vec::new(),
        }
    }

    /// Calls made so far, successful or not.
    pub fn call_count(&self) -> usize {
        self.call_count
    }

    /// Indices of the calls that failed.
    pub fn invalid_indices(&self) -> &[usize] {
        &self.invalid
    }

    /// Replies waiting for the next flush.
    pub fn buffered(&self) -> &[GeneratedReply] {
        &self.buffer
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Generate one question.
    ///
    /// Provider failures are returned as [`GenerationOutcome::Failed`];
    /// only a sink failure is an error.
    pub async fn generate(
        &mut self,
        patient_id: &str,
        pathology: Pathology,
        record: &AdmissionRecord,
    ) -> Result<GenerationOutcome, SinkError> {
        let index = self.call_count;

        self.conversation.reset();
        self.conversation.push_user(user_prompt(patient_id, pathology, record));
        let messages = self.conversation.messages().to_vec();
        self.conversation.reset();

        let result = self.provider.complete(messages, &self.config).await;

        let outcome = match result {
            Ok(response) => {
                debug!(
                    patient_id,
                    pathology = %pathology,
                    call_count = index,
                    completion_tokens = response.usage.completion_tokens,
                    "Generated question"
                );
                self.buffer.push(GeneratedReply {
                    id: patient_id.to_string(),
                    pathology,
                    reply: response.content,
                });
                let model = if response.model.is_empty() {
                    self.config.model.clone()
                } else {
                    response.model
                };
                GenerationOutcome::Generated {
                    index,
                    usage: response.usage,
                    model,
                }
            }
            Err(error) => {
                let kind = error.kind();
                warn!(
                    patient_id,
                    pathology = %pathology,
                    call_count = index,
                    error_kind = %kind,
                    error = %error,
                    "Generation failed"
                );
                self.invalid.push(index);
                self.flush()?;
                GenerationOutcome::Failed { index, kind, error }
            }
        };

        self.call_count += 1;
        self.flush()?;
        Ok(outcome)
    }

    /// Write out the buffered replies and start a new buffer.
    ///
    /// The buffer is only cleared once the sink accepted it; after a
    /// failed write the replies stay buffered for the next flush.
    pub fn flush(&mut self) -> Result<usize, SinkError> {
        let written = self.sink.append(&self.buffer)?;
        self.buffer.clear();
        Ok(written)
    }
}

impl std::fmt::Debug for GenerationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationClient")
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .field("sink", &self.sink.path())
            .field("buffered", &self.buffer.len())
            .field("call_count", &self.call_count)
            .field("invalid", &self.invalid)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionResponse, Role};
    use crate::sink::repair_fragments;
    use async_trait::async_trait;
    use mcqgen_core::OutputFormat;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::fs;

    /// Replays scripted outcomes and records every request.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<String, ProviderError>>>,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            _config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.requests.lock().push(messages);
            let next = self
                .script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Connection("script exhausted".to_string())));
            next.map(|content| CompletionResponse {
                content,
                usage: TokenUsage {
                    prompt_tokens: 10,
                    completion_tokens: 5,
                },
                model: "scripted".to_string(),
                finish_reason: Some("stop".to_string()),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn record(history: &str) -> AdmissionRecord {
        AdmissionRecord::from_value(json!({ "Patient History": history }), "test").unwrap()
    }

    fn client(
        provider: Arc<ScriptedProvider>,
        dir: &tempfile::TempDir,
        format: OutputFormat,
    ) -> GenerationClient {
        let sink = OutputSink::open(dir.path().join("output"), format).unwrap();
        GenerationClient::new(provider, CompletionConfig::default(), Arc::new(sink))
    }

    fn contents(client: &GenerationClient) -> String {
        fs::read_to_string(client.sink.path()).unwrap()
    }

    #[tokio::test]
    async fn test_partial_failure_durability() {
        let provider = ScriptedProvider::new(vec![
            Ok("q1".to_string()),
            Ok("q2".to_string()),
            Err(ProviderError::Timeout),
            Ok("q4".to_string()),
            Ok("q5".to_string()),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let mut client = client(provider.clone(), &dir, OutputFormat::LegacyFragments);

        let mut outcomes = Vec::new();
        let mut after_each = Vec::new();
        for n in 1..=5 {
            let outcome = client
                .generate(&n.to_string(), Pathology::Appendicitis, &record("pain"))
                .await
                .unwrap();
            outcomes.push(outcome);
            after_each.push(contents(&client));
        }

        assert_eq!(after_each[0], "[\n  \"q1\"\n],");
        assert_eq!(after_each[1], "[\n  \"q1\"\n],[\n  \"q2\"\n],");
        assert_eq!(after_each[2], "[\n  \"q1\"\n],[\n  \"q2\"\n],[],[],");
        assert_eq!(
            repair_fragments(&after_each[4]).unwrap(),
            vec!["q1", "q2", "q4", "q5"]
        );

        assert_eq!(provider.requests.lock().len(), 5);
        assert_eq!(client.call_count(), 5);
        assert_eq!(client.invalid_indices(), &[2]);
        assert!(matches!(
            outcomes[2],
            GenerationOutcome::Failed {
                index: 2,
                kind: FailureKind::Timeout,
                ..
            }
        ));
        assert!(outcomes[3].is_success());
        assert_eq!(outcomes[4].index(), 4);
    }

    #[tokio::test]
    async fn test_failure_flushes_pending_replies_in_json_lines() {
        let provider = ScriptedProvider::new(vec![
            Ok("q1".to_string()),
            Err(ProviderError::RateLimited { retry_after: None }),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let mut client = client(provider, &dir, OutputFormat::JsonLines);

        client
            .generate("1", Pathology::Pancreatitis, &record("a"))
            .await
            .unwrap();
        let outcome = client
            .generate("2", Pathology::Pancreatitis, &record("b"))
            .await
            .unwrap();
        assert!(!outcome.is_success());

        let lines: Vec<_> = contents(&client).lines().map(str::to_string).collect();
        assert_eq!(
            lines,
            vec![r#"{"id":"1","pathology":"pancreatitis","reply":"q1"}"#]
        );
    }

    #[tokio::test]
    async fn test_conversation_reset_after_every_call() {
        let provider = ScriptedProvider::new(vec![
            Ok("q1".to_string()),
            Err(ProviderError::Api {
                status: Some(500),
                message: "boom".to_string(),
            }),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let mut client = client(provider, &dir, OutputFormat::JsonLines);

        client
            .generate("1", Pathology::Cholecystitis, &record("a"))
            .await
            .unwrap();
        assert_eq!(client.conversation().len(), 1);

        client
            .generate("2", Pathology::Cholecystitis, &record("b"))
            .await
            .unwrap();
        assert_eq!(client.conversation().len(), 1);
        assert_eq!(client.conversation().messages()[0].role, Role::System);
    }

    #[tokio::test]
    async fn test_no_leakage_between_patients() {
        let provider = ScriptedProvider::new(vec![Ok("qa".to_string()), Ok("qb".to_string())]);
        let dir = tempfile::tempdir().unwrap();
        let mut client = client(provider.clone(), &dir, OutputFormat::JsonLines);

        client
            .generate("101", Pathology::Diverticulitis, &record("marker-alpha"))
            .await
            .unwrap();
        client
            .generate("202", Pathology::Diverticulitis, &record("marker-beta"))
            .await
            .unwrap();

        let requests = provider.requests.lock();
        let second = &requests[1];
        assert_eq!(second.len(), 2);
        assert_eq!(second[0], ChatMessage::system(SYSTEM_PROMPT));
        assert!(second[1].content.contains("marker-beta"));
        for message in second {
            assert!(!message.content.contains("marker-alpha"));
            assert!(!message.content.contains("\"id\": 101"));
        }
    }

    #[tokio::test]
    async fn test_every_kind_is_recorded() {
        let errors = vec![
            ProviderError::Api {
                status: None,
                message: "x".to_string(),
            },
            ProviderError::Connection("refused".to_string()),
            ProviderError::RateLimited { retry_after: None },
            ProviderError::InvalidRequest {
                status: 400,
                message: "x".to_string(),
            },
            ProviderError::Timeout,
            ProviderError::ServiceUnavailable {
                status: 503,
                message: "x".to_string(),
            },
            ProviderError::MalformedReply("response has no choices".to_string()),
        ];
        let expected: Vec<FailureKind> = errors.iter().map(ProviderError::kind).collect();
        let provider = ScriptedProvider::new(errors.into_iter().map(Err).collect());
        let dir = tempfile::tempdir().unwrap();
        let mut client = client(provider, &dir, OutputFormat::JsonLines);

        let mut kinds = Vec::new();
        for n in 0..expected.len() {
            match client
                .generate(&n.to_string(), Pathology::Appendicitis, &record("x"))
                .await
                .unwrap()
            {
                GenerationOutcome::Failed { kind, .. } => kinds.push(kind),
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        assert_eq!(kinds, expected);
        assert!(kinds.contains(&FailureKind::MalformedReply));
        assert_eq!(client.invalid_indices(), &[0, 1, 2, 3, 4, 5, 6]);
        assert_eq!(contents(&client), "");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_failed_write_keeps_replies_buffered() {
        let provider = ScriptedProvider::new(vec![Ok("q1".to_string())]);
        let sink = OutputSink::open("/dev/full", OutputFormat::JsonLines).unwrap();
        let mut client =
            GenerationClient::new(provider, CompletionConfig::default(), Arc::new(sink));

        let err = client
            .generate("1", Pathology::Appendicitis, &record("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Io { .. }));
        assert_eq!(client.call_count(), 1);
        assert_eq!(client.buffered().len(), 1);
        assert_eq!(client.buffered()[0].reply, "q1");

        assert!(client.flush().is_err());
        assert_eq!(client.buffered().len(), 1);
    }
}
