//! Run accounting.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::{FailureKind, TokenUsage};

/// Accumulated LLM usage for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,

    /// Successful calls only
    pub llm_calls: u32,

    /// Estimated cost in USD
    pub estimated_cost: f64,
}

impl LlmUsage {
    /// Add token usage from a provider response.
    pub fn add(&mut self, usage: &TokenUsage, model: &str) {
        self.prompt_tokens += u64::from(usage.prompt_tokens);
        self.completion_tokens += u64::from(usage.completion_tokens);
        self.total_tokens += u64::from(usage.total());
        self.llm_calls += 1;
        self.estimated_cost += Self::estimate_cost(usage, model);
    }

    fn estimate_cost(usage: &TokenUsage, model: &str) -> f64 {
        // USD per million tokens
        let (input_rate, output_rate) = match model {
            m if m.contains("gpt-4o-mini") => (0.15, 0.6),
            m if m.contains("gpt-4o") => (2.5, 10.0),
            m if m.contains("gpt-4-turbo") => (10.0, 30.0),
            m if m.contains("gpt-4") => (30.0, 60.0),
            _ => (0.5, 1.5),
        };

        let input_cost = (usage.prompt_tokens as f64 / 1_000_000.0) * input_rate;
        let output_cost = (usage.completion_tokens as f64 / 1_000_000.0) * output_rate;
        input_cost + output_cost
    }
}

/// Outcome of a whole batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Patients sent to the provider
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,

    /// Patients whose record could not be composed
    pub composition_failures: usize,

    /// Listed patients absent from the record store
    pub missing_records: usize,

    /// Zero-based call indices that failed
    pub invalid_indices: Vec<usize>,

    pub failures_by_kind: BTreeMap<FailureKind, usize>,
    pub usage: LlmUsage,
}

impl RunSummary {
    pub fn start() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            composition_failures: 0,
            missing_records: 0,
            invalid_indices: Vec::new(),
            failures_by_kind: BTreeMap::new(),
            usage: LlmUsage::default(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn record_success(&mut self, usage: &TokenUsage, model: &str) {
        self.attempted += 1;
        self.succeeded += 1;
        self.usage.add(usage, model);
    }

    pub fn record_failure(&mut self, index: usize, kind: FailureKind) {
        self.attempted += 1;
        self.failed += 1;
        self.invalid_indices.push(index);
        *self.failures_by_kind.entry(kind).or_insert(0) += 1;
    }

    /// Wall-clock duration, once finished.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    /// Emit the summary as one structured log event.
    pub fn log(&self) {
        let failures = self
            .failures_by_kind
            .iter()
            .map(|(kind, count)| format!("{}={}", kind, count))
            .collect::<Vec<_>>()
            .join(",");

        tracing::info!(
            attempted = self.attempted,
            succeeded = self.succeeded,
            failed = self.failed,
            composition_failures = self.composition_failures,
            missing_records = self.missing_records,
            failures = %failures,
            invalid_indices = ?self.invalid_indices,
            total_tokens = self.usage.total_tokens,
            estimated_cost_usd = self.usage.estimated_cost,
            elapsed_ms = self.elapsed().map(|d| d.num_milliseconds()),
            "Run finished"
        );
    }
}
