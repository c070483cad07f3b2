//! # mcqgen-runtime
//!
//! The half of the question generator that talks to an LLM and writes
//! output files.
//!
//! ## Failure Model
//!
//! A provider failure affects only the current patient: it is classified,
//! logged with the running call count, and the batch moves on. Replies
//! already obtained are flushed to the output sink before the next patient
//! is attempted. Only a missing record store or an output I/O error stops
//! the run.
//!
//! ## Example
//!
//! ```rust,ignore
//! use mcqgen_core::RunConfig;
//! use mcqgen_runtime::{BatchRunner, ProviderRegistry};
//!
//! let config = RunConfig::load("configs/config.yaml", &["order=l"])?;
//! let mut runner = BatchRunner::new(config, &ProviderRegistry::with_defaults())?;
//! let summary = runner.run().await?;
//! println!("{} questions generated", summary.succeeded);
//! ```

use thiserror::Error;

pub mod conversation;
pub mod generation;
pub mod prompts;
pub mod providers;
pub mod runner;
pub mod sink;
pub mod summary;

pub use conversation::Conversation;
pub use generation::{GenerationClient, GenerationOutcome};
pub use providers::{
    provider_config, ChatMessage, CompletionConfig, CompletionResponse, FailureKind, LlmProvider,
    ProviderError, ProviderRegistry, TokenUsage,
};
pub use runner::{missing_record_stores, patient_order, BatchRunner};
pub use sink::{repair_fragments, GeneratedReply, OutputSink, SinkError};
pub use summary::{LlmUsage, RunSummary};

/// Errors that stop a run.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] mcqgen_core::ConfigError),

    #[error("Record error: {0}")]
    Record(#[from] mcqgen_core::RecordError),

    #[error("Evaluator error: {0}")]
    Evaluator(#[from] mcqgen_core::EvaluatorError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Output error: {0}")]
    Sink(#[from] SinkError),
}
