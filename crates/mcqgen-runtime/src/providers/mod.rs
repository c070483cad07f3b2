//! LLM provider abstractions for mcqgen-runtime.
//!
//! This module defines the provider trait, the closed failure taxonomy every
//! provider maps its errors onto, and the built-in OpenAI-compatible chat
//! provider.
//!
//! ## Security
//!
//! All providers use the [`secrets`] module for credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use mcqgen_core::{ConfigError, RunConfig};

mod factory;
pub mod secrets;

#[cfg(feature = "openai")]
mod openai;

pub use factory::{provider_config, ProviderFactory, ProviderRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "openai")]
pub use openai::{OpenAiProvider, OpenAiProviderFactory, OPENAI_API_KEY_ENV};

/// Errors from LLM providers.
///
/// Every variant except `NotConfigured` is a per-call failure: it is
/// recorded against the patient and the batch moves on.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("API error{}: {message}", .status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Api { status: Option<u16>, message: String },

    #[error("Failed to connect: {0}")]
    Connection(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Invalid request ({status}): {message}")]
    InvalidRequest { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Service unavailable ({status}): {message}")]
    ServiceUnavailable { status: u16, message: String },

    #[error("Reply could not be used: {0}")]
    MalformedReply(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Map a non-success HTTP status onto the taxonomy.
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        match status {
            429 => ProviderError::RateLimited { retry_after },
            400 | 404 | 413 | 422 => ProviderError::InvalidRequest { status, message },
            502..=504 => ProviderError::ServiceUnavailable { status, message },
            _ => ProviderError::Api {
                status: Some(status),
                message,
            },
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ProviderError::Api { .. } => FailureKind::Api,
            ProviderError::Connection(_) => FailureKind::Connection,
            ProviderError::RateLimited { .. } => FailureKind::RateLimit,
            ProviderError::InvalidRequest { .. } => FailureKind::InvalidRequest,
            ProviderError::Timeout => FailureKind::Timeout,
            ProviderError::ServiceUnavailable { .. } => FailureKind::ServiceUnavailable,
            ProviderError::MalformedReply(_) => FailureKind::MalformedReply,
            ProviderError::NotConfigured(_) => FailureKind::NotConfigured,
        }
    }
}

/// Failure category, used as a log field and a summary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Api,
    Connection,
    RateLimit,
    InvalidRequest,
    Timeout,
    ServiceUnavailable,
    MalformedReply,
    NotConfigured,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Api => "api",
            FailureKind::Connection => "connection",
            FailureKind::RateLimit => "rate_limit",
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::Timeout => "timeout",
            FailureKind::ServiceUnavailable => "service_unavailable",
            FailureKind::MalformedReply => "malformed_reply",
            FailureKind::NotConfigured => "not_configured",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConfig {
    /// Model to use
    pub model: String,

    /// Sampling temperature
    pub temperature: f64,

    /// Sampling seed, absent for self-consistency runs
    pub seed: Option<u64>,

    /// Ask for token log-probabilities
    pub logprobs: bool,

    /// Per-request timeout; `None` leaves the client default in place
    pub timeout: Option<Duration>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 1.0,
            seed: None,
            logprobs: false,
            timeout: None,
        }
    }
}

impl CompletionConfig {
    /// Build request settings from a run configuration.
    pub fn from_run_config(config: &RunConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            seed: config.sampling_seed(),
            logprobs: config.save_probabilities,
            timeout: config.llm.request_timeout()?,
        })
    }
}

/// Chat role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message for LLM completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Response from an LLM completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    /// Generated content, verbatim
    pub content: String,

    pub usage: TokenUsage,

    /// Model that served the request
    pub model: String,

    pub finish_reason: Option<String>,
}

/// Token usage from a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Provider abstraction allows swapping LLM backends.
///
/// Implementations make exactly one attempt per call and never retry.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Execute a chat completion.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Check that the provider is usable without spending a request.
    async fn health_check(&self) -> bool;

    /// Provider name for logs.
    fn name(&self) -> &str;
}
