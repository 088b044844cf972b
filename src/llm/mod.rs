//! LLM integration — the upstream chat capability and its OpenAI implementation.
//!
//! The rest of the crate talks to a language model only through [`ChatModel`],
//! so tests can substitute a deterministic double for the network client.

pub mod openai;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub use openai::OpenAiChatModel;

/// Ordered text fragments from a streaming completion.
///
/// An `Err` item is terminal: producers stop after yielding one.
pub type ChunkStream = BoxStream<'static, Result<String, LlmError>>;

/// Failures of the upstream language-model service.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("rate limited by upstream: {0}")]
    RateLimited(String),

    #[error("upstream API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed upstream response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Maps a non-success HTTP status and its body to an error.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = extract_error_message(body).unwrap_or_else(|| body.to_owned());
        match status {
            401 | 403 => Self::Authentication(message),
            429 => Self::RateLimited(message),
            _ => Self::Api { status, message },
        }
    }
}

/// Pulls `error.message` out of an OpenAI-style JSON error body.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("error")?
        .get("message")?
        .as_str()
        .map(str::to_owned)
}

/// A chat-completion capability: one-shot and streaming.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Sends `prompt` as a single user message and returns the full reply.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Sends `prompt` as a single user message and returns the reply as it is produced.
    ///
    /// An `Err` return means the request could not be started; failures after
    /// that arrive as the last item of the stream.
    async fn stream(&self, prompt: &str) -> Result<ChunkStream, LlmError>;
}
