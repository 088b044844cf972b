//! Content generation — prompt templating over a [`ChatModel`].
//!
//! [`ContentGenerator`] exposes the four operations the HTTP layer needs:
//! generic content and landing-page HTML, each as a single reply or as a
//! stream of chunks. Landing-page requirements are validated before the
//! model is contacted.

pub mod template;

use std::sync::Arc;

use futures::StreamExt;
use thiserror::Error;
use tracing::debug;

use crate::llm::{ChatModel, ChunkStream, LlmError};

pub use template::{LANDING_PAGE_TEMPLATE, render_landing_page_prompt};

/// Errors returned by [`ContentGenerator`].
#[derive(Debug, Error)]
pub enum GenerateError {
    /// A required text input was missing or blank. Raised before any upstream call.
    #[error("{0}")]
    Validation(&'static str),

    #[error(transparent)]
    Upstream(#[from] LlmError),
}

const BLANK_REQUIREMENTS: &str = "requirements must not be blank";

/// Builds prompts and delegates them to a language model.
///
/// Stateless apart from the shared model handle; cheap to share behind an [`Arc`].
#[derive(Clone)]
pub struct ContentGenerator {
    model: Arc<dyn ChatModel>,
}

impl ContentGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Sends `prompt` unmodified and returns the model's reply.
    pub async fn generate_content(&self, prompt: &str) -> Result<String, GenerateError> {
        debug!(prompt_len = prompt.len(), "generating content");
        Ok(self.model.complete(prompt).await?)
    }

    /// Wraps `requirements` in the landing-page template and returns the generated HTML.
    ///
    /// # Errors
    ///
    /// [`GenerateError::Validation`] if `requirements` is empty or whitespace-only;
    /// the model is not called in that case.
    pub async fn generate_landing_page_html(
        &self,
        requirements: &str,
    ) -> Result<String, GenerateError> {
        let prompt = landing_page_prompt(requirements)?;
        self.generate_content(&prompt).await
    }

    /// Streams the reply to `prompt`, chunk by chunk, in upstream order.
    ///
    /// The upstream request is only issued once the returned stream is first
    /// polled. A failure to start the request, or any later failure, is the
    /// final item of the stream. Dropping the stream abandons the upstream call.
    pub fn generate_content_stream(&self, prompt: impl Into<String>) -> ChunkStream {
        let model = Arc::clone(&self.model);
        let prompt = prompt.into();

        Box::pin(async_stream::stream! {
            debug!(prompt_len = prompt.len(), "opening content stream");
            match model.stream(&prompt).await {
                Ok(mut chunks) => {
                    while let Some(chunk) = chunks.next().await {
                        let failed = chunk.is_err();
                        yield chunk;
                        if failed {
                            break;
                        }
                    }
                }
                Err(e) => {
                    yield Err(e);
                }
            }
        })
    }

    /// Validates `requirements`, then streams the landing-page HTML.
    ///
    /// # Errors
    ///
    /// [`GenerateError::Validation`] if `requirements` is empty or whitespace-only;
    /// no stream is produced and the model is not called.
    pub fn generate_landing_page_html_stream(
        &self,
        requirements: &str,
    ) -> Result<ChunkStream, GenerateError> {
        let prompt = landing_page_prompt(requirements)?;
        Ok(self.generate_content_stream(prompt))
    }
}

fn landing_page_prompt(requirements: &str) -> Result<String, GenerateError> {
    if requirements.trim().is_empty() {
        return Err(GenerateError::Validation(BLANK_REQUIREMENTS));
    }
    Ok(render_landing_page_prompt(requirements))
}
