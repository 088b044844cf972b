//! OpenAI Chat Completions client.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{ChatModel, ChunkStream, LlmError};
use crate::config::OpenAiConfig;

/// [`ChatModel`] backed by `POST {base_url}/chat/completions`.
///
/// Every call is a single attempt: no retries and no request timeout.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiChatModel {
    /// Builds a client from already-validated configuration.
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match HeaderValue::from_str(&format!("Bearer {}", self.config.api_key)) {
            Ok(val) => {
                headers.insert(AUTHORIZATION, val);
            }
            Err(_) => warn!("API key is not a valid header value; sending request unauthenticated"),
        }
        headers
    }

    fn request_body<'a>(&'a self, prompt: &'a str, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            stream,
        }
    }

    async fn send(&self, prompt: &str, stream: bool) -> Result<reqwest::Response, LlmError> {
        let resp = self
            .client
            .post(self.endpoint())
            .headers(self.headers())
            .json(&self.request_body(prompt, stream))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "OpenAI request rejected");
            return Err(LlmError::from_status(status.as_u16(), &body));
        }
        Ok(resp)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(model = %self.config.model, prompt_len = prompt.len(), "OpenAI complete");

        let data: ChatResponse = self.send(prompt, false).await?.json().await?;
        let choice = data.choices.into_iter().next().ok_or_else(|| {
            LlmError::MalformedResponse("no choices in completion response".into())
        })?;
        Ok(choice.message.content.unwrap_or_default())
    }

    async fn stream(&self, prompt: &str) -> Result<ChunkStream, LlmError> {
        debug!(model = %self.config.model, prompt_len = prompt.len(), "OpenAI stream");

        let byte_stream = self.send(prompt, true).await?.bytes_stream();
        Ok(stream_deltas(byte_stream))
    }
}

/// Turns a raw event-stream body into content deltas.
///
/// Bytes are buffered until a full line is available, so a UTF-8 sequence
/// split across network reads is decoded intact. A final line without a
/// trailing newline is still interpreted.
fn stream_deltas<S>(byte_stream: S) -> ChunkStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut buffer = BytesMut::new();
        let byte_stream = byte_stream.fuse();
        futures::pin_mut!(byte_stream);

        loop {
            let line = match next_line(&mut buffer) {
                Some(line) => line,
                None => match byte_stream.next().await {
                    Some(Ok(chunk)) => {
                        buffer.extend_from_slice(&chunk);
                        continue;
                    }
                    Some(Err(e)) => {
                        yield Err(LlmError::Network(e));
                        break;
                    }
                    None if !buffer.is_empty() => buffer.split().freeze(),
                    None => break,
                },
            };

            match decode_stream_line(&line) {
                StreamLine::Skip => {}
                StreamLine::Done => break,
                StreamLine::Delta(text) => {
                    yield Ok(text);
                }
                StreamLine::Failed(err) => {
                    yield Err(err);
                    break;
                }
            }
        }
    })
}

/// Splits off the next `\n`-terminated line, newline included.
fn next_line(buffer: &mut BytesMut) -> Option<Bytes> {
    let end = buffer.iter().position(|&b| b == b'\n')?;
    Some(buffer.split_to(end + 1).freeze())
}

fn decode_stream_line(raw: &[u8]) -> StreamLine {
    match std::str::from_utf8(raw) {
        Ok(line) => parse_stream_line(line.trim()),
        Err(e) => StreamLine::Failed(LlmError::MalformedResponse(format!(
            "event stream line is not valid UTF-8: {e}"
        ))),
    }
}

/// Outcome of interpreting one line of the upstream event stream.
#[derive(Debug)]
enum StreamLine {
    Skip,
    Done,
    Delta(String),
    Failed(LlmError),
}

fn parse_stream_line(line: &str) -> StreamLine {
    if line.is_empty() || line.starts_with(':') {
        return StreamLine::Skip;
    }
    let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
        return StreamLine::Skip;
    };
    if data == "[DONE]" {
        return StreamLine::Done;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(StreamChunk {
            error: Some(error), ..
        }) => StreamLine::Failed(LlmError::Api {
            status: 200,
            message: error.message,
        }),
        Ok(chunk) => match chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
        {
            Some(text) => StreamLine::Delta(text),
            None => StreamLine::Skip,
        },
        Err(e) => StreamLine::Failed(LlmError::MalformedResponse(e.to_string())),
    }
}

// OpenAI wire types (internal)

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamFailure>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamFailure {
    message: String,
}
