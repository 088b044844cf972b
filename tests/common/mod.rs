//! Shared test doubles and helpers.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use landing_forge::generator::ContentGenerator;
use landing_forge::http::Body;
use landing_forge::llm::{ChatModel, ChunkStream, LlmError};
use landing_forge::{Request, Response};

/// What the stub stream does after its canned chunks.
#[derive(Clone)]
enum Tail {
    End,
    Fail(String),
    Hang,
}

/// Deterministic [`ChatModel`] that records every prompt it receives.
///
/// Example: `let model = StubModel::replying("Hello");`
pub struct StubModel {
    reply: Result<String, String>,
    chunks: Vec<String>,
    tail: Tail,
    refuse_stream: Option<String>,
    complete_calls: AtomicUsize,
    stream_calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    stream_dropped: Arc<AtomicBool>,
}

impl StubModel {
    fn base() -> Self {
        Self {
            reply: Ok(String::new()),
            chunks: Vec::new(),
            tail: Tail::End,
            refuse_stream: None,
            complete_calls: AtomicUsize::new(0),
            stream_calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            stream_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `complete` returns `text`.
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_owned()),
            ..Self::base()
        }
    }

    /// `complete` fails and `stream` refuses to start, both rate-limited with `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_owned()),
            refuse_stream: Some(message.to_owned()),
            ..Self::base()
        }
    }

    /// `stream` yields `chunks` and ends.
    pub fn streaming(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            ..Self::base()
        }
    }

    /// After the chunks, the stream yields an upstream API error with `message`.
    pub fn then_fail(mut self, message: &str) -> Self {
        self.tail = Tail::Fail(message.to_owned());
        self
    }

    /// After the chunks, the stream never yields again.
    pub fn then_hang(mut self) -> Self {
        self.tail = Tail::Hang;
        self
    }

    pub fn complete_calls(&self) -> usize {
        self.complete_calls.load(Ordering::SeqCst)
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.complete_calls() + self.stream_calls()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Set once a stream handed out by this stub has been dropped.
    pub fn stream_dropped(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stream_dropped)
    }
}

struct SetOnDrop(Arc<AtomicBool>);

impl Drop for SetOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChatModel for StubModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_owned());
        self.reply.clone().map_err(LlmError::RateLimited)
    }

    async fn stream(&self, prompt: &str) -> Result<ChunkStream, LlmError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_owned());
        if let Some(message) = &self.refuse_stream {
            return Err(LlmError::RateLimited(message.clone()));
        }

        let chunks = self.chunks.clone();
        let tail = self.tail.clone();
        let guard = SetOnDrop(Arc::clone(&self.stream_dropped));

        Ok(Box::pin(async_stream::stream! {
            let _guard = guard;
            for chunk in chunks {
                yield Ok(chunk);
            }
            match tail {
                Tail::End => {}
                Tail::Fail(message) => {
                    yield Err(LlmError::Api { status: 500, message });
                }
                Tail::Hang => futures::future::pending::<()>().await,
            }
        }))
    }
}

pub fn generator(model: &Arc<StubModel>) -> ContentGenerator {
    ContentGenerator::new(Arc::clone(model) as Arc<dyn ChatModel>)
}

pub fn request(raw: &str) -> Request {
    let (req, _) = Request::parse(raw.as_bytes()).unwrap();
    req
}

pub fn get(path: &str) -> Request {
    request(&format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n"))
}

pub fn post_text(path: &str, body: &str) -> Request {
    request(&format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    ))
}

pub fn post_form(path: &str, body: &str) -> Request {
    request(&format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    ))
}

/// Body text of a buffered response.
pub fn text(response: Response) -> String {
    match response.into_body() {
        Body::Full(bytes) => String::from_utf8(bytes).unwrap(),
        Body::Stream(_) => panic!("expected a buffered body"),
    }
}

/// All frames of a streamed response, as text.
pub async fn frames(response: Response) -> Vec<String> {
    match response.into_body() {
        Body::Stream(frames) => {
            frames
                .map(|b| String::from_utf8(b.to_vec()).unwrap())
                .collect()
                .await
        }
        Body::Full(_) => panic!("expected an event stream"),
    }
}
