//! HTTP/1.1 response builder.
//!
//! Provides a fluent builder API for constructing HTTP responses and
//! serializing them for transmission over TCP. A response body is either
//! fully buffered or a stream of pre-encoded frames pushed to the client
//! with chunked transfer encoding.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use futures::stream::BoxStream;

use super::{Headers, StatusCode};

/// A lazily produced sequence of wire-ready body fragments.
pub type FrameStream = BoxStream<'static, Bytes>;

/// The payload of a [`Response`].
pub enum Body {
    /// A complete body, sent with `Content-Length`.
    Full(Vec<u8>),
    /// An open-ended body, sent with `Transfer-Encoding: chunked`, one chunk per item.
    Stream(FrameStream),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// An HTTP/1.1 response, ready to be serialized and sent.
///
/// # Examples
///
/// ```
/// use landing_forge::http::{Response, StatusCode};
///
/// let response = Response::new(StatusCode::Ok).html("<h1>Hi</h1>");
///
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
/// assert!(text.contains("Content-Length: 11\r\n"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
    keep_alive: bool,
}

impl Response {
    /// Creates a new response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::Full(Vec::new()),
            keep_alive: true,
        }
    }

    /// Creates a `200 OK` server-sent event response that pushes `frames` as they arrive.
    pub fn event_stream(frames: FrameStream) -> Self {
        Self::new(StatusCode::Ok)
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .stream(frames)
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in-place, for middleware that decorates a downstream response.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Sets the response body from a string.
    ///
    /// The `Content-Length` header is written automatically by [`into_parts`](Self::into_parts).
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Body::Full(body.into().into_bytes());
        self
    }

    /// Sets an HTML body and the matching `Content-Type`.
    #[must_use]
    pub fn html(mut self, body: impl Into<String>) -> Self {
        self.headers.set("Content-Type", "text/html; charset=utf-8");
        self.body(body)
    }

    /// Replaces the body with a frame stream.
    #[must_use]
    pub fn stream(mut self, frames: FrameStream) -> Self {
        self.body = Body::Stream(frames);
        self
    }

    /// Controls whether the `Connection: keep-alive` or `Connection: close` header is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns `true` unless the connection is to be closed after this response.
    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Returns `true` if the body is a frame stream.
    pub fn is_streaming(&self) -> bool {
        matches!(self.body, Body::Stream(_))
    }

    /// Consumes the response and returns its body.
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Serializes the response head (and a buffered body) using HTTP/1.1 wire format.
    ///
    /// For [`Body::Full`] the returned buffer holds the whole response and the
    /// stream is `None`. For [`Body::Stream`] the buffer holds only the head,
    /// the connection is always marked `close`, and the caller writes each frame
    /// as a chunk followed by the terminating zero-length chunk.
    ///
    /// Automatically adds:
    /// - `Content-Type: text/plain; charset=utf-8` if a buffered body is non-empty and no
    ///   `Content-Type` header was set.
    /// - `Content-Length: <n>` or `Transfer-Encoding: chunked`.
    /// - `Connection: keep-alive` or `Connection: close`.
    pub fn into_parts(mut self) -> (BytesMut, Option<FrameStream>) {
        let (body, stream) = match self.body {
            Body::Full(bytes) => (bytes, None),
            Body::Stream(frames) => (Vec::new(), Some(frames)),
        };

        if stream.is_none() && !body.is_empty() && !self.headers.contains("content-type") {
            self.headers
                .insert("Content-Type", "text/plain; charset=utf-8");
        }

        let connection = if self.keep_alive && stream.is_none() {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.set("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + body.len();
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        if stream.is_some() {
            buf.put(&b"Transfer-Encoding: chunked\r\n"[..]);
        } else {
            buf.put(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        }

        buf.put(&b"\r\n"[..]);
        buf.put(body.as_slice());

        (buf, stream)
    }

    /// Serializes the response, discarding any frame stream.
    pub fn into_bytes(self) -> BytesMut {
        self.into_parts().0
    }
}

/// Encodes one frame as an HTTP/1.1 chunk (`<hex len>\r\n<data>\r\n`).
pub fn encode_chunk(frame: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(frame.len() + 12);
    buf.put(format!("{:x}\r\n", frame.len()).as_bytes());
    buf.put(frame);
    buf.put(&b"\r\n"[..]);
    buf
}

/// The zero-length chunk that ends a chunked body.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";
