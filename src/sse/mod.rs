//! Server-Sent Events framing for streamed model output.
//!
//! Each chunk becomes one `data:` event carrying a one-key JSON-like object:
//!
//! ```text
//! data: {"content": "<escaped chunk>"}
//!
//! data: {"error": "<escaped message>"}
//!
//! ```
//!
//! Only `"`, `\n`, `\r` and `\t` are escaped. A failure of the chunk source
//! ends the stream with exactly one error event; a failure to encode a single
//! chunk is reported in place of that chunk and the stream carries on.

use std::fmt::Write;

use bytes::Bytes;
use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::http::FrameStream;
use crate::llm::ChunkStream;

/// Failure to serialize a single frame.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("failed to format event frame")]
    Format(#[from] std::fmt::Error),
}

/// Emitted if even the error frame for a framing failure cannot be encoded.
const FALLBACK_ERROR_FRAME: &str = "data: {\"error\": \"failed to encode event frame\"}\n\n";

/// One event on the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Content(String),
    Error(String),
}

impl Frame {
    fn key(&self) -> &'static str {
        match self {
            Self::Content(_) => "content",
            Self::Error(_) => "error",
        }
    }

    fn text(&self) -> &str {
        match self {
            Self::Content(text) | Self::Error(text) => text,
        }
    }

    /// Serializes the frame as `data: {"<key>": "<escaped>"}` plus the blank-line terminator.
    ///
    /// ```
    /// use landing_forge::sse::Frame;
    ///
    /// let frame = Frame::Content("line1\nline2\"".into()).encode().unwrap();
    /// assert_eq!(&frame[..], b"data: {\"content\": \"line1\\nline2\\\"\"}\n\n");
    /// ```
    pub fn encode(&self) -> Result<Bytes, FramingError> {
        let text = self.text();
        let mut out = String::with_capacity(text.len() + 24);
        write!(out, "data: {{\"{}\": \"", self.key())?;
        escape_into(&mut out, text)?;
        out.write_str("\"}\n\n")?;
        Ok(Bytes::from(out))
    }
}

/// Escapes `"`, newline, carriage return and tab as `\"`, `\n`, `\r`, `\t`.
///
/// Every other character, backslash included, is copied unchanged.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String cannot fail.
    let _ = escape_into(&mut out, text);
    out
}

fn escape_into<W: Write>(out: &mut W, text: &str) -> std::fmt::Result {
    let mut start = 0;
    for (i, c) in text.char_indices() {
        let replacement = match c {
            '"' => "\\\"",
            '\n' => "\\n",
            '\r' => "\\r",
            '\t' => "\\t",
            _ => continue,
        };
        out.write_str(&text[start..i])?;
        out.write_str(replacement)?;
        start = i + c.len_utf8();
    }
    out.write_str(&text[start..])
}

/// Encodes an error frame, never failing.
fn error_frame(message: impl Into<String>) -> Bytes {
    Frame::Error(message.into())
        .encode()
        .unwrap_or_else(|_| Bytes::from_static(FALLBACK_ERROR_FRAME.as_bytes()))
}

/// Turns model chunks into wire-ready event frames, preserving order.
///
/// N successful chunks yield N content frames. If the source yields an error
/// after K chunks, the output is K content frames followed by one error frame
/// and the stream ends there.
pub fn frame_stream(mut chunks: ChunkStream) -> FrameStream {
    Box::pin(async_stream::stream! {
        let mut sent = 0usize;
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => match Frame::Content(chunk).encode() {
                    Ok(frame) => {
                        sent += 1;
                        yield frame;
                    }
                    Err(e) => {
                        warn!(error = %e, index = sent, "dropping unencodable chunk");
                        yield error_frame(e.to_string());
                    }
                },
                Err(e) => {
                    warn!(error = %e, frames = sent, "upstream stream failed");
                    yield error_frame(e.to_string());
                    break;
                }
            }
        }
        debug!(frames = sent, "event stream finished");
    })
}

#[cfg(test)]
mod tests {
    use futures::stream;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::llm::LlmError;

    fn unescape(text: &str) -> String {
        let mut out = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('"') => out.push('"'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        }
        out
    }

    async fn collect(chunks: Vec<Result<String, LlmError>>) -> Vec<String> {
        frame_stream(Box::pin(stream::iter(chunks)))
            .map(|b| String::from_utf8(b.to_vec()).unwrap())
            .collect()
            .await
    }

    #[test]
    fn escape_special_characters() {
        assert_eq!(escape("a\"b\nc\rd\te"), "a\\\"b\\nc\\rd\\te");
        assert_eq!(escape("plain <div class='x'>"), "plain <div class='x'>");
        assert_eq!(escape(""), "");
    }

    #[test]
    fn escaped_text_has_no_raw_specials_and_round_trips() {
        let samples = [
            "line1\nline2\"",
            "\r\n\t\"\"",
            "<p class=\"lead\">\n\tHello, 世界\r\n</p>",
            "no specials at all",
        ];
        for sample in samples {
            let escaped = escape(sample);
            assert!(!escaped.contains(['\n', '\r', '\t']), "{escaped:?}");
            assert_eq!(escaped.matches('"').count(), escaped.matches("\\\"").count());
            assert_eq!(unescape(&escaped), sample);
        }
    }

    #[test]
    fn content_frame_wire_format() {
        let frame = Frame::Content("line1\nline2\"".into()).encode().unwrap();
        assert_eq!(
            std::str::from_utf8(&frame).unwrap(),
            "data: {\"content\": \"line1\\nline2\\\"\"}\n\n"
        );
    }

    #[test]
    fn error_frame_wire_format() {
        let frame = Frame::Error("bad \"key\"".into()).encode().unwrap();
        assert_eq!(
            std::str::from_utf8(&frame).unwrap(),
            "data: {\"error\": \"bad \\\"key\\\"\"}\n\n"
        );
    }

    #[tokio::test]
    async fn n_chunks_give_n_frames_in_order() {
        let frames = collect(vec![
            Ok("<html>".into()),
            Ok("\n<body>".into()),
            Ok("</body></html>".into()),
        ])
        .await;
        assert_eq!(
            frames,
            vec![
                "data: {\"content\": \"<html>\"}\n\n",
                "data: {\"content\": \"\\n<body>\"}\n\n",
                "data: {\"content\": \"</body></html>\"}\n\n",
            ]
        );
    }

    #[tokio::test]
    async fn empty_source_gives_no_frames() {
        assert!(collect(vec![]).await.is_empty());
    }

    #[tokio::test]
    async fn failure_after_k_chunks_gives_k_frames_and_one_error() {
        let frames = collect(vec![
            Ok("a".into()),
            Ok("b".into()),
            Err(LlmError::RateLimited("quota \"exceeded\"".into())),
            Ok("never sent".into()),
        ])
        .await;
        assert_eq!(
            frames,
            vec![
                "data: {\"content\": \"a\"}\n\n",
                "data: {\"content\": \"b\"}\n\n",
                "data: {\"error\": \"rate limited by upstream: quota \\\"exceeded\\\"\"}\n\n",
            ]
        );
    }

    #[tokio::test]
    async fn immediate_failure_gives_single_error_frame() {
        let frames = collect(vec![Err(LlmError::MalformedResponse("eof".into()))]).await;
        assert_eq!(
            frames,
            vec!["data: {\"error\": \"malformed upstream response: eof\"}\n\n"]
        );
    }
}
