//! Async TCP server using Tokio.
//!
//! Accepts TCP connections and dispatches HTTP/1.1 requests to a handler function.
//! Buffered responses keep the connection alive; streamed responses are pushed
//! frame by frame with chunked transfer encoding and close the connection when done.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use futures::StreamExt;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::{
    FrameStream, StatusCode,
    request::{Request, RequestError},
    response::{LAST_CHUNK, Response, encode_chunk},
};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Maximum size of a complete HTTP request we will buffer before rejecting it (8 MiB).
const MAX_REQUEST_SIZE: usize = 8 * 1024 * 1024;

/// Initial read buffer capacity per connection.
const INITIAL_BUF_SIZE: usize = 4096;

/// The HTTP server.
///
/// # Examples
///
/// ```rust,no_run
/// use landing_forge::server::Server;
/// use landing_forge::http::{Request, Response, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind("127.0.0.1:8080").await?;
///     server.run(|_req: Request| async {
///         Response::new(StatusCode::Ok).body("Hello!")
///     }).await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Starts accepting connections and dispatching requests to `handler`.
    ///
    /// Each connection runs on its own Tokio task. Runs until the process is
    /// terminated; accept failures are logged and skipped.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "landing-forge listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            debug!(peer = %peer_addr, "connection accepted");
            let handler = Arc::clone(&handler);

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer_addr, handler).await {
                    warn!(peer = %peer_addr, error = %e, "connection closed with error");
                }
            });
        }
    }
}

/// Handles a single TCP connection over its lifetime.
async fn handle_connection<H, F>(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    handler: Arc<H>,
) -> Result<(), std::io::Error>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Only read when the buffer cannot already yield a complete request.
        let parsed = match Request::parse(&buf) {
            Ok((request, body_offset)) => {
                let declared = request.content_length().unwrap_or(0);
                let Some(needed) = body_offset
                    .checked_add(declared)
                    .filter(|&n| n <= MAX_REQUEST_SIZE)
                else {
                    warn!(peer = %peer_addr, declared, "declared body too large — sending 413");
                    reject(&mut stream, StatusCode::PayloadTooLarge, "Request entity too large").await?;
                    break;
                };
                (buf.len() >= needed).then_some((request, needed))
            }
            Err(RequestError::Incomplete) => None,
            Err(e) => {
                warn!(peer = %peer_addr, error = %e, "bad request — sending 400");
                reject(&mut stream, StatusCode::BadRequest, format!("Bad Request: {e}")).await?;
                break;
            }
        };

        let Some((request, consumed)) = parsed else {
            if buf.len() > MAX_REQUEST_SIZE {
                warn!(peer = %peer_addr, "request too large — sending 413");
                reject(&mut stream, StatusCode::PayloadTooLarge, "Request entity too large").await?;
                break;
            }
            if stream.read_buf(&mut buf).await? == 0 {
                debug!(peer = %peer_addr, "connection closed by peer");
                break;
            }
            continue;
        };

        let _ = buf.split_to(consumed);
        let keep_alive = request.is_keep_alive();

        debug!(
            peer = %peer_addr,
            method = %request.method(),
            path = %request.path(),
            "dispatching request"
        );

        let mut response = handler(request).await;
        if !keep_alive {
            response = response.keep_alive(false);
        }
        let close = !response.is_keep_alive();
        let (head, frames) = response.into_parts();
        stream.write_all(&head).await?;
        stream.flush().await?;

        if let Some(frames) = frames {
            push_frames(&mut stream, &mut buf, peer_addr, frames).await?;
            break;
        }

        if close {
            debug!(peer = %peer_addr, "Connection: close — shutting down");
            break;
        }
    }

    Ok(())
}

/// Writes an error response and marks the connection for closing.
async fn reject(
    stream: &mut TcpStream,
    status: StatusCode,
    message: impl Into<String>,
) -> Result<(), std::io::Error> {
    let response = Response::new(status).body(message).keep_alive(false);
    stream.write_all(&response.into_bytes()).await
}

enum StreamEvent {
    Frame(Option<bytes::Bytes>),
    Read(std::io::Result<usize>),
}

/// Writes each frame as its own chunk, flushing as it goes.
///
/// The socket is watched while waiting for the next frame: EOF or a read
/// error means the client has gone, and `frames` is dropped without being
/// polled again, which releases the upstream request behind it.
async fn push_frames(
    stream: &mut TcpStream,
    buf: &mut BytesMut,
    peer_addr: SocketAddr,
    mut frames: FrameStream,
) -> Result<(), std::io::Error> {
    let mut sent = 0usize;

    loop {
        let event = tokio::select! {
            frame = frames.next() => StreamEvent::Frame(frame),
            read = stream.read_buf(buf) => StreamEvent::Read(read),
        };

        match event {
            StreamEvent::Frame(Some(frame)) => {
                stream.write_all(&encode_chunk(&frame)).await?;
                stream.flush().await?;
                sent += 1;
            }
            StreamEvent::Frame(None) => {
                stream.write_all(LAST_CHUNK).await?;
                stream.flush().await?;
                debug!(peer = %peer_addr, frames = sent, "event stream complete");
                return Ok(());
            }
            StreamEvent::Read(Ok(0)) | StreamEvent::Read(Err(_)) => {
                info!(peer = %peer_addr, frames = sent, "client disconnected — abandoning stream");
                return Ok(());
            }
            // Bytes pipelined behind a streaming request are never served.
            StreamEvent::Read(Ok(_)) => buf.clear(),
        }
    }
}
