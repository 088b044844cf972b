//! Middleware pipeline — composable logic wrapped around every routed request.
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining chain; call [`Next::run`] to advance.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`LoggerMiddleware`] — one `tracing` record per request.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio::time::Instant;

use crate::{Response, StatusCode, context::Context};

/// A type-erased, reference-counted middleware function.
///
/// The router appends the matched endpoint as the last entry of the chain, so
/// a well-formed chain always ends in a handler that ignores its `Next`.
pub type MiddlewareHandler = Arc<
    dyn Fn(Context, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static,
>;

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
pub fn from_middleware<M>(middleware: Arc<M>) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// A cursor into the remaining middleware chain for a single request.
///
/// Consumed by [`run`](Self::run), so each layer can forward at most once.
pub struct Next {
    middlewares: Arc<[MiddlewareHandler]>,
    index: usize,
}

impl Next {
    /// Creates a `Next` positioned at the start of `middlewares`.
    pub fn new(middlewares: impl Into<Arc<[MiddlewareHandler]>>) -> Self {
        Self {
            middlewares: middlewares.into(),
            index: 0,
        }
    }

    /// Invokes the next layer and returns its response.
    ///
    /// An exhausted chain answers `500 Internal Server Error`.
    pub async fn run(mut self, ctx: Context) -> Response {
        let handler = self.middlewares.get(self.index).cloned();
        match handler {
            Some(handler) => {
                self.index += 1;
                handler(ctx, self).await
            }
            None => Response::new(StatusCode::InternalServerError)
                .body("No response generated by middleware pipeline"),
        }
    }
}

/// The core trait for middleware.
///
/// Implementations may pass through (`next.run(ctx).await`), short-circuit by
/// returning a response directly, or decorate the downstream response.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

/// Logs method, path, status, whether the body streams, and time to response head.
///
/// For event streams the elapsed time covers only the work done before the
/// first frame is pulled; frames are produced afterwards by the server.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().as_str().to_owned();
            let path = ctx.request().path().to_owned();

            let response = next.run(ctx).await;

            tracing::info!(
                %method,
                %path,
                status = response.status().as_u16(),
                streaming = response.is_streaming(),
                elapsed = ?start.elapsed(),
                "request handled"
            );

            response
        })
    }
}
