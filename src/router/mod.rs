//! Request routing — map exact paths and HTTP methods to handler functions.
//!
//! Trailing slashes are normalized on both registered paths and incoming paths,
//! so `/api/ai/generate/` and `/api/ai/generate` are equivalent. Routes are
//! matched in registration order; the first route whose method and path both
//! match wins. A path that is registered only for other methods answers
//! `405 Method Not Allowed` with an `Allow` header; anything else is `404`.
//!
//! Every request, matched or not, runs through the middleware stack installed
//! with [`Router::layer`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::middleware::{Middleware, MiddlewareHandler, Next, from_middleware};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased async handler that processes a [`Context`] and returns a [`Response`].
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Any `Fn(Context) -> impl Future<Output = Response> + Send` that is also
/// `Send + Sync + 'static` implements this trait via the blanket impl below.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

fn normalize(path: &str) -> &str {
    if path != "/" && path.ends_with('/') {
        &path[..path.len() - 1]
    } else {
        path
    }
}

// Endpoint used when no route matches; `allow` lists the methods the path does accept.
fn fallback(status: StatusCode, allow: Option<String>) -> Handler {
    Arc::new(
        move |_ctx: Context| -> Pin<Box<dyn Future<Output = Response> + Send>> {
            let mut response = Response::new(status).body(status.canonical_reason());
            if let Some(allow) = &allow {
                response.add_header("Allow", allow.clone());
            }
            Box::pin(async move { response })
        },
    )
}

struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// HTTP request router with an optional middleware stack.
///
/// # Examples
///
/// ```rust,no_run
/// use landing_forge::context::Context;
/// use landing_forge::{Router, Response, StatusCode};
/// use landing_forge::middleware::LoggerMiddleware;
///
/// let mut router = Router::new();
/// router.layer(LoggerMiddleware);
/// router.get("/health", |_ctx: Context| async { Response::new(StatusCode::Ok).body("ok") });
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    middlewares: Vec<MiddlewareHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `GET` requests to `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    /// Register a handler for `POST` requests to `path`.
    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    /// Append `middleware` to the stack. Earlier layers wrap later ones.
    pub fn layer(&mut self, middleware: impl Middleware + 'static) {
        self.middlewares.push(from_middleware(Arc::new(middleware)));
    }

    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx: Context| handler.call(ctx));
        self.routes.push(Route {
            method,
            path: normalize(path).to_owned(),
            handler,
        });
    }

    // Pick the endpoint for `method` + `path`, falling back to a 405 or 404 responder.
    fn resolve(&self, method: &Method, path: &str) -> Handler {
        let path = normalize(path);
        let mut allowed: Vec<&str> = Vec::new();

        for route in self.routes.iter().filter(|r| r.path == path) {
            if &route.method == method {
                return Arc::clone(&route.handler);
            }
            if !allowed.contains(&route.method.as_str()) {
                allowed.push(route.method.as_str());
            }
        }

        if allowed.is_empty() {
            fallback(StatusCode::NotFound, None)
        } else {
            fallback(StatusCode::MethodNotAllowed, Some(allowed.join(", ")))
        }
    }

    /// Dispatch `request` through the middleware stack to its endpoint.
    pub async fn route(&self, request: Request) -> Response {
        let endpoint = self.resolve(request.method(), request.path());
        let ctx = Context::new(request);

        if self.middlewares.is_empty() {
            return endpoint(ctx).await;
        }

        let terminal: MiddlewareHandler = Arc::new(move |ctx: Context, _next: Next| endpoint(ctx));
        let mut chain = self.middlewares.clone();
        chain.push(terminal);
        Next::new(chain).run(ctx).await
    }
}
