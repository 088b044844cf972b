//! HTTP endpoints for content and landing-page generation.
//!
//! | Method & path                              | Input                     | Output            |
//! |--------------------------------------------|---------------------------|-------------------|
//! | `GET /`                                    |                           | index page        |
//! | `POST /api/ai/generate`                    | body = prompt             | HTML              |
//! | `POST /api/ai/generate-landing-page`       | `prompt` query/form param | HTML              |
//! | `POST /api/ai/generate-stream`             | body = prompt             | event stream      |
//! | `GET /api/ai/generate-landing-page-stream` | `prompt` query param      | event stream      |
//!
//! Blank landing-page requirements are rejected with `400` before any model
//! call, on the streaming route as well, since no stream is opened for them.

use std::sync::Arc;

use tracing::{error, warn};

use crate::context::Context;
use crate::generator::{ContentGenerator, GenerateError};
use crate::middleware::LoggerMiddleware;
use crate::sse::frame_stream;
use crate::{Response, Router, StatusCode};

const INDEX_HTML: &str = include_str!("../../static/index.html");

const INVALID_PROMPT: &str = "<div class='text-red-500'>Please provide a valid prompt</div>";

/// Builds the application router, with request logging, around `generator`.
pub fn router(generator: ContentGenerator) -> Router {
    let generator = Arc::new(generator);
    let mut router = Router::new();
    router.layer(LoggerMiddleware);

    router.get("/", |_ctx: Context| async { Response::new(StatusCode::Ok).html(INDEX_HTML) });

    let g = Arc::clone(&generator);
    router.post("/api/ai/generate", move |ctx: Context| {
        generate(Arc::clone(&g), ctx)
    });

    let g = Arc::clone(&generator);
    router.post("/api/ai/generate-landing-page", move |ctx: Context| {
        generate_landing_page(Arc::clone(&g), ctx)
    });

    let g = Arc::clone(&generator);
    router.post("/api/ai/generate-stream", move |ctx: Context| {
        generate_stream(Arc::clone(&g), ctx)
    });

    let g = generator;
    router.get("/api/ai/generate-landing-page-stream", move |ctx: Context| {
        generate_landing_page_stream(Arc::clone(&g), ctx)
    });

    router
}

async fn generate(generator: Arc<ContentGenerator>, ctx: Context) -> Response {
    let prompt = ctx.body_text();
    match generator.generate_content(&prompt).await {
        Ok(content) => Response::new(StatusCode::Ok).html(content),
        Err(e) => {
            error!(error = %e, "content generation failed");
            Response::new(StatusCode::InternalServerError).html(format!(
                "Error generating content: {}",
                escape_html(&e.to_string())
            ))
        }
    }
}

async fn generate_landing_page(generator: Arc<ContentGenerator>, ctx: Context) -> Response {
    let requirements = ctx.request().param("prompt").unwrap_or_default();
    match generator.generate_landing_page_html(&requirements).await {
        Ok(html) => Response::new(StatusCode::Ok).html(html),
        Err(GenerateError::Validation(reason)) => invalid_prompt(reason),
        Err(e) => {
            error!(error = %e, "landing page generation failed");
            Response::new(StatusCode::InternalServerError).html(format!(
                "<div class='text-red-500'>Error generating landing page: {}</div>",
                escape_html(&e.to_string())
            ))
        }
    }
}

async fn generate_stream(generator: Arc<ContentGenerator>, ctx: Context) -> Response {
    let chunks = generator.generate_content_stream(ctx.body_text());
    Response::event_stream(frame_stream(chunks))
}

async fn generate_landing_page_stream(generator: Arc<ContentGenerator>, ctx: Context) -> Response {
    let requirements = ctx.request().param("prompt").unwrap_or_default();
    match generator.generate_landing_page_html_stream(&requirements) {
        Ok(chunks) => Response::event_stream(frame_stream(chunks)),
        Err(GenerateError::Validation(reason)) => invalid_prompt(reason),
        Err(e) => {
            error!(error = %e, "landing page stream failed to start");
            Response::new(StatusCode::InternalServerError).html(format!(
                "<div class='text-red-500'>Error generating landing page: {}</div>",
                escape_html(&e.to_string())
            ))
        }
    }
}

fn invalid_prompt(reason: &str) -> Response {
    warn!(reason, "rejecting landing page request");
    Response::new(StatusCode::BadRequest).html(INVALID_PROMPT)
}

/// Escapes text for interpolation into an HTML fragment.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
