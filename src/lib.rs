//! # landing-forge
//!
//! A small HTTP service that forwards prompts to a chat-completion model and
//! returns the generated content, either as one HTML response or as a
//! Server-Sent Events stream of chunks. Landing-page requests wrap the user's
//! requirements in a fixed Tailwind CSS instruction template.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use landing_forge::{api, config::Config, generator::ContentGenerator, llm::OpenAiChatModel};
//! use landing_forge::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let generator = ContentGenerator::new(Arc::new(OpenAiChatModel::new(config.openai)));
//!     let router = Arc::new(api::router(generator));
//!
//!     let server = Server::bind(&config.addr).await?;
//!     server
//!         .run(move |req: landing_forge::Request| {
//!             let router = Arc::clone(&router);
//!             async move { router.route(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

// ── Transport ─────────────────────────────────────────────────────────────────
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

// ── Application ───────────────────────────────────────────────────────────────
pub mod api;
pub mod config;
pub mod generator;
pub mod llm;
pub mod sse;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
