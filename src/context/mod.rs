//! Per-request context handed to middleware and route handlers.

use crate::Request;

/// A request as seen by the handler pipeline.
pub struct Context {
    request: Request,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self { request }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The request body as an owned string, with invalid UTF-8 replaced.
    pub fn body_text(&self) -> String {
        self.request.body_text().into_owned()
    }
}
