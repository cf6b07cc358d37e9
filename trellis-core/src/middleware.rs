// Middleware system for request/response processing

use crate::logging::{debug, error, trace};
use crate::{Error, Request, Response};
use std::sync::Arc;

/// Anything that turns a request into a response.
pub trait Handler: Send + Sync {
    fn handle(&self, req: Request) -> Result<Response, Error>;
}

impl<F> Handler for F
where
    F: Fn(Request) -> Result<Response, Error> + Send + Sync,
{
    fn handle(&self, req: Request) -> Result<Response, Error> {
        self(req)
    }
}

/// A pipeline stage: may answer on its own or delegate to `next`.
pub trait Middleware: Send + Sync {
    fn process(&self, req: Request, next: &dyn Handler) -> Result<Response, Error>;
}

/// Middleware built from a closure.
pub struct FnMiddleware<F>(F);

/// Wrap a closure as a [`Middleware`].
///
/// ```rust
/// use trellis_core::{from_fn, Handler, Request};
///
/// let tag = from_fn(|req: Request, next: &dyn Handler| {
///     let response = next.handle(req)?;
///     Ok(response.with_header("X-Tagged", "yes"))
/// });
/// # let _ = tag;
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(Request, &dyn Handler) -> Result<Response, Error> + Send + Sync,
{
    FnMiddleware(f)
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(Request, &dyn Handler) -> Result<Response, Error> + Send + Sync,
{
    fn process(&self, req: Request, next: &dyn Handler) -> Result<Response, Error> {
        (self.0)(req, next)
    }
}

/// The remainder of a pipeline, seen from one stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    fallback: &'a dyn Handler,
}

impl<'a> Next<'a> {
    pub fn new(stages: &'a [Arc<dyn Middleware>], fallback: &'a dyn Handler) -> Self {
        Self { stages, fallback }
    }
}

impl Handler for Next<'_> {
    fn handle(&self, req: Request) -> Result<Response, Error> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                trace!(remaining = rest.len(), "Executing middleware");
                stage.process(req, &Next::new(rest, self.fallback))
            }
            None => {
                trace!("Middleware chain complete, calling handler");
                self.fallback.handle(req)
            }
        }
    }
}

/// Run `req` through `stages` in order, ending at `fallback`.
pub fn dispatch(
    stages: &[Arc<dyn Middleware>],
    fallback: &dyn Handler,
    req: Request,
) -> Result<Response, Error> {
    debug!(
        middleware_count = stages.len(),
        method = %req.method(),
        path = %req.path(),
        "Executing middleware chain"
    );
    Next::new(stages, fallback).handle(req)
}

// ========== Built-in Middleware ==========

/// Identity stage: forwards the request to the next stage untouched.
///
/// Registered in place of a real stage to switch it off for a test.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThroughMiddleware;

impl Middleware for PassThroughMiddleware {
    fn process(&self, req: Request, next: &dyn Handler) -> Result<Response, Error> {
        next.handle(req)
    }
}

/// Converts errors raised further down the pipeline into responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorHandlerMiddleware;

impl ErrorHandlerMiddleware {
    /// Container name the default pipeline pipes this stage under.
    pub const SERVICE: &'static str = "error_handler";
}

impl Middleware for ErrorHandlerMiddleware {
    fn process(&self, req: Request, next: &dyn Handler) -> Result<Response, Error> {
        let method = req.method().clone();
        let path = req.path().to_string();

        match next.handle(req) {
            Ok(response) => Ok(response),
            Err(err) => {
                let status = err.status_code();
                error!(%method, %path, status, error = %err, "Request failed");
                Ok(Response::new(status)
                    .with_header("Content-Type", "text/plain; charset=utf-8")
                    .with_body(err.to_string()))
            }
        }
    }
}
