// Routing system for HTTP requests

use crate::logging::{debug, trace};
use crate::middleware::Handler;
use crate::{Error, Request, Response};
use http::Method;
use std::sync::Arc;

/// Handlers registered for one path pattern.
#[derive(Clone)]
struct Endpoint {
    pattern: String,
    /// `None` accepts any method
    methods: Vec<(Option<Method>, Arc<dyn Handler>)>,
}

impl Endpoint {
    fn find(&self, method: &Method) -> Option<&Arc<dyn Handler>> {
        self.methods
            .iter()
            .find(|(m, _)| m.as_ref() == Some(method))
            .or_else(|| self.methods.iter().find(|(m, _)| m.is_none()))
            .map(|(_, handler)| handler)
    }

    fn allowed(&self) -> String {
        let mut methods: Vec<&str> = self
            .methods
            .iter()
            .filter_map(|(m, _)| m.as_ref().map(Method::as_str))
            .collect();
        methods.sort_unstable();
        methods.dedup();
        methods.join(", ")
    }
}

/// Path router backed by `matchit`.
///
/// Patterns use `{name}` for a single segment and `{*name}` for the rest of
/// the path. Captured values are attached to the request as attributes.
///
/// ```rust
/// use trellis_core::{Handler, Request, Response, Router};
/// use http::Method;
///
/// let mut router = Router::new();
/// router
///     .add(Some(Method::GET), "/users/{id}", |req: Request| {
///         Ok(Response::text(req.attribute("id").unwrap_or_default().to_string()))
///     })
///     .unwrap();
///
/// let response = router.handle(Request::new(Method::GET, "/users/7")).unwrap();
/// assert_eq!(response.body_string(), "7");
/// ```
#[derive(Clone)]
pub struct Router {
    matcher: matchit::Router<usize>,
    endpoints: Vec<Endpoint>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            matcher: matchit::Router::new(),
            endpoints: Vec::new(),
        }
    }

    /// Register `handler` for `method` (or any method) at `pattern`.
    pub fn add<F>(&mut self, method: Option<Method>, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.add_arc(method, pattern, Arc::new(handler))
    }

    pub fn add_arc(
        &mut self,
        method: Option<Method>,
        pattern: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<(), Error> {
        let index = match self.endpoints.iter().position(|e| e.pattern == pattern) {
            Some(index) => index,
            None => {
                let index = self.endpoints.len();
                self.matcher
                    .insert(pattern, index)
                    .map_err(|e| Error::Route(format!("{}: {}", pattern, e)))?;
                self.endpoints.push(Endpoint {
                    pattern: pattern.to_string(),
                    methods: Vec::new(),
                });
                index
            }
        };

        debug!(
            method = method.as_ref().map(Method::as_str).unwrap_or("*"),
            pattern,
            "Route registered"
        );
        self.endpoints[index].methods.push((method, handler));
        Ok(())
    }

    /// Number of distinct path patterns.
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Handler for Router {
    fn handle(&self, req: Request) -> Result<Response, Error> {
        let (endpoint, params) = match self.matcher.at(req.path()) {
            Ok(matched) => {
                let params: Vec<(String, String)> = matched
                    .params
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect();
                (&self.endpoints[*matched.value], params)
            }
            Err(_) => {
                debug!(path = %req.path(), "No route matched");
                return Ok(Response::not_found()
                    .with_header("Content-Type", "text/plain; charset=utf-8")
                    .with_body(format!("Cannot {} {}", req.method(), req.path())));
            }
        };

        let Some(handler) = endpoint.find(req.method()) else {
            debug!(method = %req.method(), pattern = %endpoint.pattern, "Method not allowed");
            return Ok(Response::new(405).with_header("Allow", endpoint.allowed()));
        };

        trace!(pattern = %endpoint.pattern, params = params.len(), "Route matched");
        let req = params
            .into_iter()
            .fold(req, |req, (name, value)| req.with_attribute(name, value));
        handler.handle(req)
    }
}
