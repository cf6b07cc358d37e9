// Application: middleware pipeline plus router

use crate::container::{Container, WeakContainer};
use crate::logging::{debug, info};
use crate::middleware::{self, Handler, Middleware};
use crate::routing::Router;
use crate::{Error, Request, Response};
use http::Method;
use parking_lot::RwLock;
use std::sync::Arc;

/// One entry of the pipeline.
#[derive(Clone)]
enum Stage {
    /// Resolved from the container on every dispatch
    Named(String),
    Instance(Arc<dyn Middleware>),
}

/// The request handler under test.
///
/// Requests flow through the piped stages in order and end at the router.
/// Stages piped by name are looked up in the container each time a request
/// is dispatched, so replacing a container entry changes the behavior of an
/// application that was already configured.
///
/// Configuration methods take `&self`; the application lives in the
/// container as a shared service and is configured after it is built.
///
/// ```rust
/// use trellis_core::{Application, Container, Handler, Request, Response};
/// use http::Method;
///
/// let container = Container::new();
/// let app = Application::new(&container);
/// app.get("/ping", |_req: Request| Ok(Response::text("pong"))).unwrap();
///
/// let response = app.handle(Request::new(Method::GET, "/ping")).unwrap();
/// assert_eq!(response.body_string(), "pong");
/// ```
pub struct Application {
    container: WeakContainer,
    pipeline: RwLock<Vec<Stage>>,
    router: RwLock<Arc<Router>>,
}

impl Application {
    /// Container name the application is registered under.
    pub const SERVICE: &'static str = "application";

    pub fn new(container: &Container) -> Self {
        Self {
            container: container.downgrade(),
            pipeline: RwLock::new(Vec::new()),
            router: RwLock::new(Arc::new(Router::new())),
        }
    }

    /// Register the default factory for [`Application::SERVICE`].
    pub fn register(container: &Container) -> Result<(), Error> {
        container.register_factory(Self::SERVICE, |c: &Container| Ok(Application::new(c)))
    }

    /// Resolve the application from `container`.
    pub fn from_container(container: &Container) -> Result<Arc<Application>, Error> {
        container.get::<Application>(Self::SERVICE)
    }

    /// Append a stage that is resolved from the container by name.
    pub fn pipe(&self, name: impl Into<String>) {
        let name = name.into();
        debug!(middleware = %name, "Piping middleware");
        self.pipeline.write().push(Stage::Named(name));
    }

    /// Append a middleware instance.
    pub fn pipe_middleware<M: Middleware + 'static>(&self, middleware: M) {
        debug!("Piping middleware instance");
        self.pipeline.write().push(Stage::Instance(Arc::new(middleware)));
    }

    /// Names of stages piped by name, in order.
    pub fn piped_names(&self) -> Vec<String> {
        self.pipeline
            .read()
            .iter()
            .filter_map(|stage| match stage {
                Stage::Named(name) => Some(name.clone()),
                Stage::Instance(_) => None,
            })
            .collect()
    }

    /// Register a route; `None` matches any method.
    pub fn route<F>(&self, method: Option<Method>, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        let mut router = self.router.write();
        Arc::make_mut(&mut router).add(method, pattern, handler)
    }

    pub fn get<F>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.route(Some(Method::GET), pattern, handler)
    }

    pub fn post<F>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.route(Some(Method::POST), pattern, handler)
    }

    pub fn put<F>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.route(Some(Method::PUT), pattern, handler)
    }

    pub fn patch<F>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.route(Some(Method::PATCH), pattern, handler)
    }

    pub fn delete<F>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.route(Some(Method::DELETE), pattern, handler)
    }

    pub fn any<F>(&self, pattern: &str, handler: F) -> Result<(), Error>
    where
        F: Fn(Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.route(None, pattern, handler)
    }

    fn resolve_pipeline(&self) -> Result<Vec<Arc<dyn Middleware>>, Error> {
        let stages = self.pipeline.read().clone();
        if stages.iter().all(|s| matches!(s, Stage::Instance(_))) {
            return Ok(stages
                .into_iter()
                .filter_map(|s| match s {
                    Stage::Instance(m) => Some(m),
                    Stage::Named(_) => None,
                })
                .collect());
        }

        let container = self.container.upgrade().ok_or(Error::ContainerDropped)?;
        stages
            .into_iter()
            .map(|stage| match stage {
                Stage::Named(name) => container.get_middleware(&name),
                Stage::Instance(m) => Ok(m),
            })
            .collect()
    }
}

impl Handler for Application {
    fn handle(&self, req: Request) -> Result<Response, Error> {
        let stages = self.resolve_pipeline()?;
        let router = self.router.read().clone();
        info!(method = %req.method(), uri = %req.uri(), "Dispatching request");
        middleware::dispatch(&stages, router.as_ref(), req)
    }
}
