// Test harness: container bootstrap and application wiring

use crate::config::HarnessConfig;
use crate::error::Result;
use crate::test_client::TestClient;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use trellis_core::logging::LogConfig;
use trellis_core::{Application, Container, Error, ErrorHandlerMiddleware, PassThroughMiddleware};

/// Configures an application after its factory has built it.
///
/// Pipeline providers pipe middleware, routes providers add routes.
pub type Provider =
    Arc<dyn Fn(&Application, &Container) -> std::result::Result<(), Error> + Send + Sync>;

type ContainerFactory = Arc<dyn Fn() -> std::result::Result<Container, Error> + Send + Sync>;

/// Sets up a fresh container for each test and hands out clients bound to it.
///
/// Setup does the following, in order:
///
/// 1. builds a container with the factory and allows overrides on it;
/// 2. replaces the error handler with a pass-through stage so handler
///    errors reach the test (unless disabled in the config);
/// 3. replaces every `pass_through` middleware from the config;
/// 4. adds a delegator on [`Application::SERVICE`] that runs the pipeline
///    providers and then the routes providers on the freshly built
///    application.
///
/// ```rust
/// use trellis_core::{Application, Container, Request, Response};
/// use trellis_testing::TestHarness;
///
/// let harness = TestHarness::new(|| {
///     let container = Container::new();
///     Application::register(&container)?;
///     Ok(container)
/// })
/// .routes(|app, _container| app.get("/ping", |_req: Request| Ok(Response::text("pong"))));
///
/// let client = harness.client().unwrap();
/// client.get("/ping", &[]).unwrap().assert_ok().assert_see("pong");
/// ```
#[derive(Clone)]
pub struct TestHarness {
    container_factory: ContainerFactory,
    pipeline: Vec<Provider>,
    routes: Vec<Provider>,
    config: HarnessConfig,
}

impl TestHarness {
    pub fn new<F>(container_factory: F) -> Self
    where
        F: Fn() -> std::result::Result<Container, Error> + Send + Sync + 'static,
    {
        Self {
            container_factory: Arc::new(container_factory),
            pipeline: Vec::new(),
            routes: Vec::new(),
            config: HarnessConfig::default(),
        }
    }

    pub fn with_config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn pipeline<F>(mut self, provider: F) -> Self
    where
        F: Fn(&Application, &Container) -> std::result::Result<(), Error> + Send + Sync + 'static,
    {
        self.pipeline.push(Arc::new(provider));
        self
    }

    pub fn routes<F>(mut self, provider: F) -> Self
    where
        F: Fn(&Application, &Container) -> std::result::Result<(), Error> + Send + Sync + 'static,
    {
        self.routes.push(Arc::new(provider));
        self
    }

    /// Build and wire a fresh container.
    pub fn setup(&self) -> Result<Container> {
        if let Some(level) = self.config.log_level()? {
            LogConfig::new().level(level).init();
        }

        let container = (self.container_factory)()?;
        container.set_allow_override(true);

        if self.config.disable_error_handler {
            container.set_middleware(ErrorHandlerMiddleware::SERVICE, PassThroughMiddleware)?;
        }
        for name in &self.config.pass_through {
            container.set_middleware(name.as_str(), PassThroughMiddleware)?;
        }

        let providers: Vec<Provider> = self.pipeline.iter().chain(&self.routes).cloned().collect();
        container.add_delegator(
            Application::SERVICE,
            move |container: &Container, app: Arc<Application>| {
                for provider in &providers {
                    provider(app.as_ref(), container)?;
                }
                Ok(app)
            },
        );

        debug!(
            pipeline = self.pipeline.len(),
            routes = self.routes.len(),
            pass_through = self.config.pass_through.len(),
            "Test harness ready"
        );
        Ok(container)
    }

    /// A client bound to a freshly set up container.
    pub fn client(&self) -> Result<TestClient> {
        let mut client = TestClient::new(self.setup()?);
        if !self.config.server.is_empty() {
            client.with_server_variables(self.config.server_variables());
        }
        Ok(client)
    }
}

impl fmt::Debug for TestHarness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestHarness")
            .field("pipeline", &self.pipeline.len())
            .field("routes", &self.routes.len())
            .field("config", &self.config)
            .finish()
    }
}
