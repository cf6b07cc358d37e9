// Core library for Trellis
// The request/response model, service container and middleware pipeline
// that applications are built from and that trellis-testing drives.

pub mod application;
pub mod container;
pub mod error;
pub mod headers;
pub mod http;
pub mod logging;
pub mod middleware;
pub mod routing;

// Re-export commonly used types
pub use application::Application;
pub use container::{Container, WeakContainer};
pub use error::Error;
pub use headers::HeaderMap;
pub use http::*;
pub use middleware::{
    dispatch, from_fn, ErrorHandlerMiddleware, FnMiddleware, Handler, Middleware, Next,
    PassThroughMiddleware,
};
pub use routing::Router;

pub use ::http::Method;
