// Trellis - in-process testing for middleware-pipeline applications
//
// This library bundles the request/response model, service container and
// pipeline from trellis-core with the request builder, fluent response
// assertions and test harness from trellis-testing.

// Re-export core functionality
pub use trellis_core::*;

// Re-export optional crates
#[cfg(feature = "testing")]
pub use trellis_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Application, Container, Error, ErrorHandlerMiddleware, Handler, HeaderMap, Method,
        Middleware, PassThroughMiddleware, Request, Response, ResponseParts, Router, from_fn,
    };

    #[cfg(feature = "testing")]
    pub use trellis_testing::prelude::*;
}
