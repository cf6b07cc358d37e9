//! Testing utilities for Trellis applications.
//!
//! Everything runs in-process: requests are fabricated from a simulated
//! server environment, dispatched straight into the application's pipeline,
//! and the response is wrapped for fluent assertions. No socket is opened.
//!
//! ## Features
//!
//! - **RequestBuilder** - synthetic requests from environment variables,
//!   bodies, cookies and uploaded files
//! - **TestResponse** - chained status, header, cookie, body and JSON checks
//! - **TestClient** - `get`/`post`/`json`/`call` helpers with accumulated
//!   default headers and cookies
//! - **TestHarness** - fresh container per test, pipeline and routes wiring,
//!   middleware switched off by name
//! - **json_path** - dot paths with `*` wildcards over JSON documents
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use trellis_core::{Application, Container, Request, Response};
//! use trellis_testing::TestHarness;
//!
//! let harness = TestHarness::new(|| {
//!     let container = Container::new();
//!     Application::register(&container)?;
//!     Ok(container)
//! })
//! .routes(|app, _| {
//!     app.get("/users/{id}", |req: Request| {
//!         Response::json(&json!({"data": {"id": req.attribute("id"), "roles": ["admin"]}}))
//!     })
//! });
//!
//! let client = harness.client().unwrap();
//! client
//!     .get_json("/users/7", &[])
//!     .unwrap()
//!     .assert_ok()
//!     .assert_header("Content-Type", Some("application/json"))
//!     .assert_json(&json!({"data": {"id": "7", "roles": ["admin"]}}))
//!     .assert_json_path("data.id", &json!(7))
//!     .assert_json_count(1, Some("data.roles"));
//! ```
//!
//! ## Building Requests Directly
//!
//! ```rust
//! use trellis_testing::RequestBuilder;
//!
//! let request = RequestBuilder::new()
//!     .server("REQUEST_METHOD", "PUT")
//!     .server("REQUEST_URI", "/items/3?draft=1")
//!     .cookie("session", "abc")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(request.path(), "/items/3");
//! assert_eq!(request.query("draft"), Some("1"));
//! assert_eq!(request.cookie("session"), Some("abc"));
//! ```

pub mod assertions;
pub mod config;
pub mod cookies;
pub mod environment;
pub mod error;
pub mod harness;
pub mod json_path;
pub mod request_builder;
pub mod test_client;
pub mod test_response;
pub mod uploads;

pub use config::HarnessConfig;
pub use cookies::{CookieExpiry, SameSite, SetCookie};
pub use environment::Environment;
pub use error::{Result, TestingError};
pub use harness::{Provider, TestHarness};
pub use json_path::Segment;
pub use request_builder::{Body, RequestBuilder, parse_query};
pub use test_client::{CallRequest, TestClient};
pub use test_response::TestResponse;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Body, CallRequest, CookieExpiry, Environment, HarnessConfig, RequestBuilder, TestClient,
        TestHarness, TestResponse, TestingError,
    };
    pub use serde_json::json;
}
