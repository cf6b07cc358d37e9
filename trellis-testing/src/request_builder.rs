//! Synthetic request construction.
//!
//! Turns a simulated server environment, a parsed body, a raw body, cookies
//! and uploaded files into one [`Request`], the same way a server adapter
//! would marshal a real incoming request. No socket is involved.
//!
//! ```rust
//! use trellis_testing::RequestBuilder;
//!
//! let request = RequestBuilder::new()
//!     .server("REQUEST_METHOD", "POST")
//!     .server("REQUEST_URI", "/users?page=2")
//!     .server("HTTP_X_API_KEY", "secret")
//!     .body("{\"name\":\"Ada\"}")
//!     .with_request_time(0.0)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(request.method(), "POST");
//! assert_eq!(request.query("page"), Some("2"));
//! assert_eq!(request.header("X-Api-Key"), Some("secret"));
//! assert_eq!(request.body_string(), "{\"name\":\"Ada\"}");
//! ```

use crate::environment::Environment;
use crate::error::{Result, TestingError};
use crate::uploads;
use http::Method;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, trace};
use trellis_core::{ParsedBody, Request, RequestParts, ServerValue, Stream, UploadedFile};

/// Raw body input.
///
/// Only streams, text and "nothing" are valid request bodies; anything else
/// is carried as [`Body::Unsupported`] and rejected when the request is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    /// Used as-is, rewound to the start
    Stream(Stream),
    /// Written into a fresh in-memory stream
    Text(String),
    #[default]
    Empty,
    /// Any other value; names its kind for the error message
    Unsupported(String),
}

impl Body {
    /// Resolve into the stream the request will carry.
    pub fn into_stream(self) -> Result<Stream> {
        match self {
            Body::Stream(mut stream) => {
                stream.rewind();
                Ok(stream)
            }
            Body::Text(text) => {
                let mut stream = Stream::new();
                stream.write_all(text.as_bytes())?;
                stream.rewind();
                Ok(stream)
            }
            Body::Empty => Ok(Stream::new()),
            Body::Unsupported(kind) => Err(TestingError::InvalidBodyType(kind)),
        }
    }
}

impl From<Stream> for Body {
    fn from(stream: Stream) -> Self {
        Body::Stream(stream)
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl<T: Into<Body>> From<Option<T>> for Body {
    fn from(body: Option<T>) -> Self {
        body.map_or(Body::Empty, Into::into)
    }
}

impl From<serde_json::Value> for Body {
    /// JSON strings are text and `null` is no body; any other JSON value is
    /// not a body and is rejected at build time.
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::String(text) => Body::Text(text),
            Value::Null => Body::Empty,
            Value::Bool(_) => Body::Unsupported("boolean".to_string()),
            Value::Number(_) => Body::Unsupported("number".to_string()),
            Value::Array(_) => Body::Unsupported("array".to_string()),
            Value::Object(_) => Body::Unsupported("object".to_string()),
        }
    }
}

/// Builder for synthetic server requests.
///
/// Environment overrides are merged on top of
/// [`Environment::with_defaults`], so an empty builder yields a complete
/// `GET /` request from `localhost`.
#[derive(Debug, Clone, Default)]
pub struct RequestBuilder {
    environment: Environment,
    parsed_body: Option<ParsedBody>,
    body: Body,
    cookies: BTreeMap<String, String>,
    files: Vec<(String, UploadedFile)>,
    request_time: Option<f64>,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one environment override.
    pub fn server(mut self, key: impl Into<String>, value: impl Into<ServerValue>) -> Self {
        self.environment.set(key, value);
        self
    }

    /// Merge a set of environment overrides.
    pub fn environment(mut self, overrides: &Environment) -> Self {
        self.environment.merge(overrides);
        self
    }

    pub fn parsed_body(mut self, parsed_body: ParsedBody) -> Self {
        self.parsed_body = Some(parsed_body);
        self
    }

    /// Form-encoded parsed body.
    pub fn form<K, V, I>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let fields = fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.parsed_body(ParsedBody::Form(fields))
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn cookies<K, V, I>(mut self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.cookies
            .extend(cookies.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach an uploaded file under a (possibly nested) form field name.
    pub fn file(mut self, field: impl Into<String>, file: UploadedFile) -> Self {
        self.files.push((field.into(), file));
        self
    }

    /// Pin `REQUEST_TIME`/`REQUEST_TIME_FLOAT` (seconds since the epoch).
    pub fn with_request_time(mut self, seconds: f64) -> Self {
        self.request_time = Some(seconds);
        self
    }

    pub fn build(self) -> Result<Request> {
        build(
            self.environment,
            self.parsed_body,
            self.body,
            self.cookies,
            self.files,
            self.request_time,
        )
    }
}

/// Build a request from environment overrides, bodies, cookies and files.
///
/// Query parameters come only from the URI's query component, never from
/// `parsed_body`. Fails on an unsupported body, a malformed
/// `SERVER_PROTOCOL`, an invalid method, or conflicting upload field names.
pub fn build(
    overrides: Environment,
    parsed_body: Option<ParsedBody>,
    body: Body,
    cookies: BTreeMap<String, String>,
    files: Vec<(String, UploadedFile)>,
    request_time: Option<f64>,
) -> Result<Request> {
    let mut environment = Environment::with_defaults(request_time);
    environment.merge(&overrides);
    trace!(overrides = overrides.len(), "Merged simulated environment");

    let body = body.into_stream()?;
    let uploaded_files = uploads::normalize(files)?;

    let headers = environment.headers();
    let uri = environment.uri(&headers);
    let query_params = parse_query(&uri.query);

    let protocol = environment.text("SERVER_PROTOCOL").unwrap_or_default();
    let Some(protocol_version) = protocol.split_once('/').map(|(_, v)| v.to_string()) else {
        return Err(TestingError::MalformedProtocol(protocol));
    };

    let method_name = environment
        .text("REQUEST_METHOD")
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "GET".to_string());
    let method = Method::from_bytes(method_name.as_bytes())
        .map_err(|_| TestingError::InvalidMethod(method_name.clone()))?;

    debug!(
        method = %method,
        uri = %uri,
        headers = headers.len(),
        cookies = cookies.len(),
        files = uploaded_files.len(),
        "Built synthetic request"
    );

    Ok(Request::from_parts(RequestParts {
        method,
        uri,
        headers,
        server_params: environment.into_params(),
        query_params,
        parsed_body,
        body,
        cookies,
        uploaded_files,
        protocol_version,
    }))
}

/// Parse a query string into a flat map; the last occurrence of a key wins.
pub fn parse_query(query: &str) -> BTreeMap<String, String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_default()
}
