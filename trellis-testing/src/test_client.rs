// In-process HTTP calls against an application

use crate::environment::{Environment, HEADER_PREFIX, UNPREFIXED_HEADERS};
use crate::error::Result;
use crate::request_builder::{self, Body};
use crate::test_response::TestResponse;
use http::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};
use trellis_core::{
    Application, Container, Handler, ParsedBody, PassThroughMiddleware, ServerValue, UploadedFile,
};

/// Turn a header name into its server-variable key.
///
/// `X-Api-Key` becomes `HTTP_X_API_KEY`. Names already carrying the prefix
/// and the unprefixed pseudo-headers (`CONTENT_TYPE`, `REMOTE_ADDR`) keep
/// their spelling, so `Content-Type` lands on `CONTENT_TYPE`.
pub fn server_key(name: &str) -> String {
    let key = name.to_ascii_uppercase().replace('-', "_");
    if key.starts_with(HEADER_PREFIX) || UNPREFIXED_HEADERS.contains(&key.as_str()) {
        key
    } else {
        format!("{}{}", HEADER_PREFIX, key)
    }
}

/// Add `query` to `uri`, keeping any `#fragment` at the end.
pub fn append_query(uri: &str, query: &str) -> String {
    let (base, fragment) = match uri.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (uri, None),
    };
    let separator = if base.contains('?') { '&' } else { '?' };
    match fragment {
        Some(fragment) => format!("{}{}{}#{}", base, separator, query, fragment),
        None => format!("{}{}{}", base, separator, query),
    }
}

/// One call to the application.
///
/// Everything beyond method and URI is optional.
#[derive(Debug, Clone)]
pub struct CallRequest {
    method: Method,
    uri: String,
    parameters: BTreeMap<String, String>,
    cookies: BTreeMap<String, String>,
    files: Vec<(String, UploadedFile)>,
    server: Environment,
    content: Option<String>,
}

impl CallRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            parameters: BTreeMap::new(),
            cookies: BTreeMap::new(),
            files: Vec::new(),
            server: Environment::new(),
            content: None,
        }
    }

    /// Query parameters for `GET`, form fields otherwise.
    pub fn parameters<K, V, I>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.parameters
            .extend(parameters.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn file(mut self, field: impl Into<String>, file: UploadedFile) -> Self {
        self.files.push((field.into(), file));
        self
    }

    pub fn server(mut self, key: impl Into<String>, value: impl Into<ServerValue>) -> Self {
        self.server.set(key, value);
        self
    }

    /// Raw request body.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Test client dispatching synthetic requests through the container's
/// [`Application`].
///
/// Default headers and cookies accumulate across calls until flushed; each
/// call builds a fresh request from them.
#[derive(Debug, Clone)]
pub struct TestClient {
    container: Container,
    default_headers: BTreeMap<String, String>,
    default_cookies: BTreeMap<String, String>,
    server_variables: Environment,
}

impl TestClient {
    pub fn new(container: Container) -> Self {
        Self {
            container,
            default_headers: BTreeMap::new(),
            default_cookies: BTreeMap::new(),
            server_variables: Environment::new(),
        }
    }

    pub fn container(&self) -> &Container {
        &self.container
    }

    // ========== Request defaults ==========

    /// Merge headers into the defaults sent with every request.
    pub fn with_headers<K, V, I>(&mut self, headers: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.default_headers
                .insert(server_key(name.as_ref()), value.into());
        }
        self
    }

    pub fn with_header(&mut self, name: &str, value: impl Into<String>) -> &mut Self {
        self.default_headers.insert(server_key(name), value.into());
        self
    }

    pub fn flush_headers(&mut self) -> &mut Self {
        self.default_headers.clear();
        self
    }

    /// Merge cookies into the defaults sent with every request.
    pub fn with_cookies<K, V, I>(&mut self, cookies: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.default_cookies
            .extend(cookies.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_cookie(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.default_cookies.insert(name.into(), value.into());
        self
    }

    /// Replace the base server variables.
    ///
    /// Header-derived keys and the call's own method and URI are applied
    /// on top of them.
    pub fn with_server_variables<K, V, I>(&mut self, variables: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ServerValue>,
    {
        self.server_variables = Environment::new();
        for (key, value) in variables {
            self.server_variables.set(key, value);
        }
        self
    }

    /// Simulate arriving from `url` (sets `Referer`).
    pub fn from(&mut self, url: impl Into<String>) -> &mut Self {
        self.with_header("Referer", url)
    }

    /// Replace each named middleware with a stage that forwards the request
    /// unmodified.
    pub fn without_middleware<I, S>(&mut self, names: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.container.set_allow_override(true);
        for name in names {
            let name = name.into();
            debug!(middleware = %name, "Disabling middleware");
            self.container.set_middleware(name, PassThroughMiddleware)?;
        }
        Ok(self)
    }

    // ========== Verb helpers ==========

    pub fn get(&self, uri: &str, headers: &[(&str, &str)]) -> Result<TestResponse> {
        self.send(Method::GET, uri, &[], headers)
    }

    pub fn post(
        &self,
        uri: &str,
        data: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        self.send(Method::POST, uri, data, headers)
    }

    pub fn put(
        &self,
        uri: &str,
        data: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        self.send(Method::PUT, uri, data, headers)
    }

    pub fn patch(
        &self,
        uri: &str,
        data: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        self.send(Method::PATCH, uri, data, headers)
    }

    pub fn delete(
        &self,
        uri: &str,
        data: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        self.send(Method::DELETE, uri, data, headers)
    }

    pub fn options(
        &self,
        uri: &str,
        data: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        self.send(Method::OPTIONS, uri, data, headers)
    }

    /// `GET` expecting JSON back; sends `[]` as the body.
    pub fn get_json(&self, uri: &str, headers: &[(&str, &str)]) -> Result<TestResponse> {
        self.json(Method::GET, uri, &Value::Array(Vec::new()), headers)
    }

    pub fn post_json(
        &self,
        uri: &str,
        data: &Value,
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        self.json(Method::POST, uri, data, headers)
    }

    pub fn put_json(
        &self,
        uri: &str,
        data: &Value,
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        self.json(Method::PUT, uri, data, headers)
    }

    pub fn patch_json(
        &self,
        uri: &str,
        data: &Value,
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        self.json(Method::PATCH, uri, data, headers)
    }

    pub fn delete_json(
        &self,
        uri: &str,
        data: &Value,
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        self.json(Method::DELETE, uri, data, headers)
    }

    /// Send `data` JSON-encoded.
    ///
    /// `Content-Type` and `Accept` default to `application/json` and
    /// `Content-Length` to the encoded size; `headers` override all three.
    pub fn json(
        &self,
        method: Method,
        uri: &str,
        data: &Value,
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        let content = serde_json::to_string(data)?;
        let length = content.len().to_string();

        let mut merged: Vec<(&str, &str)> = vec![
            ("CONTENT_LENGTH", length.as_str()),
            ("CONTENT_TYPE", "application/json"),
            ("Accept", "application/json"),
        ];
        merged.extend_from_slice(headers);

        let request = self
            .headers_to_server(&merged)
            .into_iter()
            .fold(CallRequest::new(method, uri), |request, (key, value)| {
                request.server(key, value)
            })
            .content(content);
        self.call(request)
    }

    fn send(
        &self,
        method: Method,
        uri: &str,
        data: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<TestResponse> {
        let request = self
            .headers_to_server(headers)
            .into_iter()
            .fold(CallRequest::new(method, uri), |request, (key, value)| {
                request.server(key, value)
            })
            .parameters(data.iter().copied());
        self.call(request)
    }

    /// Default headers overlaid with `headers`, keyed as server variables.
    fn headers_to_server(&self, headers: &[(&str, &str)]) -> BTreeMap<String, String> {
        let mut server = self.default_headers.clone();
        for (name, value) in headers {
            server.insert(server_key(name), value.to_string());
        }
        server
    }

    // ========== Dispatch ==========

    /// Build the request and run it through the application.
    ///
    /// For `GET`, parameters are appended to the URI's query string and no
    /// form body is sent. Call cookies win over the client's defaults.
    pub fn call(&self, call: CallRequest) -> Result<TestResponse> {
        let CallRequest {
            method,
            mut uri,
            mut parameters,
            cookies,
            files,
            server,
            content,
        } = call;

        if method == Method::GET && !parameters.is_empty() {
            uri = append_query(&uri, &serde_urlencoded::to_string(&parameters)?);
            parameters.clear();
        }

        let mut environment = self.server_variables.clone();
        environment.merge(&server);
        environment.set("REQUEST_METHOD", method.as_str());
        environment.set("REQUEST_URI", uri.as_str());

        let mut all_cookies = self.default_cookies.clone();
        all_cookies.extend(cookies);

        let parsed_body = (!parameters.is_empty()).then(|| ParsedBody::Form(parameters));

        let request = request_builder::build(
            environment,
            parsed_body,
            Body::from(content),
            all_cookies,
            files,
            None,
        )?;

        let application = Application::from_container(&self.container)?;
        let response = application.handle(request)?;
        info!(method = %method, uri = %uri, status = response.status, "Test call completed");

        Ok(TestResponse::new(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{Error, Request, Response};

    fn client() -> TestClient {
        let container = Container::new();
        Application::register(&container).unwrap();
        let app = Application::from_container(&container).unwrap();
        app.any("/echo", |req: Request| {
            Response::json(&serde_json::json!({
                "method": req.method().as_str(),
                "query": req.query_params(),
                "body": req.body_string(),
                "content_type": req.header("Content-Type"),
                "accept": req.header("Accept"),
                "referer": req.header("Referer"),
                "cookies": req.cookies(),
            }))
        })
        .unwrap();
        TestClient::new(container)
    }

    #[test]
    fn test_server_key() {
        assert_eq!(server_key("X-Api-Key"), "HTTP_X_API_KEY");
        assert_eq!(server_key("accept"), "HTTP_ACCEPT");
        assert_eq!(server_key("HTTP_ORIGIN"), "HTTP_ORIGIN");
        assert_eq!(server_key("Content-Type"), "CONTENT_TYPE");
        assert_eq!(server_key("REMOTE_ADDR"), "REMOTE_ADDR");
        assert_eq!(server_key("CONTENT_LENGTH"), "HTTP_CONTENT_LENGTH");
    }

    #[test]
    fn test_append_query() {
        assert_eq!(append_query("/page", "a=1"), "/page?a=1");
        assert_eq!(append_query("/page?b=2", "a=1"), "/page?b=2&a=1");
        assert_eq!(append_query("/page#top", "a=1"), "/page?a=1#top");
        assert_eq!(append_query("/page?b=2#top", "a=1"), "/page?b=2&a=1#top");
    }

    #[test]
    fn test_get_appends_parameters_to_query() {
        let response = client()
            .call(CallRequest::new(Method::GET, "/echo?key2=val2").parameters([("test", "123")]))
            .unwrap();
        response
            .assert_ok()
            .assert_json_path("query", &serde_json::json!({"key2": "val2", "test": "123"}))
            .assert_json_path("body", &serde_json::json!(""));
    }

    #[test]
    fn test_json_defaults_and_overrides() {
        let client = client();
        client
            .post_json("/echo", &serde_json::json!({"a": 1}), &[])
            .unwrap()
            .assert_json_path("body", &serde_json::json!("{\"a\":1}"))
            .assert_json_path("content_type", &serde_json::json!("application/json"))
            .assert_json_path("accept", &serde_json::json!("application/json"));

        client
            .get_json("/echo", &[("Accept", "text/plain")])
            .unwrap()
            .assert_json_path("body", &serde_json::json!("[]"))
            .assert_json_path("accept", &serde_json::json!("text/plain"));
    }

    #[test]
    fn test_default_headers_and_cookies_accumulate() {
        let mut client = client();
        client
            .from("http://localhost/previous")
            .with_cookie("session", "abc")
            .with_cookies([("theme", "dark")]);

        let response = client.get("/echo", &[]).unwrap();
        response
            .assert_json_path("referer", &serde_json::json!("http://localhost/previous"))
            .assert_json_path("cookies", &serde_json::json!({"session": "abc", "theme": "dark"}));

        client.flush_headers();
        client
            .get("/echo", &[])
            .unwrap()
            .assert_json_path("referer", &Value::Null);
    }

    #[test]
    fn test_per_call_headers_win() {
        let mut client = client();
        client.with_header("Accept", "text/html");
        client
            .get("/echo", &[("Accept", "application/xml")])
            .unwrap()
            .assert_json_path("accept", &serde_json::json!("application/xml"));
    }

    #[test]
    fn test_handler_errors_propagate() {
        let container = Container::new();
        Application::register(&container).unwrap();
        Application::from_container(&container)
            .unwrap()
            .get("/fail", |_req: Request| -> std::result::Result<Response, Error> {
                Err(Error::http(409, "conflict"))
            })
            .unwrap();

        let result = TestClient::new(container).get("/fail", &[]);
        assert!(matches!(
            result,
            Err(crate::TestingError::App(Error::Http { status: 409, .. }))
        ));
    }
}
