//! Simulated server environment.
//!
//! A flat `KEY => value` map standing in for the metadata a web server hands
//! to an application: protocol, method, request URI, host, and every request
//! header as an `HTTP_*` key. [`Environment::with_defaults`] fills in a
//! complete baseline so a request can be built from an empty override set.

use chrono::Utc;
use std::collections::BTreeMap;
use trellis_core::headers::canonical_name;
use trellis_core::{HeaderMap, ServerParams, ServerValue, Uri};

/// Prefix marking a header-origin key.
pub const HEADER_PREFIX: &str = "HTTP_";

/// Keys that map to headers without the `HTTP_` prefix.
pub const UNPREFIXED_HEADERS: [&str; 2] = ["CONTENT_TYPE", "REMOTE_ADDR"];

/// The baseline every synthetic request starts from.
pub const DEFAULT_SERVER_PARAMS: [(&str, &str); 13] = [
    ("SERVER_PROTOCOL", "HTTP/1.1"),
    ("REQUEST_METHOD", "GET"),
    ("SCRIPT_NAME", ""),
    ("REQUEST_URI", ""),
    ("QUERY_STRING", ""),
    ("SERVER_NAME", "localhost"),
    ("SERVER_PORT", "80"),
    ("HTTP_HOST", "localhost"),
    ("HTTP_ACCEPT", "*/*"),
    ("HTTP_USER_AGENT", "Test"),
    ("HTTP_CONTENT_TYPE", "application/x-www-form-urlencoded"),
    ("REMOTE_ADDR", "127.0.0.1"),
    ("HTTP_ORIGIN", "http://localhost"),
];

/// Simulated server environment, ordered by key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Environment {
    vars: ServerParams,
}

impl Environment {
    /// An empty environment, without any defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// The documented baseline plus `REQUEST_TIME`/`REQUEST_TIME_FLOAT`.
    ///
    /// `request_time` pins the clock-derived keys (seconds since the epoch);
    /// `None` reads the current time.
    pub fn with_defaults(request_time: Option<f64>) -> Self {
        let mut env: Environment = DEFAULT_SERVER_PARAMS.into_iter().collect();
        env.set("SERVER_PORT", 80i64);

        let time = request_time.unwrap_or_else(|| {
            let now = Utc::now();
            now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1_000_000.0
        });
        env.set("REQUEST_TIME", time.trunc() as i64);
        env.set("REQUEST_TIME_FLOAT", time);
        env
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ServerValue>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ServerValue>) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ServerValue> {
        self.vars.get(key)
    }

    /// Value rendered as text; integers and floats are formatted.
    pub fn text(&self, key: &str) -> Option<String> {
        self.vars.get(key).map(ToString::to_string)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ServerValue> {
        self.vars.remove(key)
    }

    /// Merge `overrides` on top of this environment; override keys win.
    pub fn merge(&mut self, overrides: &Environment) {
        for (key, value) in &overrides.vars {
            self.vars.insert(key.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServerValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn into_params(self) -> ServerParams {
        self.vars
    }

    /// Derive request headers.
    ///
    /// `HTTP_FOO_BAR` becomes `Foo-Bar`; `CONTENT_TYPE` and `REMOTE_ADDR`
    /// map directly and take precedence over their `HTTP_` spellings.
    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (key, value) in &self.vars {
            if let Some(name) = key.strip_prefix(HEADER_PREFIX) {
                if !name.is_empty() {
                    headers.insert(header_name(name), value.to_string());
                }
            }
        }
        for key in UNPREFIXED_HEADERS {
            if let Some(value) = self.vars.get(key) {
                headers.insert(header_name(key), value.to_string());
            }
        }
        headers
    }

    /// Assemble the request URI.
    ///
    /// The path comes from `REQUEST_URI`, the query from its query component
    /// when it has one and from `QUERY_STRING` otherwise. Host and port come
    /// from the `Host` header when present, else `SERVER_NAME`/`SERVER_PORT`.
    pub fn uri(&self, headers: &HeaderMap) -> Uri {
        let secure = self
            .text("HTTPS")
            .is_some_and(|v| !v.is_empty() && !v.eq_ignore_ascii_case("off"));
        let scheme = if secure { "https" } else { "http" };

        let (host, port) = match headers.get("Host").filter(|h| !h.is_empty()) {
            Some(host) => split_host_port(host),
            None => (
                self.text("SERVER_NAME").unwrap_or_default(),
                self.text("SERVER_PORT").and_then(|p| p.parse().ok()),
            ),
        };

        let request_uri = self.text("REQUEST_URI").unwrap_or_default();
        let (rest, fragment) = match request_uri.split_once('#') {
            Some((rest, fragment)) => (rest, fragment.to_string()),
            None => (request_uri.as_str(), String::new()),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, query.to_string()),
            None => (
                rest,
                self.text("QUERY_STRING")
                    .map(|q| q.trim_start_matches('?').to_string())
                    .unwrap_or_default(),
            ),
        };

        let path = strip_authority(path);
        Uri {
            scheme: scheme.to_string(),
            host,
            port,
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            query,
            fragment,
        }
    }
}

impl<K, V> FromIterator<(K, V)> for Environment
where
    K: Into<String>,
    V: Into<ServerValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut env = Environment::new();
        for (key, value) in iter {
            env.set(key, value);
        }
        env
    }
}

impl From<ServerParams> for Environment {
    fn from(vars: ServerParams) -> Self {
        Self { vars }
    }
}

impl From<BTreeMap<String, String>> for Environment {
    fn from(vars: BTreeMap<String, String>) -> Self {
        vars.into_iter().collect()
    }
}

/// `CONTENT_TYPE` -> `Content-Type`
fn header_name(key: &str) -> String {
    canonical_name(&key.replace('_', "-"))
}

fn split_host_port(host: &str) -> (String, Option<u16>) {
    // Bracketed IPv6 literal, optionally followed by a port
    if let Some(rest) = host.strip_prefix('[') {
        if let Some((addr, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (format!("[{}]", addr), port);
        }
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
            (name.to_string(), port.parse().ok())
        }
        _ => (host.to_string(), None),
    }
}

/// Absolute-form request targets carry their own scheme and authority.
fn strip_authority(path: &str) -> &str {
    match path.split_once("://") {
        Some((_, rest)) if !path.starts_with('/') => match rest.find('/') {
            Some(index) => &rest[index..],
            None => "",
        },
        _ => path,
    }
}
