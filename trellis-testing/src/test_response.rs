//! Fluent assertions over a response.
//!
//! [`TestResponse`] wraps anything implementing [`ResponseParts`] and
//! exposes chained checks. A failed check panics with a message carrying
//! the expected and the actual value, which fails the surrounding test; a
//! passing check returns the wrapper so the next one can follow.
//!
//! ```rust
//! use serde_json::json;
//! use trellis_core::Response;
//! use trellis_testing::TestResponse;
//!
//! let response = Response::json(&json!({"data": {"id": 7, "tags": ["a", "b"]}}))
//!     .unwrap()
//!     .with_header("X-Request-Id", "abc");
//!
//! TestResponse::new(response)
//!     .assert_ok()
//!     .assert_header("x-request-id", Some("abc"))
//!     .assert_json(&json!({"data": {"id": 7, "tags": ["a", "b"]}}))
//!     .assert_json_path("data.id", &json!(7))
//!     .assert_json_count(2, Some("data.tags"));
//! ```

use crate::assertions::{self, Match};
use crate::cookies::{self, CookieExpiry, SetCookie};
use crate::json_path;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt;
use trellis_core::{HeaderMap, Response, ResponseParts};

/// Message used when the body cannot be used as a JSON document.
pub const INVALID_JSON: &str = "Invalid JSON was returned from the route.";

/// Assertion wrapper around a response.
pub struct TestResponse<R: ResponseParts = Response> {
    response: R,
    reference_time: Option<DateTime<Utc>>,
}

impl<R: ResponseParts> TestResponse<R> {
    pub fn new(response: R) -> Self {
        Self {
            response,
            reference_time: None,
        }
    }

    /// Pin the clock used by cookie expiry checks.
    pub fn with_reference_time(mut self, now: DateTime<Utc>) -> Self {
        self.reference_time = Some(now);
        self
    }

    /// Derive a wrapper whose response carries `name: value`.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response.headers_mut().insert(name, value);
        self
    }

    pub fn inner(&self) -> &R {
        &self.response
    }

    pub fn into_inner(self) -> R {
        self.response
    }

    pub fn status(&self) -> u16 {
        self.response.status()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.response.headers()
    }

    /// All values of a header joined with `", "`, or `None` when absent.
    pub fn header(&self, name: &str) -> Option<String> {
        let headers = self.response.headers();
        headers.contains(name).then(|| headers.get_line(name))
    }

    pub fn body(&self) -> &[u8] {
        self.response.body()
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.response.body()).into_owned()
    }

    fn now(&self) -> DateTime<Utc> {
        self.reference_time.unwrap_or_else(Utc::now)
    }

    #[track_caller]
    fn check(&self, outcome: Match) -> &Self {
        if let Err(message) = outcome {
            panic!("{}", message);
        }
        self
    }

    // ========== Status ==========

    /// Status is in `200..300`.
    #[track_caller]
    pub fn assert_successful(&self) -> &Self {
        let status = self.status();
        assert!(
            (200..300).contains(&status),
            "Response status code [{}] is not a successful status code.",
            status
        );
        self
    }

    #[track_caller]
    pub fn assert_ok(&self) -> &Self {
        let status = self.status();
        assert!(
            status == 200,
            "Response status code [{}] does not match expected 200 status code.",
            status
        );
        self
    }

    #[track_caller]
    pub fn assert_created(&self) -> &Self {
        let status = self.status();
        assert!(
            status == 201,
            "Response status code [{}] does not match expected 201 status code.",
            status
        );
        self
    }

    /// Status is 204 and the body is empty.
    #[track_caller]
    pub fn assert_no_content(&self) -> &Self {
        self.assert_no_content_status(204)
    }

    /// Status is `status` and the body is empty.
    #[track_caller]
    pub fn assert_no_content_status(&self, status: u16) -> &Self {
        self.assert_status(status);
        assert!(
            self.body().is_empty(),
            "Response content is not empty: [{}].",
            self.text()
        );
        self
    }

    #[track_caller]
    pub fn assert_not_found(&self) -> &Self {
        let status = self.status();
        assert!(
            status == 404,
            "Response status code [{}] is not a not found status code.",
            status
        );
        self
    }

    #[track_caller]
    pub fn assert_forbidden(&self) -> &Self {
        let status = self.status();
        assert!(
            status == 403,
            "Response status code [{}] is not a forbidden status code.",
            status
        );
        self
    }

    #[track_caller]
    pub fn assert_unauthorized(&self) -> &Self {
        let status = self.status();
        assert!(
            status == 401,
            "Response status code [{}] is not an unauthorized status code.",
            status
        );
        self
    }

    #[track_caller]
    pub fn assert_status(&self, expected: u16) -> &Self {
        let status = self.status();
        assert!(
            status == expected,
            "Expected status code {} but received {}.",
            expected,
            status
        );
        self
    }

    /// Status is 301 or 302 and, when given, `Location` equals `location`.
    #[track_caller]
    pub fn assert_redirect(&self, location: Option<&str>) -> &Self {
        let status = self.status();
        assert!(
            status == 301 || status == 302,
            "Response status code [{}] is not a redirect status code.",
            status
        );
        if let Some(location) = location {
            self.assert_location(location);
        }
        self
    }

    // ========== Headers ==========

    /// Header is present and, when given, its value line equals `value`.
    #[track_caller]
    pub fn assert_header(&self, name: &str, value: Option<&str>) -> &Self {
        let Some(actual) = self.header(name) else {
            panic!("Header [{}] not present on response.", name);
        };
        if let Some(expected) = value {
            assert!(
                actual == expected,
                "Header [{}] was found, but value [{}] does not match [{}].",
                name,
                actual,
                expected
            );
        }
        self
    }

    #[track_caller]
    pub fn assert_header_missing(&self, name: &str) -> &Self {
        assert!(
            !self.headers().contains(name),
            "Unexpected header [{}] is present on response.",
            name
        );
        self
    }

    #[track_caller]
    pub fn assert_location(&self, uri: &str) -> &Self {
        let actual = self.headers().get_line("Location");
        assert!(
            actual == uri,
            "Expected Location [{}] but received [{}].",
            uri,
            actual
        );
        self
    }

    // ========== Cookies ==========

    /// The cookie named `name`; the last one wins when it is set twice.
    pub fn cookie(&self, name: &str) -> Option<SetCookie> {
        cookies::find(self.headers(), name)
    }

    /// Expiry state of the cookie, or `None` when it is not set at all.
    pub fn cookie_expiry(&self, name: &str) -> Option<CookieExpiry> {
        self.cookie(name).map(|cookie| cookie.expiry(self.now()))
    }

    #[track_caller]
    fn expect_cookie(&self, name: &str) -> SetCookie {
        match self.cookie(name) {
            Some(cookie) => cookie,
            None => panic!("Cookie [{}] not present on response.", name),
        }
    }

    /// Cookie is set and, when given, its value equals `value`.
    #[track_caller]
    pub fn assert_cookie(&self, name: &str, value: Option<&str>) -> &Self {
        let cookie = self.expect_cookie(name);
        if let Some(expected) = value {
            assert!(
                cookie.value() == expected,
                "Cookie [{}] was found, but value [{}] does not match [{}].",
                name,
                cookie.value(),
                expected
            );
        }
        self
    }

    /// Cookie is set and its expiry lies strictly before now.
    ///
    /// A cookie without `Expires` or `Max-Age` has no expiry to compare, so
    /// this check fails for it; so does [`Self::assert_cookie_not_expired`].
    #[track_caller]
    pub fn assert_cookie_expired(&self, name: &str) -> &Self {
        let cookie = self.expect_cookie(name);
        let now = self.now();
        match cookie.expires_at(now) {
            Some(at) => assert!(
                at < now,
                "Cookie [{}] is not expired, it expires at [{}].",
                name,
                at
            ),
            None => panic!(
                "Cookie [{}] has no expiry; it is neither expired nor unexpired.",
                name
            ),
        }
        self
    }

    /// Cookie is set and its expiry lies strictly after now.
    #[track_caller]
    pub fn assert_cookie_not_expired(&self, name: &str) -> &Self {
        let cookie = self.expect_cookie(name);
        let now = self.now();
        match cookie.expires_at(now) {
            Some(at) => assert!(
                at > now,
                "Cookie [{}] is expired, it expired at [{}].",
                name,
                at
            ),
            None => panic!(
                "Cookie [{}] has no expiry; it is neither expired nor unexpired.",
                name
            ),
        }
        self
    }

    #[track_caller]
    pub fn assert_cookie_missing(&self, name: &str) -> &Self {
        assert!(
            self.cookie(name).is_none(),
            "Cookie [{}] is present on response.",
            name
        );
        self
    }

    // ========== Body ==========

    #[track_caller]
    pub fn assert_see(&self, value: &str) -> &Self {
        let body = self.text();
        assert!(
            body.contains(value),
            "Failed asserting that [{}] contains [{}].",
            body,
            value
        );
        self
    }

    #[track_caller]
    pub fn assert_dont_see(&self, value: &str) -> &Self {
        let body = self.text();
        assert!(
            !body.contains(value),
            "Failed asserting that [{}] does not contain [{}].",
            body,
            value
        );
        self
    }

    /// Like [`Self::assert_see`], on the body with markup tags removed.
    #[track_caller]
    pub fn assert_see_text(&self, value: &str) -> &Self {
        let text = assertions::strip_tags(&self.text());
        assert!(
            text.contains(value),
            "Failed asserting that [{}] contains [{}].",
            text,
            value
        );
        self
    }

    #[track_caller]
    pub fn assert_dont_see_text(&self, value: &str) -> &Self {
        let text = assertions::strip_tags(&self.text());
        assert!(
            !text.contains(value),
            "Failed asserting that [{}] does not contain [{}].",
            text,
            value
        );
        self
    }

    // ========== JSON ==========

    /// Decode the body.
    ///
    /// Panics with [`INVALID_JSON`] when the body is not JSON, and also when
    /// it is the literal `null` or `false`.
    #[track_caller]
    pub fn json(&self) -> Value {
        match serde_json::from_slice::<Value>(self.body()) {
            Ok(Value::Null) | Ok(Value::Bool(false)) | Err(_) => panic!("{}", INVALID_JSON),
            Ok(value) => value,
        }
    }

    /// Value at a dot-separated path (see [`crate::json_path`]).
    #[track_caller]
    pub fn json_path(&self, path: &str) -> Option<Value> {
        json_path::get(&self.json(), path)
    }

    #[track_caller]
    pub fn json_path_or(&self, path: &str, default: Value) -> Value {
        json_path::get_or(&self.json(), path, default)
    }

    #[track_caller]
    fn expect_path(&self, path: &str) -> Value {
        match self.json_path(path) {
            Some(value) => value,
            None => panic!(
                "Path [{}] was not found in response JSON:\n\n{}",
                path,
                assertions::pretty(&self.json())
            ),
        }
    }

    /// Response JSON contains `expected` as a subset, with strict equality on
    /// the shared keys.
    #[track_caller]
    pub fn assert_json(&self, expected: &Value) -> &Self {
        self.check(assertions::json_subset(expected, &self.json(), true))
    }

    /// Like [`Self::assert_json`], with loose equality on the shared keys.
    #[track_caller]
    pub fn assert_json_loose(&self, expected: &Value) -> &Self {
        self.check(assertions::json_subset(expected, &self.json(), false))
    }

    /// Response JSON equals `expected` as a whole (loose equality).
    #[track_caller]
    pub fn assert_exact_json(&self, expected: &Value) -> &Self {
        let actual = self.json();
        assert!(
            assertions::loose_eq(expected, &actual),
            "Failed asserting that response JSON:\n\n{}\n\nequals:\n\n{}",
            assertions::pretty(&actual),
            assertions::pretty(expected)
        );
        self
    }

    /// Value at `path` loosely equals `expected`; a missing path fails.
    #[track_caller]
    pub fn assert_json_path(&self, path: &str, expected: &Value) -> &Self {
        let actual = self.expect_path(path);
        assert!(
            assertions::loose_eq(expected, &actual),
            "Value at [{}] is {} but {} was expected.",
            path,
            actual,
            expected
        );
        self
    }

    /// Value at `path` strictly equals `expected`; a missing path fails.
    #[track_caller]
    pub fn assert_json_path_strict(&self, path: &str, expected: &Value) -> &Self {
        let actual = self.expect_path(path);
        assert!(
            assertions::strict_eq(expected, &actual),
            "Value at [{}] is {} but {} was expected.",
            path,
            actual,
            expected
        );
        self
    }

    /// The array or object at `path` (or the root) has `count` entries.
    #[track_caller]
    pub fn assert_json_count(&self, count: usize, path: Option<&str>) -> &Self {
        let target = match path {
            Some(path) => self.expect_path(path),
            None => self.json(),
        };
        match assertions::count(&target) {
            Some(actual) => assert!(
                actual == count,
                "Failed to assert that the response count matched the expected {}: found {}.",
                count,
                actual
            ),
            None => panic!(
                "Failed to assert that the response count matched the expected {}: {} is not countable.",
                count, target
            ),
        }
        self
    }

    /// Every key named in `structure` exists in the response JSON.
    ///
    /// With `None` only checks that the body is valid JSON.
    #[track_caller]
    pub fn assert_json_structure(&self, structure: Option<&Value>) -> &Self {
        let actual = self.json();
        match structure {
            Some(template) => self.check(assertions::json_structure(template, &actual)),
            None => self.assert_exact_json(&actual),
        }
    }

    /// None of the entries of `data` appear in the body.
    ///
    /// This is a textual check on re-serialised fragments and misses
    /// reordered keys or differently formatted numbers; prefer
    /// [`Self::assert_json_path`] based checks in new tests.
    #[track_caller]
    pub fn assert_json_missing(&self, data: &Value) -> &Self {
        self.check(assertions::json_missing(data, &self.text()))
    }

    /// At least one entry of `data` does not appear in the body.
    #[track_caller]
    pub fn assert_json_missing_exact(&self, data: &Value) -> &Self {
        self.check(assertions::json_missing_exact(data, &self.text()))
    }
}

impl<R: ResponseParts> From<R> for TestResponse<R> {
    fn from(response: R) -> Self {
        Self::new(response)
    }
}

impl<R: ResponseParts + fmt::Debug> fmt::Debug for TestResponse<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("response", &self.response)
            .field("reference_time", &self.reference_time)
            .finish()
    }
}
