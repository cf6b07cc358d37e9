use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use trellis_core::Response;
use trellis_testing::cookies::{EXPIRES_FORMAT, SetCookie};
use trellis_testing::{CookieExpiry, TestResponse};

fn body(value: serde_json::Value) -> TestResponse {
    TestResponse::new(Response::json(&value).unwrap())
}

fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-01T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

#[test]
fn test_subset_match_ignores_extra_keys() {
    body(json!({"a": 1, "b": 2})).assert_json(&json!({"a": 1}));
}

#[test]
#[should_panic(expected = "Failed asserting that response JSON")]
fn test_exact_match_rejects_extra_keys() {
    body(json!({"a": 1, "b": 2})).assert_exact_json(&json!({"a": 1}));
}

#[test]
fn test_exact_match_ignores_key_order() {
    body(json!({"a": 1, "b": [1, 2]})).assert_exact_json(&json!({"b": [1, 2], "a": 1}));
}

#[test]
#[should_panic(expected = "Unable to find JSON")]
fn test_strict_subset_is_type_sensitive() {
    body(json!({"id": 5})).assert_json(&json!({"id": "5"}));
}

#[test]
fn test_loose_subset_accepts_numeric_strings() {
    body(json!({"id": 5})).assert_json_loose(&json!({"id": "5"}));
}

#[test]
fn test_count_over_object_wildcard() {
    body(json!({"data2": {"x": "a", "y": "b"}})).assert_json_count(2, Some("data2.*"));
}

#[test]
#[should_panic(expected = "Failed to assert that the response count matched the expected 2")]
fn test_count_over_object_wildcard_fails() {
    body(json!({"data2": {"x": "a"}})).assert_json_count(2, Some("data2.*"));
}

#[test]
fn test_nested_wildcard_paths() {
    let response = body(json!({
        "teams": [
            {"name": "core", "members": [{"id": 1}, {"id": 2}]},
            {"name": "docs", "members": [{"id": 3}]}
        ]
    }));

    assert_eq!(response.json_path("teams.*.name"), Some(json!(["core", "docs"])));
    assert_eq!(response.json_path("teams.*.members.*.id"), Some(json!([1, 2, 3])));
    response
        .assert_json_count(3, Some("teams.*.members.*"))
        .assert_json_structure(Some(&json!({
            "teams": {"*": ["name", {"members": {"*": ["id"]}}]}
        })));
}

#[test]
fn test_cookie_round_trip() {
    let expires = fixed_now() + Duration::days(1);
    let cookie = SetCookie::new("test", "123").with_expires(expires).with_path("/");
    let response =
        TestResponse::new(Response::ok().with_added_header("Set-Cookie", cookie.to_string()))
            .with_reference_time(fixed_now());

    response
        .assert_cookie("test", Some("123"))
        .assert_cookie_not_expired("test")
        .assert_cookie_missing("absent");
    assert_eq!(
        response.cookie_expiry("test"),
        Some(CookieExpiry::NotExpired(expires))
    );
}

#[test]
fn test_encoded_cookie_value() {
    let response = Response::ok()
        .with_added_header("Set-Cookie", "greeting=hello%20world; Path=/")
        .with_added_header("Set-Cookie", SetCookie::new("note", "two words").to_string());

    TestResponse::new(response)
        .assert_cookie("greeting", Some("hello world"))
        .assert_cookie("note", Some("two words"));
}

#[test]
fn test_expired_cookie() {
    let past = fixed_now() - Duration::hours(1);
    let header = format!("old=1; Expires={}", past.format(EXPIRES_FORMAT));
    TestResponse::new(Response::ok().with_header("Set-Cookie", header))
        .with_reference_time(fixed_now())
        .assert_cookie_expired("old");
}

#[test]
#[should_panic(expected = "Cookie [old] is expired")]
fn test_expired_cookie_is_not_unexpired() {
    let past = fixed_now() - Duration::hours(1);
    let header = format!("old=1; Expires={}", past.format(EXPIRES_FORMAT));
    TestResponse::new(Response::ok().with_header("Set-Cookie", header))
        .with_reference_time(fixed_now())
        .assert_cookie_not_expired("old");
}

#[test]
#[should_panic(expected = "Cookie [test] was found, but value [123] does not match [456].")]
fn test_cookie_value_mismatch() {
    TestResponse::new(Response::ok().with_header("Set-Cookie", "test=123"))
        .assert_cookie("test", Some("456"));
}

#[test]
#[should_panic(expected = "Cookie [missing] not present on response.")]
fn test_missing_cookie() {
    TestResponse::new(Response::ok()).assert_cookie("missing", None);
}

#[test]
#[should_panic(expected = "Invalid JSON was returned from the route.")]
fn test_null_body_is_invalid_json() {
    TestResponse::new(Response::text("null")).assert_json(&json!({}));
}

#[test]
#[should_panic(expected = "Header [X-Version] was found, but value [1] does not match [2].")]
fn test_header_value_mismatch() {
    TestResponse::new(Response::ok().with_header("X-Version", "1"))
        .assert_header("X-Version", Some("2"));
}

#[test]
fn test_json_missing_is_textual() {
    // Reordered keys are not recognised by the textual check
    body(json!({"user": {"name": "ada", "id": 1}}))
        .assert_json_missing(&json!({"user": {"id": 1, "name": "ada"}}));
}

#[test]
#[should_panic(expected = "Response status code [500] is not a successful status code.")]
fn test_server_error_is_not_successful() {
    TestResponse::new(Response::new(500)).assert_successful();
}
