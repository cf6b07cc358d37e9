//! Integration tests for common Trellis workflows.
//!
//! These tests verify that the most common use cases work correctly.

use trellis::prelude::*;
use trellis::trellis_testing::json_path;

// =============================================================================
// Response Tests
// =============================================================================

#[test]
fn test_response_convenience_methods() {
    let response = Response::json(&json!({"message": "hello"})).unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.headers.get("Content-Type"), Some("application/json"));

    let response = Response::html("<h1>Hello</h1>");
    assert_eq!(response.headers.content_type(), Some("text/html; charset=utf-8"));
    assert_eq!(response.body_string(), "<h1>Hello</h1>");

    let response = Response::redirect("https://example.com");
    assert_eq!(response.status, 302);
    assert_eq!(response.headers.location(), Some("https://example.com"));
    assert_eq!(Response::redirect_permanent("/").status, 301);

    let response = Response::ok()
        .with_added_header("Set-Cookie", "a=1")
        .with_added_header("Set-Cookie", "b=2");
    assert_eq!(response.headers.get_all("set-cookie"), vec!["a=1", "b=2"]);
    assert!(response.is_success());
    assert!(!Response::not_found().is_success());
}

// =============================================================================
// Request Tests
// =============================================================================

#[test]
fn test_built_request_helpers() {
    #[derive(serde::Deserialize)]
    struct UserInput {
        name: String,
    }

    let request = RequestBuilder::new()
        .server("REQUEST_METHOD", "POST")
        .server("REQUEST_URI", "/api/users?format=json")
        .server("CONTENT_TYPE", "application/json")
        .body("{\"name\":\"John\"}")
        .build()
        .unwrap();

    assert_eq!(request.method(), &Method::POST);
    assert_eq!(request.query("format"), Some("json"));
    assert_eq!(request.query("unknown"), None);
    assert_eq!(request.headers().content_type(), Some("application/json"));

    let user: UserInput = request.json().unwrap();
    assert_eq!(user.name, "John");
}

// =============================================================================
// Container Tests
// =============================================================================

#[test]
fn test_container_override_and_delegators() {
    #[derive(Debug)]
    struct Settings {
        debug: bool,
    }

    let container = Container::new();
    container
        .register_factory("settings", |_c: &Container| Ok(Settings { debug: false }))
        .unwrap();
    container.add_delegator("settings", |_c: &Container, _s: std::sync::Arc<Settings>| {
        Ok(std::sync::Arc::new(Settings { debug: true }))
    });
    assert!(container.get::<Settings>("settings").unwrap().debug);

    // Overrides are refused until allowed
    assert!(matches!(
        container.set_service("settings", Settings { debug: false }),
        Err(Error::OverrideNotAllowed(_))
    ));
    container.set_allow_override(true);
    container.set_service("settings", Settings { debug: false }).unwrap();
    assert!(!container.get::<Settings>("settings").unwrap().debug);
}

// =============================================================================
// End-to-end Tests
// =============================================================================

fn harness() -> TestHarness {
    TestHarness::new(|| {
        let container = Container::new();
        Application::register(&container)?;
        container.set_middleware(ErrorHandlerMiddleware::SERVICE, ErrorHandlerMiddleware)?;
        container.set_middleware(
            "api_version",
            from_fn(|req: Request, next: &dyn Handler| {
                Ok(next.handle(req)?.with_header("X-Api-Version", "2"))
            }),
        )?;
        Ok(container)
    })
    .pipeline(|app, _| {
        app.pipe(ErrorHandlerMiddleware::SERVICE);
        app.pipe("api_version");
        Ok(())
    })
    .routes(|app, _| {
        app.get("/users", |_req: Request| {
            Response::json(&json!({
                "data": [
                    {"id": 1, "name": "Ada", "roles": ["admin"]},
                    {"id": 2, "name": "Grace", "roles": ["dev", "ops"]}
                ],
                "meta": {"total": 2}
            }))
        })?;
        app.post("/users", |req: Request| {
            let name = req.json::<serde_json::Value>()?["name"].clone();
            Ok(Response::json(&json!({"data": {"id": 3, "name": name}}))?
                .with_status(201)
                .with_header("Location", "/users/3"))
        })?;
        app.post("/login", |_req: Request| {
            Ok(Response::redirect("/dashboard")
                .with_added_header("Set-Cookie", "session=s3cr3t; Max-Age=3600; HttpOnly"))
        })?;
        app.delete("/users/{id}", |_req: Request| Err(Error::http(403, "Forbidden")))
    })
}

#[test]
fn test_json_listing() {
    let client = harness().client().unwrap();

    client
        .get_json("/users", &[])
        .unwrap()
        .assert_ok()
        .assert_header("X-Api-Version", Some("2"))
        .assert_json_count(2, Some("data"))
        .assert_json_count(3, Some("data.*.roles.*"))
        .assert_json_path("meta.total", &json!(2))
        .assert_json_structure(Some(&json!({"data": {"*": ["id", "name"]}, "meta": ["total"]})))
        .assert_json_missing(&json!({"name": "Linus"}));

    let names = client.get_json("/users", &[]).unwrap().json();
    assert_eq!(json_path::get(&names, "data.*.name"), Some(json!(["Ada", "Grace"])));
}

#[test]
fn test_create_and_redirect_flows() {
    let client = harness().client().unwrap();

    client
        .post_json("/users", &json!({"name": "Barbara"}), &[])
        .unwrap()
        .assert_created()
        .assert_location("/users/3")
        .assert_json(&json!({"data": {"id": 3, "name": "Barbara"}}));

    client
        .post("/login", &[("user", "ada")], &[])
        .unwrap()
        .assert_redirect(Some("/dashboard"))
        .assert_cookie("session", Some("s3cr3t"))
        .assert_cookie_not_expired("session");
}

#[test]
fn test_error_handler_switched_off_by_harness() {
    let result = harness().client().unwrap().delete("/users/1", &[], &[]);
    assert!(matches!(
        result,
        Err(TestingError::App(Error::Http { status: 403, .. }))
    ));

    // With the error handler kept, the error renders as a response
    let config = HarnessConfig::from_toml("disable_error_handler = false").unwrap();
    harness()
        .with_config(config)
        .client()
        .unwrap()
        .delete("/users/1", &[], &[])
        .unwrap()
        .assert_forbidden()
        .assert_see_text("Forbidden");
}

#[test]
fn test_without_middleware() {
    let mut client = harness().client().unwrap();
    client.without_middleware(["api_version"]).unwrap();

    client
        .get("/users", &[])
        .unwrap()
        .assert_ok()
        .assert_header_missing("X-Api-Version");
}
