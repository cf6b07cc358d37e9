use std::io::Read;
use trellis_core::{FileNode, Method, Stream, UploadedFile};
use trellis_testing::{Environment, RequestBuilder, TestingError, parse_query};

#[test]
fn test_headers_derived_from_environment() {
    let overrides: Environment = [
        ("HTTP_X_API_KEY", "secret"),
        ("HTTP_ACCEPT_LANGUAGE", "en"),
        ("CONTENT_TYPE", "application/json"),
        ("NOT_A_HEADER", "ignored"),
    ]
    .into_iter()
    .collect();

    let request = RequestBuilder::new().environment(&overrides).build().unwrap();
    let headers = request.headers();

    let mut names = headers.names();
    names.sort_unstable();
    assert_eq!(
        names,
        vec![
            "Accept",
            "Accept-Language",
            "Content-Type",
            "Host",
            "Origin",
            "Remote-Addr",
            "User-Agent",
            "X-Api-Key",
        ]
    );
    assert_eq!(headers.get("x-api-key"), Some("secret"));
    // The unprefixed key wins over the HTTP_CONTENT_TYPE default
    assert_eq!(headers.get("Content-Type"), Some("application/json"));
    assert_eq!(headers.get("Remote-Addr"), Some("127.0.0.1"));
}

#[test]
fn test_query_survives_uri_assembly() {
    for query in ["a=1&b=2", "name=Ada%20Lovelace&tags=x", "empty=&k=v", ""] {
        let uri = if query.is_empty() {
            "/search".to_string()
        } else {
            format!("/search?{}", query)
        };
        let request = RequestBuilder::new()
            .server("REQUEST_URI", uri.as_str())
            .build()
            .unwrap();
        assert_eq!(request.query_params(), &parse_query(query), "query {:?}", query);
    }
}

#[test]
fn test_query_string_fallback() {
    let request = RequestBuilder::new()
        .server("REQUEST_URI", "/list")
        .server("QUERY_STRING", "?page=3")
        .build()
        .unwrap();
    assert_eq!(request.query("page"), Some("3"));
    assert_eq!(request.uri().to_string(), "http://localhost/list?page=3");
}

#[test]
fn test_text_body_fully_readable_from_start() {
    let text = "line one\nline two\n{\"json\": true}";
    let request = RequestBuilder::new().body(text).build().unwrap();

    let mut body = request.body().clone();
    assert_eq!(body.position(), 0);
    let mut read = String::new();
    body.read_to_string(&mut read).unwrap();
    assert_eq!(read, text);
}

#[test]
fn test_stream_body_is_used_as_is() {
    let stream = Stream::from_bytes(b"payload".to_vec());
    let request = RequestBuilder::new().body(stream).build().unwrap();
    assert_eq!(request.body_string(), "payload");
    assert_eq!(request.body().position(), 0);
}

#[test]
fn test_array_body_is_rejected() {
    let result = RequestBuilder::new()
        .body(serde_json::json!([1, 2, 3]))
        .build();
    match result {
        Err(TestingError::InvalidBodyType(kind)) => assert_eq!(kind, "array"),
        other => panic!("expected InvalidBodyType, got {:?}", other),
    }
}

#[test]
fn test_protocol_version_and_method() {
    let request = RequestBuilder::new()
        .server("SERVER_PROTOCOL", "HTTP/2")
        .server("REQUEST_METHOD", "DELETE")
        .build()
        .unwrap();
    assert_eq!(request.protocol_version(), "2");
    assert_eq!(request.method(), &Method::DELETE);

    let err = RequestBuilder::new()
        .server("SERVER_PROTOCOL", "garbage")
        .build()
        .unwrap_err();
    assert!(matches!(err, TestingError::MalformedProtocol(_)));
}

#[test]
fn test_https_host_and_port() {
    let request = RequestBuilder::new()
        .server("HTTPS", "on")
        .server("HTTP_HOST", "api.example.test:8443")
        .server("REQUEST_URI", "/v1/items?limit=5#top")
        .build()
        .unwrap();

    let uri = request.uri();
    assert_eq!(uri.scheme, "https");
    assert_eq!(uri.host, "api.example.test");
    assert_eq!(uri.port, Some(8443));
    assert_eq!(uri.path, "/v1/items");
    assert_eq!(uri.fragment, "top");
    assert_eq!(uri.to_string(), "https://api.example.test:8443/v1/items?limit=5#top");
}

#[test]
fn test_https_off_means_http() {
    let request = RequestBuilder::new().server("HTTPS", "off").build().unwrap();
    assert_eq!(request.uri().scheme, "http");
}

#[test]
fn test_identical_inputs_build_identical_requests() {
    let build = || {
        RequestBuilder::new()
            .server("REQUEST_METHOD", "POST")
            .server("REQUEST_URI", "/orders?x=1")
            .form([("qty", "2")])
            .cookie("cart", "42")
            .body("{}")
            .with_request_time(1_700_000_000.25)
            .build()
            .unwrap()
    };
    let (a, b) = (build(), build());
    assert_eq!(a.method(), b.method());
    assert_eq!(a.uri(), b.uri());
    assert_eq!(a.headers().iter().collect::<Vec<_>>(), b.headers().iter().collect::<Vec<_>>());
    assert_eq!(a.server_params(), b.server_params());
    assert_eq!(a.parsed_body(), b.parsed_body());
    assert_eq!(a.body_string(), b.body_string());
    assert_eq!(a.cookies(), b.cookies());
}

#[test]
fn test_nested_uploads() {
    let request = RequestBuilder::new()
        .file("avatar", UploadedFile::new("/tmp/upload1", 120).with_filename("me.png"))
        .file("docs[contracts][]", UploadedFile::new("/tmp/upload2", 10))
        .file("docs[contracts][]", UploadedFile::new("/tmp/upload3", 20))
        .build()
        .unwrap();

    let files = request.uploaded_files();
    let avatar = files["avatar"].as_file().unwrap();
    assert_eq!(avatar.client_filename.as_deref(), Some("me.png"));

    let contracts = files["docs"].get("contracts").unwrap();
    assert_eq!(contracts.get("0").and_then(FileNode::as_file).map(|f| f.size), Some(10));
    assert_eq!(contracts.get("1").and_then(FileNode::as_file).map(|f| f.size), Some(20));
}

#[test]
fn test_conflicting_uploads_are_rejected() {
    let result = RequestBuilder::new()
        .file("doc", UploadedFile::new("/tmp/a", 1))
        .file("doc[0]", UploadedFile::new("/tmp/b", 1))
        .build();
    assert!(matches!(result, Err(TestingError::ConflictingUpload(field)) if field == "doc[0]"));
}
