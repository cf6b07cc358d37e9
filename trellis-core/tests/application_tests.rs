use trellis_core::{
    from_fn, Application, Container, Error, ErrorHandlerMiddleware, Handler, Method, Request,
    Response,
};

fn app_with_error_handler(container: &Container) -> Application {
    container
        .set_middleware(ErrorHandlerMiddleware::SERVICE, ErrorHandlerMiddleware)
        .unwrap();

    let app = Application::new(container);
    app.pipe(ErrorHandlerMiddleware::SERVICE);
    app.get("/fail", |_req: Request| Err(Error::http(422, "Unprocessable")))
        .unwrap();
    app.post("/echo", |req: Request| {
        Ok(Response::text(req.body_string()).with_status(201))
    })
    .unwrap();
    app
}

#[test]
fn test_error_handler_renders_errors() {
    let container = Container::new();
    let app = app_with_error_handler(&container);

    let response = app.handle(Request::new(Method::GET, "/fail")).unwrap();
    assert_eq!(response.status, 422);
    assert!(response.body_string().contains("Unprocessable"));
}

#[test]
fn test_errors_escape_without_error_handler() {
    let container = Container::new();
    let app = Application::new(&container);
    app.get("/fail", |_req: Request| Err(Error::http(409, "conflict")))
        .unwrap();

    let err = app.handle(Request::new(Method::GET, "/fail")).unwrap_err();
    assert_eq!(err.status_code(), 409);
}

#[test]
fn test_not_found_and_method_not_allowed() {
    let container = Container::new();
    let app = app_with_error_handler(&container);

    let missing = app.handle(Request::new(Method::GET, "/nowhere")).unwrap();
    assert_eq!(missing.status, 404);

    let wrong_method = app.handle(Request::new(Method::GET, "/echo")).unwrap();
    assert_eq!(wrong_method.status, 405);
    assert_eq!(wrong_method.headers.get("allow"), Some("POST"));
}

#[test]
fn test_instance_stages_wrap_handlers() {
    let container = Container::new();
    let app = Application::new(&container);
    app.pipe_middleware(from_fn(|req: Request, next: &dyn Handler| {
        let response = next.handle(req)?;
        Ok(response.with_header("X-Powered-By", "trellis"))
    }));
    app.any("/", |req: Request| Ok(Response::text(req.method().as_str())))
        .unwrap();

    let response = app.handle(Request::new(Method::PATCH, "/")).unwrap();
    assert_eq!(response.body_string(), "PATCH");
    assert_eq!(response.headers.get("X-Powered-By"), Some("trellis"));
}
