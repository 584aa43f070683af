use serde_json::json;
use wren::dispatcher::{Context, CookieOptions, DispatchOptions, SameSite};
use wren::middleware::{JsonBody, Next, RequestTrace};
use wren::router::Router;

mod common;
use common::http::{get, parse_response, send_request};
use common::test_server::TestServer;

fn app() -> Router {
    let mut router = Router::new();
    router
        .use_middleware(RequestTrace::default())
        .use_middleware(JsonBody::new())
        .use_fn(|ctx: &mut Context, next: Next<'_>| {
            ctx.set_header("x-powered-by", "wren");
            next.run(ctx)
        });

    router.get("/", |ctx| {
        ctx.json(json!({ "message": "hello" }));
        Ok(())
    });
    router.get("/users/:id", |ctx| {
        let id = ctx.param("id").unwrap_or_default().to_string();
        let verbose = ctx.query_param("verbose").is_some();
        ctx.json(json!({ "id": id, "verbose": verbose }));
        Ok(())
    });
    router.post("/users", |ctx| {
        let body = ctx.body.clone().unwrap_or_default();
        ctx.dispatch(body, DispatchOptions::status(201));
        Ok(())
    });
    router.get("/panic", |_ctx| -> anyhow::Result<()> { panic!("handler exploded") });
    router.get("/login", |ctx| {
        let options = CookieOptions::new()
            .path("/")
            .http_only()
            .same_site(SameSite::Strict);
        ctx.set_cookie("session", "abc 123", &options)
            .set_cookie("theme", "dark", &CookieOptions::new());
        ctx.redirect("/home");
        Ok(())
    });
    router.get("/whoami", |ctx| {
        let session = ctx.cookie("session").unwrap_or("anonymous").to_string();
        ctx.text(session);
        Ok(())
    });
    router
}

#[test]
fn test_json_response() {
    let server = TestServer::start(app());

    let resp = get(&server.addr(), "/");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.header("content-type"), Some("application/json"));
    assert_eq!(resp.header("x-powered-by"), Some("wren"));
    assert_eq!(resp.json(), json!({ "message": "hello" }));
}

#[test]
fn test_path_and_query_params() {
    let server = TestServer::start(app());

    let resp = get(&server.addr(), "/users/42?verbose=1");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.json(), json!({ "id": "42", "verbose": true }));
}

#[test]
fn test_unknown_route_is_404() {
    let server = TestServer::start(app());

    let resp = get(&server.addr(), "/nope");
    assert_eq!(resp.status, 404);
    assert_eq!(resp.header("content-type"), Some("text/plain"));
    assert_eq!(resp.body, "404 - Not Found");
}

#[test]
fn test_handler_panic_is_500() {
    let server = TestServer::start(app());

    let resp = get(&server.addr(), "/panic");
    assert_eq!(resp.status, 500);
    assert_eq!(resp.body, "Internal Server Error");

    // The server keeps serving after a contained fault.
    assert_eq!(get(&server.addr(), "/").status, 200);
}

#[test]
fn test_json_body_is_parsed() {
    let server = TestServer::start(app());
    let body = r#"{"name":"ada"}"#;
    let req = format!(
        "POST /users HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        body.len(),
        body
    );

    let resp = parse_response(&send_request(&server.addr(), &req));
    assert_eq!(resp.status, 201);
    assert_eq!(resp.json(), json!({ "name": "ada" }));
}

#[test]
fn test_cookies_and_redirect() {
    let server = TestServer::start(app());

    let resp = get(&server.addr(), "/login");
    assert_eq!(resp.status, 302);
    assert_eq!(resp.header("location"), Some("/home"));
    assert_eq!(
        resp.header_values("set-cookie"),
        vec![
            "session=abc%20123; Path=/; HttpOnly; SameSite=Strict",
            "theme=dark",
        ]
    );

    let req = "GET /whoami HTTP/1.1\r\nHost: localhost\r\nCookie: theme=dark; session=abc%20123\r\n\r\n";
    let resp = parse_response(&send_request(&server.addr(), req));
    assert_eq!(resp.body, "abc 123");
}
