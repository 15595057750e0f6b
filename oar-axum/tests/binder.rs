use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::response::Response;
use http::StatusCode;
use oar_axum::{ApiError, ApiResult, AxumFactory, Context};
use oar_core::{FactoryOptions, HttpError, OpenApiConfig, RouteSpec, Schema};
use oar_test::TestApp;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct Message {
    message: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
enum Theme {
    Light,
    Dark,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct Session {
    #[serde(rename = "sessionId")]
    session_id: String,
    theme: Theme,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct ItemParams {
    id: u32,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct Notify {
    #[serde(default)]
    notify: bool,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct NewItem {
    name: String,
    quantity: u32,
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn hello(ctx: Context<()>) -> ApiResult {
    Ok(ctx.helper.json(&json!({ "message": "hello" }))?)
}

async fn whoami(ctx: Context<()>) -> ApiResult {
    let session = ctx
        .input
        .cookies::<Session>()
        .ok_or_else(|| HttpError::internal("cookies missing"))?;
    Ok(ctx.helper.json(&json!({
        "session": session.session_id,
        "theme": session.theme,
    }))?)
}

async fn wrong_shape(ctx: Context<()>) -> ApiResult {
    Ok(ctx.helper.json(&json!({ "message": 123 }))?)
}

async fn create_item(mut ctx: Context<()>) -> ApiResult {
    let id = ctx.input.params::<ItemParams>().map(|p| p.id).unwrap_or_default();
    let notify = ctx.input.query::<Notify>().is_some_and(|q| q.notify);
    let item: NewItem = ctx
        .input
        .take_body()
        .ok_or_else(|| HttpError::internal("body missing"))?;
    Ok(ctx.helper.json_with_status(
        StatusCode::CREATED,
        &json!({ "id": id, "name": item.name, "quantity": item.quantity, "notify": notify }),
    )?)
}

async fn ping(ctx: Context<()>) -> ApiResult {
    Ok(ctx.helper.text("pong")?)
}

async fn missing(_ctx: Context<()>) -> Result<Response, ApiError> {
    Err(HttpError::not_found("item 9 does not exist").into())
}

fn hello_spec() -> RouteSpec {
    RouteSpec::get("/hello").json_response(200, "Greeting", Schema::of::<Message>())
}

// ── Cookies ──────────────────────────────────────────────────────────────

fn cookie_app() -> TestApp {
    let router = AxumFactory::new()
        .route(
            RouteSpec::get("/me").cookies(Schema::of::<Session>()),
            whoami,
        )
        .into_router();
    TestApp::new(router)
}

#[tokio::test]
async fn valid_cookies_reach_the_handler() {
    cookie_app()
        .get("/me")
        .cookie("sessionId", "abc123")
        .cookie("theme", "dark")
        .send()
        .await
        .assert_ok()
        .assert_json_path("session", "abc123")
        .assert_json_path("theme", "dark");
}

#[tokio::test]
async fn invalid_cookie_is_rejected() {
    cookie_app()
        .get("/me")
        .header("cookie", "sessionId=abc123; theme=invalid")
        .send()
        .await
        .assert_bad_request()
        .assert_json_path("status", 400)
        .assert_json_path_fn("errors.body[0]", |v| {
            v.as_str().is_some_and(|s| s.starts_with("cookies: "))
        });
}

// ── Validation before the handler ────────────────────────────────────────

#[tokio::test]
async fn invalid_params_never_reach_the_handler() {
    let ran = Arc::new(AtomicBool::new(false));

    let router = AxumFactory::<Arc<AtomicBool>>::new()
        .route(
            RouteSpec::get("/users/{id}").params(Schema::of::<ItemParams>()),
            |ctx: Context<Arc<AtomicBool>>| async move {
                ctx.state.store(true, Ordering::SeqCst);
                Ok::<_, ApiError>(ctx.helper.json(&json!({}))?)
            },
        )
        .into_router()
        .with_state(ran.clone());
    let app = TestApp::new(router);

    app.get("/users/abc").send().await.assert_bad_request();
    assert!(!ran.load(Ordering::SeqCst));

    app.get("/users/42").send().await.assert_ok();
    assert!(ran.load(Ordering::SeqCst));
}

#[tokio::test]
async fn params_query_and_json_body_are_validated() {
    let router = AxumFactory::new()
        .route(
            RouteSpec::post("/items/{id}")
                .params(Schema::of::<ItemParams>())
                .query(Schema::of::<Notify>())
                .json_body(Schema::of::<NewItem>()),
            create_item,
        )
        .into_router();
    let app = TestApp::new(router);

    app.post("/items/7")
        .query("notify", true)
        .json(&json!({ "name": "lamp", "quantity": 3 }))
        .send()
        .await
        .assert_created()
        .assert_json_path("id", 7)
        .assert_json_path("notify", true)
        .assert_json_path("quantity", 3);

    app.post("/items/7")
        .json(&json!({ "name": "lamp", "quantity": -1 }))
        .send()
        .await
        .assert_bad_request()
        .assert_json_path_fn("errors.body[0]", |v| {
            v.as_str().is_some_and(|s| s.starts_with("json: "))
        });
}

#[tokio::test]
async fn form_bodies_are_coerced() {
    let router = AxumFactory::new()
        .route(
            RouteSpec::post("/items/{id}")
                .params(Schema::of::<ItemParams>())
                .form_body(Schema::of::<NewItem>()),
            create_item,
        )
        .into_router();

    TestApp::new(router)
        .post("/items/1")
        .form(&[("name", "desk lamp"), ("quantity", "12")])
        .send()
        .await
        .assert_created()
        .assert_json_path("name", "desk lamp")
        .assert_json_path("quantity", 12);
}

/// Multipart body with boundary `XX`: the text fields, then one file part.
fn multipart_body(fields: &[(&str, &str)]) -> String {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--XX\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(
        "--XX\r\nContent-Disposition: form-data; name=\"quantity\"; filename=\"quantity.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n99\r\n--XX--\r\n",
    );
    body
}

#[tokio::test]
async fn multipart_text_fields_are_validated_and_files_skipped() {
    let router = AxumFactory::new()
        .route(
            RouteSpec::post("/items/{id}")
                .params(Schema::of::<ItemParams>())
                .multipart_body(Schema::of::<NewItem>()),
            create_item,
        )
        .into_router();
    let app = TestApp::new(router);

    app.post("/items/7")
        .header("content-type", "multipart/form-data; boundary=XX")
        .body(multipart_body(&[("name", "desk lamp"), ("quantity", "3")]))
        .send()
        .await
        .assert_created()
        .assert_json_path("name", "desk lamp")
        .assert_json_path("quantity", 3);

    app.post("/items/7")
        .header("content-type", "multipart/form-data; boundary=XX")
        .body(multipart_body(&[("name", "desk lamp")]))
        .send()
        .await
        .assert_bad_request()
        .assert_json_path_fn("errors.body[0]", |msg| {
            msg.as_str().is_some_and(|m| m.starts_with("form: "))
        });
}

#[tokio::test]
async fn oversized_bodies_are_dropped() {
    let router = AxumFactory::new()
        .body_limit(16)
        .route(
            RouteSpec::post("/items/{id}")
                .params(Schema::of::<ItemParams>())
                .json_body(Schema::of::<NewItem>()),
            create_item,
        )
        .into_router();

    TestApp::new(router)
        .post("/items/1")
        .json(&json!({ "name": "a rather long item name", "quantity": 1 }))
        .send()
        .await
        .assert_bad_request();
}

// ── Response validation ──────────────────────────────────────────────────

fn shape_app(validate_response: bool) -> TestApp {
    let options = FactoryOptions::default().with_validate_response(validate_response);
    let router = AxumFactory::with_options(options)
        .route(
            RouteSpec::get("/test").json_response(200, "Greeting", Schema::of::<Message>()),
            wrong_shape,
        )
        .into_router();
    TestApp::new(router)
}

#[tokio::test]
async fn response_validation_rejects_wrong_shape_when_enabled() {
    shape_app(true)
        .get("/test")
        .send()
        .await
        .assert_server_error()
        .assert_json_path("status", 500);
}

#[tokio::test]
async fn response_validation_is_off_by_default() {
    shape_app(false)
        .get("/test")
        .send()
        .await
        .assert_ok()
        .assert_json_path("message", 123);
}

// ── Helpers and errors ───────────────────────────────────────────────────

#[tokio::test]
async fn text_helper_sets_plain_content_type() {
    let router = AxumFactory::new()
        .route(
            RouteSpec::get("/ping").text_response(200, "Pong", Schema::of::<String>()),
            ping,
        )
        .into_router();

    let resp = TestApp::new(router).get("/ping").send().await.assert_ok();
    assert_eq!(resp.text(), "pong");
    assert!(resp.header("content-type").is_some_and(|ct| ct.starts_with("text/plain")));
}

#[tokio::test]
async fn http_errors_use_their_status() {
    let router = AxumFactory::new()
        .route(RouteSpec::get("/items/9"), missing)
        .into_router();

    TestApp::new(router)
        .get("/items/9")
        .send()
        .await
        .assert_not_found()
        .assert_json_path("errors.body[0]", "item 9 does not exist");
}

#[test]
#[should_panic(expected = "invalid route")]
fn malformed_paths_panic_at_registration() {
    let _ = AxumFactory::<()>::new().route(RouteSpec::get("/items/{id"), hello);
}

// ── Composition and documents ────────────────────────────────────────────

#[tokio::test]
async fn nested_routers_serve_and_document_the_prefixed_path() {
    let child = AxumFactory::new().route(hello_spec(), hello);
    let router = AxumFactory::new()
        .router("/api", child)
        .doc("/doc", OpenApiConfig::new("Composed", "1.0.0"))
        .into_router();
    let app = TestApp::new(router);

    app.get("/api/hello")
        .send()
        .await
        .assert_ok()
        .assert_json_path("message", "hello");
    app.get("/hello").send().await.assert_not_found();

    let doc: Value = app.get("/doc").send().await.assert_ok().json();
    assert_eq!(doc["openapi"], "3.1.0");
    assert!(doc["paths"].get("/api/hello").is_some());
    assert!(doc["paths"].get("/hello").is_none());
}

#[tokio::test]
async fn trailing_slash_prefix_serves_the_documented_path() {
    let child = AxumFactory::new().route(
        RouteSpec::get("/").json_response(200, "Greeting", Schema::of::<Message>()),
        hello,
    );
    let router = AxumFactory::new()
        .router("/api/", child)
        .doc("/doc", OpenApiConfig::new("Composed", "1.0.0"))
        .into_router();
    let app = TestApp::new(router);

    let doc: Value = app.get("/doc").send().await.assert_ok().json();
    let paths: Vec<&String> = doc["paths"].as_object().unwrap().keys().collect();
    assert_eq!(paths, vec!["/api/"]);

    app.get("/api/").send().await.assert_ok().assert_json_path("message", "hello");
}

#[tokio::test]
async fn root_merge_keeps_paths() {
    let child = AxumFactory::new().route(hello_spec(), hello);
    let router = AxumFactory::new()
        .merge(child)
        .doc("/openapi.json", OpenApiConfig::new("Merged", "1.0.0"))
        .into_router();
    let app = TestApp::new(router);

    app.get("/hello").send().await.assert_ok();
    app.get("/openapi.json")
        .send()
        .await
        .assert_ok()
        .assert_json_path_fn("paths", |paths| paths.get("/hello").is_some());
}

#[tokio::test]
async fn nested_prefix_with_placeholder_captures_params() {
    async fn tenant_hello(ctx: Context<()>) -> ApiResult {
        let tenant = ctx.input.raw(oar_core::Target::Params).cloned().unwrap_or_default();
        Ok(ctx.helper.json(&tenant)?)
    }

    let child = AxumFactory::new().route(
        RouteSpec::get("/hello").params(Schema::of::<serde_json::Map<String, Value>>()),
        tenant_hello,
    );
    let router = AxumFactory::new()
        .router("/orgs/:org", child)
        .doc("/doc", OpenApiConfig::new("Tenants", "1.0.0"))
        .into_router();
    let app = TestApp::new(router);

    app.get("/orgs/acme/hello")
        .send()
        .await
        .assert_ok()
        .assert_json_path("org", "acme");
    app.get("/doc")
        .send()
        .await
        .assert_json_path_fn("paths", |paths| paths.get("/orgs/{org}/hello").is_some());
}

#[tokio::test]
async fn document_base_path_applies_to_served_document() {
    let router = AxumFactory::new()
        .route(hello_spec(), hello)
        .doc("/doc", OpenApiConfig::new("Based", "1.0.0").with_base_path("/v1"))
        .into_router();

    TestApp::new(router)
        .get("/doc")
        .send()
        .await
        .assert_ok()
        .assert_json_path_fn("paths", |paths| paths.get("/v1/hello").is_some());
}
