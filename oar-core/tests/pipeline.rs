use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use oar_core::{
    BufferedRequest, Error, RequestAdapter, RouteFactory, RouteSpec, Schema, Target,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

#[derive(Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
struct Paging {
    page: u32,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
struct ItemParams {
    id: u32,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
struct Tenant {
    #[serde(rename = "x-tenant")]
    tenant: String,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
struct NewItem {
    name: String,
    price: f64,
}

#[derive(Debug, Deserialize, Serialize, JsonSchema, garde::Validate)]
struct Signup {
    #[garde(length(min = 3))]
    username: String,
    #[garde(range(min = 18))]
    age: u8,
}

/// Wraps a buffered request, recording getter calls and delaying each one.
struct Recording {
    inner: BufferedRequest,
    calls: Mutex<Vec<&'static str>>,
    delays: [u64; 4],
}

impl Recording {
    fn new(inner: BufferedRequest, delays: [u64; 4]) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            delays,
        }
    }

    async fn enter(&self, name: &'static str, delay: u64) {
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.calls.lock().unwrap().push(name);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestAdapter for Recording {
    async fn url(&self) -> String {
        self.inner.url().await
    }

    async fn method(&self) -> Method {
        self.inner.method().await
    }

    async fn headers(&self) -> Map<String, Value> {
        self.enter("headers", self.delays[2]).await;
        self.inner.headers().await
    }

    async fn query(&self) -> Map<String, Value> {
        self.enter("query", self.delays[0]).await;
        self.inner.query().await
    }

    async fn params(&self) -> Map<String, Value> {
        self.enter("params", self.delays[1]).await;
        self.inner.params().await
    }

    async fn body(&self) -> Bytes {
        self.enter("body", self.delays[3]).await;
        self.inner.body().await
    }
}

fn full_route() -> RouteSpec {
    RouteSpec::post("/items/{id}")
        .query(Schema::of::<Paging>())
        .params(Schema::of::<ItemParams>())
        .headers(Schema::of::<Tenant>())
        .json_body(Schema::of::<NewItem>())
}

fn full_request() -> BufferedRequest {
    BufferedRequest::post("/items/7?page=2&tags=a&tags=b")
        .with_param("id", "7")
        .with_header("x-tenant", "acme")
        .with_json(&json!({ "name": "lamp", "price": 12.5 }))
}

// ── Stage order ──────────────────────────────────────────────────────────

#[tokio::test]
async fn stages_run_in_fixed_order() {
    let mut factory = RouteFactory::new();
    let pipeline = factory.route(full_route()).unwrap();
    assert_eq!(
        pipeline.targets(),
        vec![Target::Query, Target::Params, Target::Headers, Target::Json]
    );

    let req = Recording::new(full_request(), [3, 0, 2, 1]);
    let input = pipeline.run(&req).await.unwrap();
    assert_eq!(req.calls(), vec!["query", "params", "headers", "body"]);

    assert_eq!(
        input.query::<Paging>(),
        Some(&Paging { page: 2, tags: vec!["a".into(), "b".into()] })
    );
    assert_eq!(input.params::<ItemParams>(), Some(&ItemParams { id: 7 }));
    assert_eq!(input.headers::<Tenant>().map(|t| t.tenant.as_str()), Some("acme"));
    assert_eq!(
        input.body::<NewItem>(),
        Some(&NewItem { name: "lamp".into(), price: 12.5 })
    );
}

#[tokio::test]
async fn failing_stage_stops_the_pipeline() {
    let mut factory = RouteFactory::new();
    let pipeline = factory.route(full_route()).unwrap();
    let req = Recording::new(
        BufferedRequest::post("/items/x?page=1")
            .with_param("id", "not-a-number")
            .with_header("x-tenant", "acme")
            .with_json(&json!({ "name": "lamp", "price": 1.0 })),
        [0; 4],
    );

    let err = pipeline.run(&req).await.unwrap_err();
    assert_eq!(err.target, Target::Params);
    assert_eq!(req.calls(), vec!["query", "params"]);
}

#[tokio::test]
async fn params_failure_never_reaches_the_handler() {
    let mut factory = RouteFactory::new();
    let pipeline = factory
        .route(RouteSpec::get("/users/{id}").params(Schema::of::<ItemParams>()))
        .unwrap();
    let handler_ran = AtomicBool::new(false);

    let req = BufferedRequest::get("/users/abc").with_param("id", "abc");
    let result = pipeline.run(&req).await.map(|_input| {
        handler_ran.store(true, Ordering::SeqCst);
    });

    let err = result.unwrap_err();
    assert_eq!(err.target, Target::Params);
    assert!(!handler_ran.load(Ordering::SeqCst));
    assert!(err.to_string().starts_with("invalid request params"));
}

// ── Racing getters ───────────────────────────────────────────────────────

#[tokio::test]
async fn query_and_json_survive_racing_getters() {
    let mut factory = RouteFactory::new();
    let pipeline = Arc::new(
        factory
            .route(
                RouteSpec::post("/search")
                    .query(Schema::of::<Paging>())
                    .json_body(Schema::of::<NewItem>()),
            )
            .unwrap(),
    );

    let mut tasks = Vec::new();
    for i in 0..100u64 {
        let pipeline = pipeline.clone();
        tasks.push(tokio::spawn(async move {
            let req = Recording::new(
                BufferedRequest::post(&format!("/search?page={i}"))
                    .with_json(&json!({ "name": format!("item-{i}"), "price": i })),
                [i % 3, 0, 0, (i + 1) % 3],
            );
            let input = pipeline.run(&req).await.unwrap();
            assert!(input.contains(Target::Query));
            assert!(input.contains(Target::Json));
            assert_eq!(input.query::<Paging>().map(|p| p.page), Some(i as u32));
            assert_eq!(
                input.body::<NewItem>().map(|b| b.name.clone()),
                Some(format!("item-{i}"))
            );
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
}

// ── Body targets ─────────────────────────────────────────────────────────

#[tokio::test]
async fn first_media_type_selects_the_body_target() {
    let mut factory = RouteFactory::new();

    let form = factory
        .route(
            RouteSpec::post("/form")
                .form_body(Schema::of::<NewItem>())
                .json_body(Schema::of::<NewItem>()),
        )
        .unwrap();
    assert_eq!(form.targets(), vec![Target::Form]);

    let vendor_json = factory
        .route(RouteSpec::post("/vendor").body("application/vnd.api+json; charset=utf-8", Schema::of::<NewItem>()))
        .unwrap();
    assert_eq!(vendor_json.targets(), vec![Target::Json]);

    let text = factory
        .route(RouteSpec::post("/note").text_body(Schema::of::<String>()))
        .unwrap();
    assert_eq!(text.targets(), vec![Target::Text]);

    let binary = factory
        .route(RouteSpec::post("/upload").body("application/octet-stream", Schema::of::<String>()))
        .unwrap();
    assert!(binary.targets().is_empty());
}

#[tokio::test]
async fn form_values_are_coerced() {
    let mut factory = RouteFactory::new();
    let pipeline = factory
        .route(RouteSpec::post("/form").form_body(Schema::of::<NewItem>()))
        .unwrap();

    let req = BufferedRequest::post("/form")
        .with_header("content-type", "application/x-www-form-urlencoded")
        .with_body("name=desk+lamp&price=19.90");
    let mut input = pipeline.run(&req).await.unwrap();

    assert_eq!(input.raw(Target::Form), Some(&json!({ "name": "desk lamp", "price": 19.9 })));
    let item: NewItem = input.take_body().unwrap();
    assert_eq!(item.name, "desk lamp");
    assert!(!input.contains(Target::Form));
}

#[tokio::test]
async fn text_body_is_validated_as_a_string() {
    let mut factory = RouteFactory::new();
    let pipeline = factory
        .route(RouteSpec::post("/note").text_body(Schema::of::<String>()))
        .unwrap();

    let req = BufferedRequest::post("/note")
        .with_header("content-type", "text/plain")
        .with_body("remember the milk");
    let input = pipeline.run(&req).await.unwrap();
    assert_eq!(input.body::<String>().map(String::as_str), Some("remember the milk"));
}

#[tokio::test]
async fn malformed_json_fails_the_json_stage() {
    let mut factory = RouteFactory::new();
    let pipeline = factory
        .route(RouteSpec::post("/items").json_body(Schema::of::<NewItem>()))
        .unwrap();

    let req = BufferedRequest::post("/items")
        .with_header("content-type", "application/json")
        .with_body("{not json");
    let err = pipeline.run(&req).await.unwrap_err();
    assert_eq!(err.target, Target::Json);
}

#[tokio::test]
async fn optional_body_may_be_absent() {
    let mut factory = RouteFactory::new();
    let pipeline = factory
        .route(
            RouteSpec::post("/items")
                .json_body(Schema::of::<NewItem>())
                .body_required(false),
        )
        .unwrap();

    let input = pipeline.run(&BufferedRequest::post("/items")).await.unwrap();
    assert!(input.is_empty());
}

#[tokio::test]
async fn running_twice_yields_the_same_input() {
    let mut factory = RouteFactory::new();
    let pipeline = factory.route(full_route()).unwrap();
    let req = full_request();

    let first = pipeline.run(&req).await.unwrap();
    let second = pipeline.run(&req).await.unwrap();
    for target in [Target::Query, Target::Params, Target::Headers, Target::Json] {
        assert_eq!(first.raw(target), second.raw(target));
    }
}

// ── garde rules ──────────────────────────────────────────────────────────

#[tokio::test]
async fn garde_rules_apply_to_validated_schemas() {
    let mut factory = RouteFactory::new();
    let pipeline = factory
        .route(RouteSpec::post("/signup").json_body(Schema::validated::<Signup>()))
        .unwrap();

    let ok = BufferedRequest::post("/signup").with_json(&json!({ "username": "ada", "age": 36 }));
    assert!(pipeline.run(&ok).await.is_ok());

    let bad = BufferedRequest::post("/signup").with_json(&json!({ "username": "x", "age": 12 }));
    let err = pipeline.run(&bad).await.unwrap_err();
    assert_eq!(err.target, Target::Json);
    let fields: Vec<&str> = err.source.errors.iter().map(|e| e.field.as_str()).collect();
    assert!(fields.contains(&"username"));
    assert!(fields.contains(&"age"));
}

// ── Factory ──────────────────────────────────────────────────────────────

#[test]
fn malformed_paths_are_rejected_at_registration() {
    let mut factory = RouteFactory::new();
    let err = factory.route(RouteSpec::get("/users/{id")).unwrap_err();
    assert!(matches!(err, Error::InvalidPath(_)));
    assert!(factory.registry().is_empty());
}

#[test]
fn routes_are_registered_once() {
    let mut factory = RouteFactory::new();
    factory.route(RouteSpec::get("/hello")).unwrap();
    factory.route(RouteSpec::get("/hello")).unwrap();
    factory.route(RouteSpec::post("/hello")).unwrap();
    assert_eq!(factory.registry().len(), 2);
}
