use oar_core::{
    Definition, Error, OpenApiConfig, OpenApiRegistry, ParameterLocation, RouteFactory, RouteSpec, Schema,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Deserialize, Serialize, JsonSchema)]
struct Greeting {
    message: String,
}

fn paths(registry: &OpenApiRegistry) -> Vec<String> {
    registry.routes().map(|r| format!("{} {}", r.method, r.path)).collect()
}

fn hello_factory() -> RouteFactory {
    let mut child = RouteFactory::new();
    child
        .route(RouteSpec::get("/hello").json_response(200, "Greeting", Schema::of::<Greeting>()))
        .unwrap();
    child
}

// ── Registration ─────────────────────────────────────────────────────────

#[test]
fn duplicate_definitions_are_ignored() {
    let mut registry = OpenApiRegistry::new();
    assert!(registry.register_schema("Greeting", Schema::of::<Greeting>()));
    assert!(!registry.register_schema("Greeting", Schema::of::<Greeting>()));
    assert!(registry.register_component("securitySchemes", "bearer", json!({ "type": "http" })));
    assert!(!registry.register_component("securitySchemes", "bearer", json!({ "type": "apiKey" })));
    assert!(registry.register_component("responses", "bearer", json!({ "description": "x" })));
    assert!(registry.register_parameter("traceId", ParameterLocation::Header, Schema::of::<String>()));
    assert!(!registry.register_parameter("traceId", ParameterLocation::Query, Schema::of::<String>()));

    assert_eq!(registry.len(), 4);
    match &registry.definitions()[1] {
        Definition::Component { value, .. } => assert_eq!(value, &json!({ "type": "http" })),
        other => panic!("unexpected definition: {other:?}"),
    }
}

#[test]
fn webhooks_are_keyed_by_name() {
    let mut factory = RouteFactory::new();
    factory.webhook("itemCreated", RouteSpec::post("/item-created")).unwrap();
    factory.webhook("itemCreated", RouteSpec::put("/item-created")).unwrap();
    factory.webhook("itemDeleted", RouteSpec::post("/item-created")).unwrap();

    let webhooks: Vec<String> = factory
        .registry()
        .definitions()
        .iter()
        .filter_map(|d| match d {
            Definition::Webhook { name, spec } => Some(format!("{name} {}", spec.method)),
            _ => None,
        })
        .collect();
    assert_eq!(webhooks, vec!["itemCreated POST", "itemDeleted POST"]);
}

#[test]
fn malformed_webhook_paths_are_rejected() {
    let mut factory = RouteFactory::new();
    let err = factory
        .webhook("itemCreated", RouteSpec::post("/items/{1d}"))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidPath(_)), "unexpected error: {err}");
    assert!(factory.registry().is_empty());
}

// ── Merging ──────────────────────────────────────────────────────────────

#[test]
fn merge_prefixes_routes_only() {
    let mut child = hello_factory();
    child.register_schema("Greeting", Schema::of::<Greeting>());
    child.webhook("greeted", RouteSpec::post("/greeted")).unwrap();

    let mut parent = RouteFactory::new();
    parent.merge(&child, "/api");

    assert_eq!(paths(parent.registry()), vec!["GET /api/hello"]);
    let kinds: Vec<String> = parent
        .registry()
        .definitions()
        .iter()
        .map(|d| match d {
            Definition::Route(spec) => format!("route {}", spec.path),
            Definition::Webhook { name, spec } => format!("webhook {name} {}", spec.path),
            Definition::Component { name, .. } => format!("component {name}"),
            Definition::Schema { name, .. } => format!("schema {name}"),
            Definition::Parameter { name, .. } => format!("parameter {name}"),
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["route /api/hello", "schema Greeting", "webhook greeted /api/greeted"]
    );
}

#[test]
fn merging_twice_does_not_duplicate() {
    let child = hello_factory();
    let mut parent = RouteFactory::new();
    parent.merge(&child, "/api");
    parent.merge(&child, "/api");
    assert_eq!(paths(parent.registry()), vec!["GET /api/hello"]);
}

#[test]
fn native_prefixes_are_converted_to_braces() {
    let child = hello_factory();
    let mut parent = RouteFactory::new();
    parent.merge(&child, "/orgs/:orgId");
    parent.merge(&child, "/teams/[teamId]");
    assert_eq!(
        paths(parent.registry()),
        vec!["GET /orgs/{orgId}/hello", "GET /teams/{teamId}/hello"]
    );
}

#[test]
fn root_prefix_keeps_paths() {
    let child = hello_factory();
    let mut parent = RouteFactory::new();
    parent.merge(&child, "/");
    parent.merge(&child, "");
    assert_eq!(paths(parent.registry()), vec!["GET /hello"]);
}

#[test]
fn merged_specs_are_copies() {
    let child = hello_factory();
    let mut parent = RouteFactory::new();
    parent.merge(&child, "/api");

    assert_eq!(paths(child.registry()), vec!["GET /hello"]);
}

#[test]
fn composed_document_lists_prefixed_path() {
    let mut parent = RouteFactory::new();
    parent.route(RouteSpec::get("/health").response(200, "ok")).unwrap();
    parent.merge(&hello_factory(), "/api");

    let doc = parent.document(&OpenApiConfig::new("Composed", "1.0.0")).unwrap();
    let keys: Vec<&str> = doc["paths"].as_object().unwrap().keys().map(String::as_str).collect();
    assert!(keys.contains(&"/api/hello"));
    assert!(keys.contains(&"/health"));
    assert!(!keys.contains(&"/hello"));
}
