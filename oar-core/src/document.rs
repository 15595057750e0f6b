//! OpenAPI 3.1 document emission from an [`OpenApiRegistry`].

use std::collections::HashMap;
use std::fmt;

use http::Method;
use serde_json::{json, Map, Value};

use crate::config::OpenApiConfig;
use crate::path::{merge_path, placeholders, PathError};
use crate::registry::{Definition, OpenApiRegistry, ParameterLocation};
use crate::route::RouteSpec;
use crate::schema::Schema;

const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

#[derive(Debug)]
pub enum DocumentError {
    InvalidPath(PathError),
    UnsupportedMethod { method: String, path: String },
    /// A `$ref` points at a component that was never emitted.
    UnresolvedRef(String),
    Serialize(String),
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentError::InvalidPath(e) => write!(f, "cannot document route: {e}"),
            DocumentError::UnsupportedMethod { method, path } => {
                write!(f, "method {method} of `{path}` has no OpenAPI operation slot")
            }
            DocumentError::UnresolvedRef(reference) => {
                write!(f, "reference `{reference}` does not resolve to a component")
            }
            DocumentError::Serialize(msg) => write!(f, "failed to serialize document: {msg}"),
        }
    }
}

impl std::error::Error for DocumentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DocumentError::InvalidPath(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PathError> for DocumentError {
    fn from(err: PathError) -> Self {
        DocumentError::InvalidPath(err)
    }
}

/// Recursively rewrite `$ref` paths from schemars format to OpenAPI components format.
///
/// schemars 1.x generates JSON Schema Draft 2020-12 using `$defs` and
/// `$ref: "#/$defs/X"`. OpenAPI 3.1.0 expects schemas under `#/components/schemas/X`.
fn sanitize_schema(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(ref_str)) = obj.get_mut("$ref") {
                if let Some(name) = ref_str.strip_prefix("#/$defs/") {
                    *ref_str = format!("{SCHEMA_REF_PREFIX}{name}");
                }
            }
            for (_, v) in obj.iter_mut() {
                sanitize_schema(v);
            }
        }
        Value::Array(arr) => {
            for v in arr.iter_mut() {
                sanitize_schema(v);
            }
        }
        _ => {}
    }
}

fn method_key(method: &Method) -> Option<&'static str> {
    Some(match *method {
        Method::GET => "get",
        Method::PUT => "put",
        Method::POST => "post",
        Method::DELETE => "delete",
        Method::OPTIONS => "options",
        Method::HEAD => "head",
        Method::PATCH => "patch",
        Method::TRACE => "trace",
        _ => return None,
    })
}

/// Converts registered schemas into document fragments, collecting the
/// `$defs` they carry so they can be promoted to `components.schemas`.
struct Emitter {
    /// schemars name → name the schema was registered under.
    named: HashMap<String, String>,
    extra_definitions: Vec<(String, Value)>,
}

impl Emitter {
    fn new(registry: &OpenApiRegistry) -> Self {
        let named = registry
            .definitions()
            .iter()
            .filter_map(|d| match d {
                Definition::Schema { name, schema } => Some((schema.name().into_owned(), name.clone())),
                _ => None,
            })
            .collect();
        Self {
            named,
            extra_definitions: Vec::new(),
        }
    }

    /// Strip `$schema`, lift `$defs` out and rewrite refs.
    fn prepare(&mut self, root: &Value) -> Value {
        let mut schema = root.clone();
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("$schema");
            if let Some(Value::Object(defs)) = obj.remove("$defs") {
                self.extra_definitions.extend(defs);
            }
        }
        sanitize_schema(&mut schema);
        schema
    }

    /// Schema as used inside an operation: a `$ref` when it was registered
    /// by name, the full schema otherwise.
    fn inline(&mut self, schema: &Schema) -> Value {
        match self.named.get(schema.name().as_ref()) {
            Some(registered) => json!({ "$ref": format!("{SCHEMA_REF_PREFIX}{registered}") }),
            None => self.prepare(schema.json_schema()),
        }
    }

    /// Expand an object schema into one parameter entry per property.
    fn parameters(&mut self, location: ParameterLocation, schema: &Schema) -> Vec<Value> {
        let root = self.prepare(schema.json_schema());
        let required: Vec<&str> = root
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let Some(properties) = root.get("properties").and_then(Value::as_object) else {
            tracing::debug!(schema = %schema.name(), location = %location, "parameter schema has no properties");
            return Vec::new();
        };

        properties
            .iter()
            .map(|(name, property)| {
                let mut param = Map::new();
                param.insert("name".into(), json!(name));
                param.insert("in".into(), json!(location.as_str()));
                param.insert(
                    "required".into(),
                    json!(location == ParameterLocation::Path || required.contains(&name.as_str())),
                );
                if let Some(description) = property.get("description") {
                    param.insert("description".into(), description.clone());
                }
                param.insert("schema".into(), property.clone());
                Value::Object(param)
            })
            .collect()
    }

    fn parameter_component(&mut self, name: &str, location: ParameterLocation, schema: &Schema) -> Value {
        json!({
            "name": name,
            "in": location.as_str(),
            "required": location == ParameterLocation::Path,
            "schema": self.inline(schema),
        })
    }

    fn content(&mut self, content: &indexmap::IndexMap<String, Schema>) -> Value {
        let mut out = Map::new();
        for (media_type, schema) in content {
            out.insert(media_type.clone(), json!({ "schema": self.inline(schema) }));
        }
        Value::Object(out)
    }

    fn operation(&mut self, spec: &RouteSpec, path_params: &[String]) -> Result<(&'static str, Value), DocumentError> {
        let method = method_key(&spec.method).ok_or_else(|| DocumentError::UnsupportedMethod {
            method: spec.method.to_string(),
            path: spec.path.clone(),
        })?;

        let mut operation = Map::new();
        if let Some(ref id) = spec.operation_id {
            operation.insert("operationId".into(), json!(id));
        }
        if !spec.tags.is_empty() {
            operation.insert("tags".into(), json!(spec.tags));
        }
        if let Some(ref summary) = spec.summary {
            operation.insert("summary".into(), json!(summary));
        }
        if let Some(ref description) = spec.description {
            operation.insert("description".into(), json!(description));
        }
        if spec.deprecated {
            operation.insert("deprecated".into(), json!(true));
        }

        // Parameters
        let request = &spec.request;
        let mut parameters = Vec::new();
        let sections = [
            (ParameterLocation::Path, &request.params),
            (ParameterLocation::Query, &request.query),
            (ParameterLocation::Header, &request.headers),
            (ParameterLocation::Cookie, &request.cookies),
        ];
        for (location, schema) in sections {
            if let Some(schema) = schema {
                parameters.extend(self.parameters(location, schema));
            }
        }
        for name in path_params {
            let declared = parameters
                .iter()
                .any(|p| p["in"] == "path" && p["name"] == name.as_str());
            if !declared {
                parameters.push(json!({
                    "name": name,
                    "in": "path",
                    "required": true,
                    "schema": { "type": "string" }
                }));
            }
        }
        if !parameters.is_empty() {
            operation.insert("parameters".into(), Value::Array(parameters));
        }

        // Request body
        if let Some(ref body) = request.body {
            let mut request_body = Map::new();
            if let Some(ref description) = body.description {
                request_body.insert("description".into(), json!(description));
            }
            request_body.insert("required".into(), json!(body.required));
            request_body.insert("content".into(), self.content(&body.content));
            operation.insert("requestBody".into(), Value::Object(request_body));
        }

        // Responses
        let mut responses = Map::new();
        for (status, response) in &spec.responses {
            let mut entry = Map::new();
            entry.insert("description".into(), json!(response.description));
            if !response.content.is_empty() {
                entry.insert("content".into(), self.content(&response.content));
            }
            responses.insert(status.to_string(), Value::Object(entry));
        }
        operation.insert("responses".into(), Value::Object(responses));

        if !spec.security.is_empty() {
            operation.insert("security".into(), json!(spec.security));
        }
        for (key, value) in &spec.extensions {
            operation.insert(key.clone(), value.clone());
        }

        Ok((method, Value::Object(operation)))
    }
}

fn insert_operation(items: &mut Map<String, Value>, key: String, method: &str, operation: Value) {
    let entry = items.entry(key).or_insert_with(|| json!({}));
    if let Some(obj) = entry.as_object_mut() {
        obj.insert(method.to_string(), operation);
    }
}

fn collect_refs<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(reference)) = obj.get("$ref") {
                out.push(reference);
            }
            for v in obj.values() {
                collect_refs(v, out);
            }
        }
        Value::Array(arr) => {
            for v in arr {
                collect_refs(v, out);
            }
        }
        _ => {}
    }
}

/// Every `#/components/<kind>/<name>` reference must point at an emitted entry.
fn check_refs(document: &Value) -> Result<(), DocumentError> {
    let mut refs = Vec::new();
    collect_refs(document, &mut refs);
    for reference in refs {
        let Some(rest) = reference.strip_prefix("#/components/") else {
            continue;
        };
        let resolved = rest
            .split_once('/')
            .and_then(|(kind, name)| document.get("components")?.get(kind)?.get(name))
            .is_some();
        if !resolved {
            return Err(DocumentError::UnresolvedRef(reference.to_string()));
        }
    }
    Ok(())
}

/// Build an OpenAPI 3.1.0 JSON document from config and registered definitions.
pub fn build_document(config: &OpenApiConfig, registry: &OpenApiRegistry) -> Result<Value, DocumentError> {
    let mut emitter = Emitter::new(registry);
    let mut paths = Map::new();
    let mut webhooks = Map::new();
    let mut schemas = Map::new();
    let mut parameters = Map::new();
    let mut other_components: Map<String, Value> = Map::new();

    for definition in registry.definitions() {
        match definition {
            Definition::Route(spec) => {
                let path_params = placeholders(&spec.path)?;
                let (method, operation) = emitter.operation(spec, &path_params)?;
                let key = match config.base_path {
                    Some(ref base) => merge_path(base, &spec.path),
                    None => spec.path.clone(),
                };
                insert_operation(&mut paths, key, method, operation);
            }
            Definition::Webhook { name, spec } => {
                let (method, operation) = emitter.operation(spec, &[])?;
                insert_operation(&mut webhooks, name.clone(), method, operation);
            }
            Definition::Component { kind, name, value } => {
                if kind == "schemas" {
                    schemas.entry(name.clone()).or_insert_with(|| value.clone());
                } else if kind == "parameters" {
                    parameters.entry(name.clone()).or_insert_with(|| value.clone());
                } else {
                    let group = other_components.entry(kind.clone()).or_insert_with(|| json!({}));
                    if let Some(obj) = group.as_object_mut() {
                        obj.entry(name.clone()).or_insert_with(|| value.clone());
                    }
                }
            }
            Definition::Schema { name, schema } => {
                let prepared = emitter.prepare(schema.json_schema());
                schemas.insert(name.clone(), prepared);
            }
            Definition::Parameter { name, location, schema } => {
                let param = emitter.parameter_component(name, *location, schema);
                parameters.insert(name.clone(), param);
            }
        }
    }

    // Merge promoted $defs from schemars into components/schemas.
    for (def_name, mut def_schema) in std::mem::take(&mut emitter.extra_definitions) {
        sanitize_schema(&mut def_schema);
        schemas.entry(def_name).or_insert(def_schema);
    }

    let mut info = Map::new();
    info.insert("title".into(), json!(config.title));
    info.insert("version".into(), json!(config.version));
    if let Some(ref desc) = config.description {
        info.insert("description".into(), json!(desc));
    }

    let mut components = Map::new();
    if !schemas.is_empty() {
        components.insert("schemas".into(), Value::Object(schemas));
    }
    if !parameters.is_empty() {
        components.insert("parameters".into(), Value::Object(parameters));
    }
    components.extend(other_components);

    let mut document = Map::new();
    document.insert("openapi".into(), json!(config.openapi));
    document.insert("info".into(), Value::Object(info));
    if !config.servers.is_empty() {
        let servers =
            serde_json::to_value(&config.servers).map_err(|e| DocumentError::Serialize(e.to_string()))?;
        document.insert("servers".into(), servers);
    }
    document.insert("paths".into(), Value::Object(paths));
    if !webhooks.is_empty() {
        document.insert("webhooks".into(), Value::Object(webhooks));
    }
    if !components.is_empty() {
        document.insert("components".into(), Value::Object(components));
    }

    let document = Value::Object(document);
    check_refs(&document)?;
    tracing::debug!(definitions = registry.len(), "built OpenAPI document");
    Ok(document)
}

/// Render a document as YAML.
pub fn to_yaml(document: &Value) -> Result<String, DocumentError> {
    serde_yaml::to_string(document).map_err(|e| DocumentError::Serialize(e.to_string()))
}
