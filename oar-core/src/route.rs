use std::fmt;
use std::sync::{Arc, OnceLock};

use http::{Method, StatusCode};
use indexmap::IndexMap;
use serde_json::Value;

use crate::media::{APPLICATION_JSON, FORM_URLENCODED, MULTIPART_FORM_DATA, TEXT_PLAIN};
use crate::path::{to_style, PathStyle};
use crate::schema::Schema;

/// Key of an entry in a route's response map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKey {
    /// An exact status code, e.g. `200`.
    Code(u16),
    /// A status class wildcard, e.g. `Class(2)` for `2XX`.
    Class(u8),
    Default,
}

impl StatusKey {
    /// The class wildcard a concrete status falls under.
    pub fn class_of(status: StatusCode) -> Self {
        StatusKey::Class((status.as_u16() / 100) as u8)
    }
}

impl From<u16> for StatusKey {
    fn from(code: u16) -> Self {
        StatusKey::Code(code)
    }
}

impl From<StatusCode> for StatusKey {
    fn from(code: StatusCode) -> Self {
        StatusKey::Code(code.as_u16())
    }
}

impl fmt::Display for StatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusKey::Code(code) => write!(f, "{code}"),
            StatusKey::Class(class) => write!(f, "{class}XX"),
            StatusKey::Default => f.write_str("default"),
        }
    }
}

/// Declared response for one status key.
#[derive(Debug, Clone, Default)]
pub struct ResponseSpec {
    pub description: String,
    pub content: IndexMap<String, Schema>,
}

pub type Responses = IndexMap<StatusKey, ResponseSpec>;

/// Declared request body: media type → schema, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RequestBody {
    pub description: Option<String>,
    pub required: bool,
    pub content: IndexMap<String, Schema>,
}

/// Schemas for each section of an incoming request.
#[derive(Debug, Clone, Default)]
pub struct RequestSchemas {
    pub params: Option<Schema>,
    pub query: Option<Schema>,
    pub headers: Option<Schema>,
    pub cookies: Option<Schema>,
    pub body: Option<RequestBody>,
}

/// Declarative description of one endpoint.
///
/// Built once at startup and shared as `Arc<RouteSpec>`; never mutated
/// afterwards.
///
/// ```ignore
/// let spec = RouteSpec::get("/items/{id}")
///     .params(Schema::of::<ItemParams>())
///     .json_response(200, "The item", Schema::of::<Item>());
/// ```
#[derive(Debug, Clone)]
pub struct RouteSpec {
    pub method: Method,
    pub path: String,
    pub request: RequestSchemas,
    pub responses: Responses,
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: bool,
    pub security: Vec<IndexMap<String, Vec<String>>>,
    /// Extra fields copied verbatim onto the operation object.
    pub extensions: IndexMap<String, Value>,
    routing_paths: [OnceLock<String>; 3],
}

impl RouteSpec {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            request: RequestSchemas::default(),
            responses: Responses::new(),
            operation_id: None,
            summary: None,
            description: None,
            tags: Vec::new(),
            deprecated: false,
            security: Vec::new(),
            extensions: IndexMap::new(),
            routing_paths: Default::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    // ── Request ──

    pub fn params(mut self, schema: Schema) -> Self {
        self.request.params = Some(schema);
        self
    }

    pub fn query(mut self, schema: Schema) -> Self {
        self.request.query = Some(schema);
        self
    }

    pub fn headers(mut self, schema: Schema) -> Self {
        self.request.headers = Some(schema);
        self
    }

    pub fn cookies(mut self, schema: Schema) -> Self {
        self.request.cookies = Some(schema);
        self
    }

    /// Declare a body schema for `media_type`. The first declared media type
    /// decides how the body is validated.
    pub fn body(mut self, media_type: impl Into<String>, schema: Schema) -> Self {
        self.body_mut().content.insert(media_type.into(), schema);
        self
    }

    fn body_mut(&mut self) -> &mut RequestBody {
        self.request.body.get_or_insert_with(|| RequestBody {
            required: true,
            ..RequestBody::default()
        })
    }

    pub fn json_body(self, schema: Schema) -> Self {
        self.body(APPLICATION_JSON, schema)
    }

    pub fn form_body(self, schema: Schema) -> Self {
        self.body(FORM_URLENCODED, schema)
    }

    pub fn multipart_body(self, schema: Schema) -> Self {
        self.body(MULTIPART_FORM_DATA, schema)
    }

    pub fn text_body(self, schema: Schema) -> Self {
        self.body(TEXT_PLAIN, schema)
    }

    pub fn body_description(mut self, description: impl Into<String>) -> Self {
        self.body_mut().description = Some(description.into());
        self
    }

    pub fn body_required(mut self, required: bool) -> Self {
        self.body_mut().required = required;
        self
    }

    // ── Responses ──

    /// Declare a response without a body.
    pub fn response(mut self, status: impl Into<StatusKey>, description: impl Into<String>) -> Self {
        let entry = self.responses.entry(status.into()).or_default();
        entry.description = description.into();
        self
    }

    /// Declare a response body schema for `(status, media_type)`.
    pub fn response_content(
        mut self,
        status: impl Into<StatusKey>,
        description: impl Into<String>,
        media_type: impl Into<String>,
        schema: Schema,
    ) -> Self {
        let entry = self.responses.entry(status.into()).or_default();
        entry.description = description.into();
        entry.content.insert(media_type.into(), schema);
        self
    }

    pub fn json_response(
        self,
        status: impl Into<StatusKey>,
        description: impl Into<String>,
        schema: Schema,
    ) -> Self {
        self.response_content(status, description, APPLICATION_JSON, schema)
    }

    pub fn text_response(
        self,
        status: impl Into<StatusKey>,
        description: impl Into<String>,
        schema: Schema,
    ) -> Self {
        self.response_content(status, description, TEXT_PLAIN, schema)
    }

    // ── Operation metadata ──

    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// Require the named security scheme with the given scopes.
    pub fn security(mut self, scheme: impl Into<String>, scopes: &[&str]) -> Self {
        let mut requirement = IndexMap::new();
        requirement.insert(
            scheme.into(),
            scopes.iter().map(|s| s.to_string()).collect(),
        );
        self.security.push(requirement);
        self
    }

    pub fn extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    // ── Derived ──

    /// The path in a host router's placeholder syntax, computed once per style.
    pub fn routing_path(&self, style: PathStyle) -> &str {
        self.routing_paths[style.index()].get_or_init(|| to_style(&self.path, style))
    }

    /// A copy of this spec mounted at another path.
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        let mut spec = self.clone();
        spec.path = path.into();
        spec.routing_paths = Default::default();
        spec
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Look up the declared response for `status`, falling back to its class.
    pub fn response_for(&self, status: StatusCode) -> Option<&ResponseSpec> {
        lookup_response(&self.responses, status)
    }
}

pub(crate) fn lookup_response(responses: &Responses, status: StatusCode) -> Option<&ResponseSpec> {
    responses
        .get(&StatusKey::from(status))
        .or_else(|| responses.get(&StatusKey::class_of(status)))
}
