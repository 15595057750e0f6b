//! Ordered store of everything a factory documents.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use http::Method;
use serde_json::Value;

use crate::path::{merge_path, to_brace};
use crate::route::RouteSpec;
use crate::schema::Schema;

/// Where a reusable parameter component lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One registered item.
#[derive(Debug, Clone)]
pub enum Definition {
    Route(Arc<RouteSpec>),
    /// Route-shaped descriptor documented under `webhooks.<name>`.
    Webhook { name: String, spec: Arc<RouteSpec> },
    /// Raw component object, e.g. `kind = "securitySchemes"`.
    Component { kind: String, name: String, value: Value },
    Schema { name: String, schema: Schema },
    Parameter {
        name: String,
        location: ParameterLocation,
        schema: Schema,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Route(Method, String),
    Webhook(String),
    Component(String, String),
    Schema(String),
    Parameter(String),
}

impl Definition {
    fn key(&self) -> Key {
        match self {
            Definition::Route(spec) => Key::Route(spec.method.clone(), spec.path.clone()),
            Definition::Webhook { name, .. } => Key::Webhook(name.clone()),
            Definition::Component { kind, name, .. } => Key::Component(kind.clone(), name.clone()),
            Definition::Schema { name, .. } => Key::Schema(name.clone()),
            Definition::Parameter { name, .. } => Key::Parameter(name.clone()),
        }
    }
}

/// Registry owned by a single [`RouteFactory`](crate::RouteFactory).
///
/// Mutated only while the application is assembled; binders snapshot it
/// behind an `Arc` once the router is built.
#[derive(Debug, Clone, Default)]
pub struct OpenApiRegistry {
    definitions: Vec<Definition>,
    keys: HashSet<Key>,
}

impl OpenApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Arc<RouteSpec>> {
        self.definitions.iter().filter_map(|d| match d {
            Definition::Route(spec) => Some(spec),
            _ => None,
        })
    }

    /// Add a definition. Returns `false` (and keeps the first entry) when an
    /// equivalent definition is already present.
    pub fn register(&mut self, definition: Definition) -> bool {
        if !self.keys.insert(definition.key()) {
            tracing::debug!(definition = ?definition.key(), "definition already registered");
            return false;
        }
        self.definitions.push(definition);
        true
    }

    pub fn register_route(&mut self, spec: Arc<RouteSpec>) -> bool {
        self.register(Definition::Route(spec))
    }

    pub fn register_webhook(&mut self, name: impl Into<String>, spec: Arc<RouteSpec>) -> bool {
        self.register(Definition::Webhook {
            name: name.into(),
            spec,
        })
    }

    pub fn register_schema(&mut self, name: impl Into<String>, schema: Schema) -> bool {
        self.register(Definition::Schema {
            name: name.into(),
            schema,
        })
    }

    pub fn register_component(
        &mut self,
        kind: impl Into<String>,
        name: impl Into<String>,
        value: Value,
    ) -> bool {
        self.register(Definition::Component {
            kind: kind.into(),
            name: name.into(),
            value,
        })
    }

    pub fn register_parameter(
        &mut self,
        name: impl Into<String>,
        location: ParameterLocation,
        schema: Schema,
    ) -> bool {
        self.register(Definition::Parameter {
            name: name.into(),
            location,
            schema,
        })
    }

    /// Re-register every definition of `child`, mounting its routes and
    /// webhooks under `prefix`. `prefix` may use any placeholder style.
    pub fn merge(&mut self, child: &OpenApiRegistry, prefix: &str) {
        let prefix = to_brace(prefix);
        let mut added = 0usize;
        for definition in &child.definitions {
            let definition = match definition {
                Definition::Route(spec) => {
                    Definition::Route(Arc::new(spec.with_path(merge_path(&prefix, &spec.path))))
                }
                Definition::Webhook { name, spec } => Definition::Webhook {
                    name: name.clone(),
                    spec: Arc::new(spec.with_path(merge_path(&prefix, &spec.path))),
                },
                Definition::Component { .. }
                | Definition::Schema { .. }
                | Definition::Parameter { .. } => definition.clone(),
            };
            if self.register(definition) {
                added += 1;
            }
        }
        tracing::debug!(prefix = %prefix, added, "merged child registry");
    }
}
