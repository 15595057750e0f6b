use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::{FactoryOptions, OpenApiConfig};
use crate::document::{build_document, DocumentError};
use crate::error::Error;
use crate::path::placeholders;
use crate::pipeline::Pipeline;
use crate::registry::{OpenApiRegistry, ParameterLocation};
use crate::route::RouteSpec;
use crate::schema::Schema;

/// Framework-neutral route factory.
///
/// Owns the registry every route is documented in and compiles each
/// [`RouteSpec`] into a [`Pipeline`]. Binders wrap one of these and add the
/// host framework's handler registration on top.
#[derive(Debug, Clone, Default)]
pub struct RouteFactory {
    registry: OpenApiRegistry,
    options: FactoryOptions,
}

impl RouteFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: FactoryOptions) -> Self {
        Self {
            registry: OpenApiRegistry::new(),
            options,
        }
    }

    pub fn options(&self) -> &FactoryOptions {
        &self.options
    }

    pub fn registry(&self) -> &OpenApiRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> OpenApiRegistry {
        self.registry
    }

    /// Register `spec` and compile its validators.
    ///
    /// The route is documented immediately, whether or not it is ever
    /// served.
    pub fn route(&mut self, spec: RouteSpec) -> Result<Pipeline, Error> {
        placeholders(&spec.path)?;
        let spec = Arc::new(spec);
        if self.registry.register_route(spec.clone()) {
            tracing::debug!(method = %spec.method, path = %spec.path, "registered route");
        }
        Ok(Pipeline::compile(spec, self.options.validate_response))
    }

    /// Document a webhook under `webhooks.<name>`. The path template is
    /// checked like a route's.
    pub fn webhook(&mut self, name: impl Into<String>, spec: RouteSpec) -> Result<(), Error> {
        placeholders(&spec.path)?;
        let name = name.into();
        if self.registry.register_webhook(name.clone(), Arc::new(spec)) {
            tracing::debug!(%name, "registered webhook");
        }
        Ok(())
    }

    /// Register `T` under its own schema name and return its handle.
    /// Routes using a schema of the same name then reference it by `$ref`.
    pub fn schema<T>(&mut self) -> Schema
    where
        T: DeserializeOwned + Serialize + JsonSchema + Send + Sync + 'static,
    {
        let schema = Schema::of::<T>();
        self.registry.register_schema(schema.name(), schema.clone());
        schema
    }

    pub fn register_schema(&mut self, name: impl Into<String>, schema: Schema) {
        self.registry.register_schema(name, schema);
    }

    /// Register a raw component, e.g. a security scheme.
    pub fn component(&mut self, kind: impl Into<String>, name: impl Into<String>, value: Value) {
        self.registry.register_component(kind, name, value);
    }

    pub fn parameter(&mut self, name: impl Into<String>, location: ParameterLocation, schema: Schema) {
        self.registry.register_parameter(name, location, schema);
    }

    /// Fold a child factory's definitions in under `prefix`.
    pub fn merge(&mut self, child: &RouteFactory, prefix: &str) {
        self.registry.merge(&child.registry, prefix);
    }

    pub fn document(&self, config: &OpenApiConfig) -> Result<Value, DocumentError> {
        build_document(config, &self.registry)
    }
}
