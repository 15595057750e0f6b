//! Framework-agnostic core of oar.
//!
//! A [`RouteSpec`] declares a route's request and response schemas once.
//! [`RouteFactory::route`] registers it for documentation and compiles it into
//! a [`Pipeline`] that validates requests seen through a [`RequestAdapter`].
//! Binder crates wire both into a host framework.

pub mod adapter;
pub mod coerce;
pub mod config;
pub mod document;
pub mod error;
pub mod factory;
pub mod media;
pub mod path;
pub mod pipeline;
pub mod registry;
pub mod response;
pub mod route;
pub mod schema;

pub use adapter::{BufferedRequest, RequestAdapter};
pub use config::{ConfigError, FactoryOptions, OarConfig, OpenApiConfig, ServerConfig};
pub use document::{build_document, to_yaml, DocumentError};
pub use error::{Error, ErrorBody, HttpError, RequestValidationError, ResponseValidationError};
pub use factory::RouteFactory;
pub use path::{merge_path, merge_paths, to_brace, to_style, PathError, PathStyle};
pub use pipeline::{Input, Pipeline, Stage, Target};
pub use registry::{Definition, OpenApiRegistry, ParameterLocation};
pub use response::{validate_response, HandlerResponse, Helper, Payload, ResponseFormat};
pub use route::{RequestBody, RequestSchemas, ResponseSpec, Responses, RouteSpec, StatusKey};
pub use schema::{FieldError, Parsed, Schema, SchemaError, SchemaType};

pub use garde;
pub use schemars;
