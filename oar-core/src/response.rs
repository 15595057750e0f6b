//! Response helpers and optional response validation.

use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, ResponseValidationError};
use crate::media::{APPLICATION_JSON, TEXT_PLAIN};
use crate::route::{lookup_response, Responses, RouteSpec};
use crate::schema::Parsed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Text,
}

/// Response body as produced by a [`Helper`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn format(&self) -> ResponseFormat {
        match self {
            Payload::Json(_) => ResponseFormat::Json,
            Payload::Text(_) => ResponseFormat::Text,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Payload::Json(_) => APPLICATION_JSON,
            Payload::Text(_) => "text/plain; charset=utf-8",
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Json(value) => value.to_string().into_bytes(),
            Payload::Text(text) => text.into_bytes(),
        }
    }
}

/// Framework-neutral handler result: a status and a body.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerResponse {
    pub status: StatusCode,
    pub body: Payload,
}

impl HandlerResponse {
    pub fn new(data: Payload, status: StatusCode) -> Self {
        Self { status, body: data }
    }

    pub fn json(status: StatusCode, value: Value) -> Self {
        Self::new(Payload::Json(value), status)
    }

    pub fn text(status: StatusCode, text: impl Into<String>) -> Self {
        Self::new(Payload::Text(text.into()), status)
    }

    pub fn format(&self) -> ResponseFormat {
        self.body.format()
    }
}

/// Check `data` against the schema declared for `(status, content_type)`.
///
/// Returns the value unchanged when nothing is declared for the pair;
/// otherwise returns the schema's re-serialized form of it.
pub fn validate_response(
    responses: &Responses,
    status: StatusCode,
    content_type: &str,
    data: Value,
) -> Result<Value, ResponseValidationError> {
    let Some(schema) = lookup_response(responses, status).and_then(|r| r.content.get(content_type)) else {
        return Ok(data);
    };
    schema
        .parse(data)
        .map(Parsed::into_json)
        .map_err(|source| ResponseValidationError {
            status,
            content_type: content_type.to_string(),
            source,
        })
}

type Sender<R> = Arc<dyn Fn(Payload, StatusCode) -> R + Send + Sync>;

/// Builds handler responses for one route, validating them against the
/// route's declared responses when enabled.
///
/// `R` is whatever the binder's sender produces: a framework response, or
/// a [`HandlerResponse`].
pub struct Helper<R> {
    spec: Arc<RouteSpec>,
    validate: bool,
    sender: Sender<R>,
}

impl<R> Clone for Helper<R> {
    fn clone(&self) -> Self {
        Self {
            spec: self.spec.clone(),
            validate: self.validate,
            sender: self.sender.clone(),
        }
    }
}

impl<R> fmt::Debug for Helper<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helper")
            .field("method", &self.spec.method)
            .field("path", &self.spec.path)
            .field("validate", &self.validate)
            .finish()
    }
}

impl<R> Helper<R> {
    pub fn new<F>(spec: Arc<RouteSpec>, validate: bool, sender: F) -> Self
    where
        F: Fn(Payload, StatusCode) -> R + Send + Sync + 'static,
    {
        Self {
            spec,
            validate,
            sender: Arc::new(sender),
        }
    }

    pub fn spec(&self) -> &RouteSpec {
        &self.spec
    }

    pub fn validates(&self) -> bool {
        self.validate
    }

    /// Send `data` as JSON with status 200.
    pub fn json<T: Serialize + ?Sized>(&self, data: &T) -> Result<R, Error> {
        self.json_with_status(StatusCode::OK, data)
    }

    pub fn json_with_status<T: Serialize + ?Sized>(
        &self,
        status: StatusCode,
        data: &T,
    ) -> Result<R, Error> {
        let value = serde_json::to_value(data)?;
        let value = if self.validate {
            validate_response(&self.spec.responses, status, APPLICATION_JSON, value)?
        } else {
            value
        };
        Ok((self.sender)(Payload::Json(value), status))
    }

    /// Send `text` as `text/plain` with status 200.
    pub fn text(&self, text: impl Into<String>) -> Result<R, Error> {
        self.text_with_status(StatusCode::OK, text)
    }

    pub fn text_with_status(&self, status: StatusCode, text: impl Into<String>) -> Result<R, Error> {
        let text = text.into();
        let text = if self.validate {
            match validate_response(&self.spec.responses, status, TEXT_PLAIN, Value::String(text))? {
                Value::String(s) => s,
                other => other.to_string(),
            }
        } else {
            text
        };
        Ok((self.sender)(Payload::Text(text), status))
    }

    /// Send a pre-built response through the same validation path.
    pub fn send(&self, response: HandlerResponse) -> Result<R, Error> {
        match response.body {
            Payload::Json(value) => self.json_with_status(response.status, &value),
            Payload::Text(text) => self.text_with_status(response.status, text),
        }
    }
}
