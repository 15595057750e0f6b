//! Compiled request validation.
//!
//! A [`Pipeline`] is the ordered list of [`Stage`]s derived from a
//! [`RouteSpec`]. Running it against a [`RequestAdapter`] yields the
//! per-request [`Input`] bag handed to the handler.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;
use serde_json::Value;

use crate::adapter::RequestAdapter;
use crate::coerce::coerce;
use crate::error::RequestValidationError;
use crate::media::MediaKind;
use crate::response::{Helper, Payload};
use crate::route::RouteSpec;
use crate::schema::{Parsed, Schema};

/// Request section a stage validates, and the [`Input`] slot it fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Query,
    Params,
    Headers,
    Cookies,
    Json,
    Form,
    Text,
}

impl Target {
    pub fn as_str(self) -> &'static str {
        match self {
            Target::Query => "query",
            Target::Params => "params",
            Target::Headers => "headers",
            Target::Cookies => "cookies",
            Target::Json => "json",
            Target::Form => "form",
            Target::Text => "text",
        }
    }

    pub fn is_body(self) -> bool {
        matches!(self, Target::Json | Target::Form | Target::Text)
    }

    /// Sections whose values arrive as strings and need coercion.
    fn coerces(self) -> bool {
        !matches!(self, Target::Json | Target::Text)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Input bag ──────────────────────────────────────────────

struct Slot {
    value: Box<dyn Any + Send + Sync>,
    json: Value,
}

/// Parsed request sections, keyed by [`Target`]. One per request.
#[derive(Default)]
pub struct Input {
    slots: HashMap<Target, Slot>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target: Target, parsed: Parsed) {
        let (value, json) = parsed.into_parts();
        self.slots.insert(target, Slot { value, json });
    }

    pub fn contains(&self, target: Target) -> bool {
        self.slots.contains_key(&target)
    }

    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.slots.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Borrow the typed value stored for `target`.
    pub fn get<T: Any>(&self, target: Target) -> Option<&T> {
        self.slots.get(&target)?.value.downcast_ref::<T>()
    }

    /// Move the typed value out of the bag. The slot is left untouched when
    /// the type does not match.
    pub fn take<T: Any>(&mut self, target: Target) -> Option<T> {
        if !self.slots.get(&target)?.value.is::<T>() {
            return None;
        }
        let slot = self.slots.remove(&target)?;
        slot.value.downcast::<T>().ok().map(|v| *v)
    }

    /// The coerced JSON form stored for `target`.
    pub fn raw(&self, target: Target) -> Option<&Value> {
        self.slots.get(&target).map(|s| &s.json)
    }

    pub fn query<T: Any>(&self) -> Option<&T> {
        self.get(Target::Query)
    }

    pub fn params<T: Any>(&self) -> Option<&T> {
        self.get(Target::Params)
    }

    pub fn headers<T: Any>(&self) -> Option<&T> {
        self.get(Target::Headers)
    }

    pub fn cookies<T: Any>(&self) -> Option<&T> {
        self.get(Target::Cookies)
    }

    /// The parsed body, whichever body target the route declared.
    pub fn body<T: Any>(&self) -> Option<&T> {
        self.get(Target::Json)
            .or_else(|| self.get(Target::Form))
            .or_else(|| self.get(Target::Text))
    }

    pub fn take_body<T: Any>(&mut self) -> Option<T> {
        self.take(Target::Json)
            .or_else(|| self.take(Target::Form))
            .or_else(|| self.take(Target::Text))
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (target, slot) in &self.slots {
            map.entry(target, &slot.json);
        }
        map.finish()
    }
}

// ── Stages ─────────────────────────────────────────────────

/// One compiled validator: extract a section, coerce, parse, store.
#[derive(Debug, Clone)]
pub struct Stage {
    pub target: Target,
    pub schema: Schema,
    /// Body stages only: an empty body skips validation.
    pub optional: bool,
}

impl Stage {
    pub fn new(target: Target, schema: Schema) -> Self {
        Self {
            target,
            schema,
            optional: false,
        }
    }

    async fn extract<A>(&self, req: &A) -> Value
    where
        A: RequestAdapter + ?Sized,
    {
        match self.target {
            Target::Query => Value::Object(req.query().await),
            Target::Params => Value::Object(req.params().await),
            Target::Headers => Value::Object(req.headers().await),
            Target::Cookies => Value::Object(req.cookies().await),
            Target::Json => req.json().await.unwrap_or(Value::Null),
            Target::Form => Value::Object(req.form().await),
            Target::Text => req.text().await.map(Value::String).unwrap_or(Value::Null),
        }
    }

    /// Validate this stage's section of `req` into `input`.
    pub async fn run<A>(&self, req: &A, input: &mut Input) -> Result<(), RequestValidationError>
    where
        A: RequestAdapter + ?Sized,
    {
        if self.optional && self.target.is_body() && req.body().await.is_empty() {
            tracing::trace!(section = %self.target, "optional body absent, skipping");
            return Ok(());
        }

        let raw = self.extract(req).await;
        let raw = if self.target.coerces() {
            coerce(raw, self.schema.json_schema())
        } else {
            raw
        };

        tracing::trace!(section = %self.target, schema = %self.schema.name(), "validating");
        let parsed = self
            .schema
            .parse(raw)
            .map_err(|source| RequestValidationError {
                target: self.target,
                source,
            })?;
        input.insert(self.target, parsed);
        Ok(())
    }
}

// ── Pipeline ───────────────────────────────────────────────

/// The compiled form of a [`RouteSpec`].
#[derive(Debug, Clone)]
pub struct Pipeline {
    spec: Arc<RouteSpec>,
    stages: Vec<Stage>,
    validate_response: bool,
}

impl Pipeline {
    /// Derive the stages for `spec`: query, params, headers, cookies, then
    /// the body, picked by the first declared media type.
    pub fn compile(spec: Arc<RouteSpec>, validate_response: bool) -> Self {
        let mut stages = Vec::new();
        let request = &spec.request;

        let sections = [
            (Target::Query, &request.query),
            (Target::Params, &request.params),
            (Target::Headers, &request.headers),
            (Target::Cookies, &request.cookies),
        ];
        for (target, schema) in sections {
            if let Some(schema) = schema {
                stages.push(Stage::new(target, schema.clone()));
            }
        }

        if let Some(body) = &request.body {
            if let Some((media_type, schema)) = body.content.first() {
                let target = match MediaKind::of(media_type) {
                    MediaKind::Json => Some(Target::Json),
                    MediaKind::Form => Some(Target::Form),
                    MediaKind::Text => Some(Target::Text),
                    MediaKind::Other => {
                        tracing::debug!(
                            path = %spec.path,
                            media_type = %media_type,
                            "no body validator for media type"
                        );
                        None
                    }
                };
                if let Some(target) = target {
                    stages.push(Stage {
                        target,
                        schema: schema.clone(),
                        optional: !body.required,
                    });
                }
            }
        }

        Self {
            spec,
            stages,
            validate_response,
        }
    }

    pub fn spec(&self) -> &Arc<RouteSpec> {
        &self.spec
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn targets(&self) -> Vec<Target> {
        self.stages.iter().map(|s| s.target).collect()
    }

    pub fn validates_response(&self) -> bool {
        self.validate_response
    }

    /// Run every stage in order. The first failure aborts the run.
    pub async fn run<A>(&self, req: &A) -> Result<Input, RequestValidationError>
    where
        A: RequestAdapter + ?Sized,
    {
        let mut input = Input::new();
        for stage in &self.stages {
            stage.run(req, &mut input).await?;
        }
        Ok(input)
    }

    /// Response helper for this route, sending through `sender`.
    pub fn helper<R, F>(&self, sender: F) -> Helper<R>
    where
        F: Fn(Payload, StatusCode) -> R + Send + Sync + 'static,
    {
        Helper::new(self.spec.clone(), self.validate_response, sender)
    }
}
