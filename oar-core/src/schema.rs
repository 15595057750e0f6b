use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

// ── Error types ────────────────────────────────────────────

/// A field-level validation error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    pub code: String,
}

/// Failure of a [`Schema`] to accept a value.
///
/// Produced either by serde (shape/type mismatch) or by `garde` (constraint
/// violations on an otherwise well-formed value).
#[derive(Debug, Clone, Serialize)]
pub struct SchemaError {
    pub errors: Vec<FieldError>,
}

impl SchemaError {
    pub fn new(field: impl Into<String>, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            errors: vec![FieldError {
                field: field.into(),
                message: message.into(),
                code: code.into(),
            }],
        }
    }

    /// Flatten the errors into `"field: message"` strings.
    pub fn messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect()
    }

    pub(crate) fn from_serde(err: &serde_json::Error) -> Self {
        Self::new("value", err.to_string(), "type")
    }

    pub(crate) fn from_report(report: &garde::Report) -> Self {
        let mut errors = Vec::new();

        for (path, error) in report.iter() {
            let field = {
                let s = path.to_string();
                if s.is_empty() { "value".to_string() } else { s }
            };
            errors.push(FieldError {
                field,
                message: error.message().to_string(),
                code: "validation".to_string(),
            });
        }

        Self { errors }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema validation failed")?;
        for (i, e) in self.errors.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}

// ── Parsed values ──────────────────────────────────────────

/// Output of a successful [`Schema::parse`]: the typed value plus its
/// re-serialized JSON form.
pub struct Parsed {
    value: Box<dyn Any + Send + Sync>,
    json: Value,
}

impl Parsed {
    pub fn new<T: Any + Send + Sync>(value: T, json: Value) -> Self {
        Self {
            value: Box::new(value),
            json,
        }
    }

    /// The coerced JSON form of the parsed value.
    pub fn json(&self) -> &Value {
        &self.json
    }

    pub fn into_json(self) -> Value {
        self.json
    }

    pub fn into_parts(self) -> (Box<dyn Any + Send + Sync>, Value) {
        (self.value, self.json)
    }

    /// Recover the typed value, or give `self` back on a type mismatch.
    pub fn downcast<T: Any>(self) -> Result<T, Self> {
        match self.value.downcast::<T>() {
            Ok(v) => Ok(*v),
            Err(value) => Err(Self {
                value,
                json: self.json,
            }),
        }
    }
}

impl fmt::Debug for Parsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parsed").field("json", &self.json).finish()
    }
}

// ── Schema abstraction ─────────────────────────────────────

/// Something that can describe itself as JSON Schema and parse JSON values.
///
/// The stock implementation is backed by a Rust type (see [`Schema::of`]);
/// implement this directly to plug in another validation strategy.
pub trait SchemaType: Send + Sync + 'static {
    /// Schema name, used as the component name when the schema is registered.
    fn name(&self) -> Cow<'static, str>;

    /// JSON Schema (draft 2020-12) describing accepted values.
    fn json_schema(&self) -> &Value;

    /// Parse and validate a raw JSON value.
    fn parse(&self, raw: Value) -> Result<Parsed, SchemaError>;
}

type Check<T> = fn(&T) -> Result<(), SchemaError>;

struct TypedSchema<T> {
    check: Option<Check<T>>,
    schema: OnceLock<Value>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    fn new(check: Option<Check<T>>) -> Self {
        Self {
            check,
            schema: OnceLock::new(),
            _marker: PhantomData,
        }
    }
}

impl<T> SchemaType for TypedSchema<T>
where
    T: DeserializeOwned + Serialize + JsonSchema + Send + Sync + 'static,
{
    fn name(&self) -> Cow<'static, str> {
        T::schema_name()
    }

    fn json_schema(&self) -> &Value {
        self.schema.get_or_init(|| {
            serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|e| {
                tracing::warn!(schema = %T::schema_name(), error = %e, "failed to serialize JSON schema");
                json!({})
            })
        })
    }

    fn parse(&self, raw: Value) -> Result<Parsed, SchemaError> {
        let value: T = serde_json::from_value(raw).map_err(|e| SchemaError::from_serde(&e))?;
        if let Some(check) = self.check {
            check(&value)?;
        }
        let json = serde_json::to_value(&value).map_err(|e| SchemaError::from_serde(&e))?;
        Ok(Parsed::new(value, json))
    }
}

fn run_garde<T>(value: &T) -> Result<(), SchemaError>
where
    T: garde::Validate,
    T::Context: Default,
{
    value
        .validate()
        .map_err(|report| SchemaError::from_report(&report))
}

/// Shared handle to a [`SchemaType`].
///
/// ```ignore
/// #[derive(Deserialize, Serialize, JsonSchema)]
/// struct ItemParams { id: u32 }
///
/// let params = Schema::of::<ItemParams>();
/// ```
#[derive(Clone)]
pub struct Schema(Arc<dyn SchemaType>);

impl Schema {
    /// Schema backed by serde (shape) and schemars (documentation).
    pub fn of<T>() -> Self
    where
        T: DeserializeOwned + Serialize + JsonSchema + Send + Sync + 'static,
    {
        Self(Arc::new(TypedSchema::<T>::new(None)))
    }

    /// Like [`Schema::of`], additionally enforcing the type's `garde` rules.
    pub fn validated<T>() -> Self
    where
        T: DeserializeOwned + Serialize + JsonSchema + garde::Validate + Send + Sync + 'static,
        T::Context: Default,
    {
        Self(Arc::new(TypedSchema::<T>::new(Some(run_garde::<T>))))
    }

    pub fn custom(inner: impl SchemaType) -> Self {
        Self(Arc::new(inner))
    }

    pub fn name(&self) -> Cow<'static, str> {
        self.0.name()
    }

    pub fn json_schema(&self) -> &Value {
        self.0.json_schema()
    }

    pub fn parse(&self, raw: Value) -> Result<Parsed, SchemaError> {
        self.0.parse(raw)
    }

    /// Whether both handles point at the same schema instance.
    pub fn ptr_eq(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Schema").field(&self.name()).finish()
    }
}
