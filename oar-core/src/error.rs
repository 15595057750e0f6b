use std::fmt;

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::document::DocumentError;
use crate::path::PathError;
use crate::pipeline::Target;
use crate::schema::SchemaError;

/// A request section failed its schema. Raised before the handler runs.
#[derive(Debug, Clone)]
pub struct RequestValidationError {
    pub target: Target,
    pub source: SchemaError,
}

impl fmt::Display for RequestValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid request {}: {}", self.target, self.source)
    }
}

impl std::error::Error for RequestValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Handler output did not match the schema declared for its status and
/// content type.
#[derive(Debug, Clone)]
pub struct ResponseValidationError {
    pub status: StatusCode,
    pub content_type: String,
    pub source: SchemaError,
}

impl fmt::Display for ResponseValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "response for {} ({}) does not match its declared schema: {}",
            self.status.as_u16(),
            self.content_type,
            self.source
        )
    }
}

impl std::error::Error for ResponseValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Every failure the core surfaces.
#[derive(Debug)]
pub enum Error {
    InvalidPath(PathError),
    /// The host framework cannot route this method.
    UnsupportedMethod { method: String, path: String },
    RequestValidation(RequestValidationError),
    ResponseValidation(ResponseValidationError),
    Serialize(serde_json::Error),
    Document(DocumentError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidPath(e) => write!(f, "{e}"),
            Error::UnsupportedMethod { method, path } => {
                write!(f, "cannot route {method} {path}: unsupported method")
            }
            Error::RequestValidation(e) => write!(f, "{e}"),
            Error::ResponseValidation(e) => write!(f, "{e}"),
            Error::Serialize(e) => write!(f, "failed to serialize response: {e}"),
            Error::Document(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidPath(e) => Some(e),
            Error::UnsupportedMethod { .. } => None,
            Error::RequestValidation(e) => Some(e),
            Error::ResponseValidation(e) => Some(e),
            Error::Serialize(e) => Some(e),
            Error::Document(e) => Some(e),
        }
    }
}

impl Error {
    /// Status the stock binders answer with: 400 for rejected requests,
    /// 500 for everything that is the server's fault.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::RequestValidation(_) => StatusCode::BAD_REQUEST,
            Error::InvalidPath(_)
            | Error::UnsupportedMethod { .. }
            | Error::ResponseValidation(_)
            | Error::Serialize(_)
            | Error::Document(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-facing payload. Server-side failures are not detailed.
    pub fn body(&self) -> ErrorBody {
        match self {
            Error::RequestValidation(e) => ErrorBody::new(
                self.status(),
                e.source
                    .messages()
                    .into_iter()
                    .map(|m| format!("{}: {m}", e.target))
                    .collect(),
            ),
            _ => ErrorBody::single(self.status(), "internal server error"),
        }
    }
}

impl From<PathError> for Error {
    fn from(err: PathError) -> Self {
        Error::InvalidPath(err)
    }
}

impl From<RequestValidationError> for Error {
    fn from(err: RequestValidationError) -> Self {
        Error::RequestValidation(err)
    }
}

impl From<ResponseValidationError> for Error {
    fn from(err: ResponseValidationError) -> Self {
        Error::ResponseValidation(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialize(err)
    }
}

impl From<DocumentError> for Error {
    fn from(err: DocumentError) -> Self {
        Error::Document(err)
    }
}

// ── Error body ─────────────────────────────────────────────

/// Conventional error payload:
/// `{ "status": 422, "errors": { "body": ["..."] } }`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub errors: ErrorMessages,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMessages {
    pub body: Vec<String>,
}

impl ErrorBody {
    pub fn new(status: StatusCode, messages: Vec<String>) -> Self {
        Self {
            status: status.as_u16(),
            errors: ErrorMessages { body: messages },
        }
    }

    pub fn single(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(status, vec![message.into()])
    }
}

// ── HttpError ──────────────────────────────────────────────

/// Application error carrying its own status code.
///
/// Binders render it as an [`ErrorBody`].
#[derive(Clone)]
pub struct HttpError {
    pub status: StatusCode,
    pub message: String,
    pub code: Option<String>,
    pub details: Option<Value>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody::single(self.status, self.message.clone())
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} [{code}]: {}", self.status.as_u16(), self.message),
            None => write!(f, "{}: {}", self.status.as_u16(), self.message),
        }
    }
}

impl fmt::Debug for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for HttpError {}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        HttpError::internal(err.to_string())
    }
}

/// Generate `From<E> for HttpError` implementations mapping the caller's own
/// error types to a status constructor.
///
/// # Example
///
/// ```ignore
/// oar_core::map_error! {
///     crate::store::NotFound => not_found,
///     crate::store::StoreError => internal,
/// }
/// ```
#[macro_export]
macro_rules! map_error {
    ( $( $err_ty:ty => $ctor:ident ),* $(,)? ) => {
        $(
            impl From<$err_ty> for $crate::HttpError {
                fn from(err: $err_ty) -> Self {
                    $crate::HttpError::$ctor(err.to_string())
                }
            }
        )*
    };
}
