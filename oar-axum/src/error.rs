use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use oar_core::{Error, ErrorBody, HttpError};

/// Default error type for axum handlers.
///
/// Request validation failures answer 400, server-side failures 500, and
/// [`HttpError`]s their own status. Every body has the [`ErrorBody`] shape.
pub enum ApiError {
    Core(Error),
    Http(HttpError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(e) => e.status(),
            ApiError::Http(e) => e.status,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            ApiError::Core(e) => e.body(),
            ApiError::Http(e) => e.body(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Core(err)
    }
}

impl From<HttpError> for ApiError {
    fn from(err: HttpError) -> Self {
        ApiError::Http(err)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Core(e) => write!(f, "{e}"),
            ApiError::Http(e) => write!(f, "{e}"),
        }
    }
}

impl std::fmt::Debug for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        <Self as std::fmt::Display>::fmt(self, f)
    }
}

impl std::error::Error for ApiError {}

/// Render an [`HttpError`] directly, for handlers that do not go through
/// [`ApiError`].
pub fn http_error_response(err: HttpError) -> Response {
    ApiError::Http(err).into_response()
}
