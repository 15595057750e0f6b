use actix_web::http::StatusCode as ActixStatus;
use actix_web::{HttpResponse, ResponseError};
use http::StatusCode;
use oar_core::{Error, ErrorBody, HttpError};

/// Convert an `http` 1.x status into actix-web's own type.
pub(crate) fn actix_status(status: StatusCode) -> ActixStatus {
    ActixStatus::from_u16(status.as_u16()).unwrap_or(ActixStatus::INTERNAL_SERVER_ERROR)
}

/// Default error type for actix-web handlers.
///
/// Same mapping as the axum binder: 400 for request validation, 500 for
/// server-side failures, an [`HttpError`]'s own status otherwise.
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

impl ResponseError for ApiError {
    fn status_code(&self) -> ActixStatus {
        actix_status(self.status())
    }

    fn error_response(&self) -> HttpResponse {
        if self.status().is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        HttpResponse::build(self.status_code()).json(self.body())
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
