//! axum binder for oar.

pub mod adapter;
pub mod error;
pub mod factory;

pub use adapter::{AxumRequest, DEFAULT_BODY_LIMIT};
pub use error::{http_error_response, ApiError};
pub use factory::{render, AxumFactory, Context};

/// Result type for handlers using the stock error mapping.
pub type ApiResult<T = axum::response::Response> = Result<T, ApiError>;
