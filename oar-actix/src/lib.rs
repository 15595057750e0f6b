//! actix-web binder for oar.

pub mod adapter;
pub mod error;
pub mod factory;

pub use adapter::{read_body, snapshot, text_fields, DEFAULT_BODY_LIMIT};
pub use error::ApiError;
pub use factory::{render, ActixFactory, Context, OarService};

/// Result type for handlers using the stock error mapping.
pub type ApiResult<T = actix_web::HttpResponse> = Result<T, ApiError>;
